//! Scene composed of model instances

use core::any::Any;

use depot_core::AssetHandle;
use serde::{Deserialize, Serialize};

use crate::context::{LoadContext, SaveContext};
use crate::error::AssetResult;
use crate::factory::SerializableObject;

/// Node transform
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    #[serde(default)]
    pub position: [f32; 3],
    /// Euler angles in radians
    #[serde(default)]
    pub rotation: [f32; 3],
    #[serde(default = "default_scale")]
    pub scale: [f32; 3],
}

fn default_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            rotation: [0.0, 0.0, 0.0],
            scale: default_scale(),
        }
    }
}

/// A placed model
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub model: AssetHandle,
    pub transform: Transform,
}

/// On-disk shape of a node; handles are raw ids
#[derive(Serialize, Deserialize)]
struct NodeDef {
    name: String,
    model: u64,
    #[serde(default)]
    transform: Transform,
}

/// Placed models plus an optional environment map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    id: AssetHandle,
    pub nodes: Vec<SceneNode>,
    /// Environment texture
    pub environment: Option<AssetHandle>,
}

impl Scene {
    pub const CLASS_NAME: &'static str = "Scene";
}

impl SerializableObject for Scene {
    fn class_name(&self) -> &str {
        Self::CLASS_NAME
    }

    fn serialization_id(&self) -> AssetHandle {
        self.id
    }

    fn set_serialization_id(&mut self, id: AssetHandle) {
        self.id = id;
    }

    fn serialize(&self, ctx: &mut SaveContext<'_>) -> AssetResult<()> {
        let nodes: Vec<NodeDef> = self
            .nodes
            .iter()
            .map(|node| NodeDef {
                name: node.name.clone(),
                model: node.model.to_raw(),
                transform: node.transform,
            })
            .collect();

        for node in &self.nodes {
            ctx.record_reference(node.model);
        }
        ctx.set_field("Nodes", &nodes)?;
        ctx.set_reference("Environment", self.environment);
        Ok(())
    }

    fn deserialize(&mut self, ctx: &mut LoadContext<'_>) -> AssetResult<()> {
        let nodes: Vec<NodeDef> = ctx.field_or_default("Nodes")?;
        self.nodes = nodes
            .into_iter()
            .map(|def| SceneNode {
                name: def.name,
                model: AssetHandle::new(def.model),
                transform: def.transform,
            })
            .collect();
        self.environment = ctx.reference("Environment")?;

        for node in &self.nodes {
            if !node.model.is_null() {
                ctx.resolve(node.model)?;
            }
        }
        if let Some(environment) = self.environment {
            ctx.resolve(environment)?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payloads::test_support::{registry_with, round_trip};

    #[test]
    fn test_round_trip() {
        let (_dir, registry) = registry_with(&[(5, "Model"), (6, "TextureSrc")]);
        let scene = Scene {
            id: AssetHandle::new(4),
            nodes: vec![
                SceneNode {
                    name: "crate_a".to_string(),
                    model: AssetHandle::new(5),
                    transform: Transform::default(),
                },
                SceneNode {
                    name: "crate_b".to_string(),
                    model: AssetHandle::new(5),
                    transform: Transform {
                        position: [2.0, 0.0, -1.0],
                        rotation: [0.0, 1.57, 0.0],
                        scale: [0.5, 0.5, 0.5],
                    },
                },
            ],
            environment: Some(AssetHandle::new(6)),
        };

        let (copy, references) = round_trip(&registry, &scene);
        assert_eq!(copy, scene);
        assert_eq!(
            references.into_iter().collect::<Vec<_>>(),
            vec![AssetHandle::new(5), AssetHandle::new(6)]
        );
    }

    #[test]
    fn test_transform_scale_defaults_to_one() {
        let transform: Transform = serde_json::from_str(r#"{ "position": [1, 2, 3] }"#).unwrap();
        assert_eq!(transform.position, [1.0, 2.0, 3.0]);
        assert_eq!(transform.scale, [1.0, 1.0, 1.0]);
    }
}
