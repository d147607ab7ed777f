//! Renderable model

use core::any::Any;

use depot_core::AssetHandle;
use serde::{Deserialize, Serialize};

use crate::context::{LoadContext, SaveContext};
use crate::error::AssetResult;
use crate::factory::SerializableObject;

/// Axis-aligned bounding box in model space
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Bounds {
    pub fn extent(&self) -> [f32; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }
}

/// Mesh source plus the materials applied to its submeshes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    id: AssetHandle,
    /// Mesh file, relative to the project root
    pub mesh_source: String,
    /// One material per submesh
    pub materials: Vec<AssetHandle>,
    pub bounds: Bounds,
}

impl Model {
    pub const CLASS_NAME: &'static str = "Model";
}

impl SerializableObject for Model {
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
        ctx.set_field("MeshSource", &self.mesh_source)?;
        ctx.set_references("Materials", &self.materials);
        ctx.set_field("Bounds", &self.bounds)
    }

    fn deserialize(&mut self, ctx: &mut LoadContext<'_>) -> AssetResult<()> {
        self.mesh_source = ctx.field_or_default("MeshSource")?;
        self.bounds = ctx.field_or_default("Bounds")?;
        self.materials = ctx.references("Materials")?;
        for material in &self.materials {
            ctx.resolve(*material)?;
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
