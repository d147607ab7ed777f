//! PBR material

use core::any::Any;

use depot_core::AssetHandle;

use crate::context::{LoadContext, SaveContext};
use crate::error::{AssetError, AssetResult};
use crate::factory::SerializableObject;

/// Metallic/roughness material referencing texture assets
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    id: AssetHandle,
    pub shader: String,
    /// Linear RGBA
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    pub albedo_texture: Option<AssetHandle>,
    pub normal_texture: Option<AssetHandle>,
}

/// `value` must lie in [0, 1]; checked on both save and load
fn unit_range(field: &str, value: f32) -> AssetResult<f32> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(AssetError::invalid_field(field, "expected a value in [0, 1]"))
    }
}

impl Material {
    pub const CLASS_NAME: &'static str = "Material";

    /// Texture handles this material samples
    pub fn textures(&self) -> impl Iterator<Item = AssetHandle> + '_ {
        self.albedo_texture.iter().chain(self.normal_texture.iter()).copied()
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            id: AssetHandle::NULL,
            shader: "standard".to_string(),
            base_color: [1.0, 1.0, 1.0, 1.0],
            metallic: 0.0,
            roughness: 0.5,
            albedo_texture: None,
            normal_texture: None,
        }
    }
}

impl SerializableObject for Material {
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
        ctx.set_field("Shader", &self.shader)?;
        ctx.set_field("BaseColor", &self.base_color)?;
        ctx.set_field("Metallic", &unit_range("Metallic", self.metallic)?)?;
        ctx.set_field("Roughness", &unit_range("Roughness", self.roughness)?)?;
        ctx.set_reference("AlbedoTexture", self.albedo_texture);
        ctx.set_reference("NormalTexture", self.normal_texture);
        Ok(())
    }

    fn deserialize(&mut self, ctx: &mut LoadContext<'_>) -> AssetResult<()> {
        if let Some(shader) = ctx.optional_field("Shader")? {
            self.shader = shader;
        }
        if let Some(color) = ctx.optional_field("BaseColor")? {
            self.base_color = color;
        }
        if let Some(metallic) = ctx.optional_field::<f32>("Metallic")? {
            self.metallic = unit_range("Metallic", metallic)?;
        }
        if let Some(roughness) = ctx.optional_field::<f32>("Roughness")? {
            self.roughness = unit_range("Roughness", roughness)?;
        }

        self.albedo_texture = ctx.reference("AlbedoTexture")?;
        self.normal_texture = ctx.reference("NormalTexture")?;
        for texture in self.textures().collect::<Vec<_>>() {
            ctx.resolve(texture)?;
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
