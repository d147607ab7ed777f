//! Texture source descriptor

use core::any::Any;

use depot_core::AssetHandle;

use crate::context::{LoadContext, SaveContext};
use crate::error::AssetResult;
use crate::factory::SerializableObject;

/// Points at a source image and says how to import it
#[derive(Debug, Clone, PartialEq)]
pub struct TextureSrc {
    id: AssetHandle,
    /// Image file, relative to the project root
    pub source_image: String,
    pub width: u32,
    pub height: u32,
    pub srgb: bool,
    pub mip_levels: u32,
}

impl TextureSrc {
    pub const CLASS_NAME: &'static str = "TextureSrc";

    /// Number of mips a full chain would have for this size
    pub fn full_mip_chain(&self) -> u32 {
        32 - self.width.max(self.height).max(1).leading_zeros()
    }
}

impl Default for TextureSrc {
    fn default() -> Self {
        Self {
            id: AssetHandle::NULL,
            source_image: String::new(),
            width: 1,
            height: 1,
            srgb: true,
            mip_levels: 1,
        }
    }
}

impl SerializableObject for TextureSrc {
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
        ctx.set_field("SourceImage", &self.source_image)?;
        ctx.set_field("Width", &self.width)?;
        ctx.set_field("Height", &self.height)?;
        ctx.set_field("Srgb", &self.srgb)?;
        ctx.set_field("MipLevels", &self.mip_levels)
    }

    fn deserialize(&mut self, ctx: &mut LoadContext<'_>) -> AssetResult<()> {
        if let Some(source) = ctx.optional_field("SourceImage")? {
            self.source_image = source;
        }
        if let Some(width) = ctx.optional_field("Width")? {
            self.width = width;
        }
        if let Some(height) = ctx.optional_field("Height")? {
            self.height = height;
        }
        if let Some(srgb) = ctx.optional_field("Srgb")? {
            self.srgb = srgb;
        }
        if let Some(mips) = ctx.optional_field("MipLevels")? {
            self.mip_levels = mips;
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
        let (_dir, registry) = registry_with(&[]);
        let mut texture = TextureSrc {
            source_image: "images/bricks.png".to_string(),
            width: 1024,
            height: 512,
            srgb: false,
            mip_levels: 11,
            ..TextureSrc::default()
        };
        texture.set_serialization_id(AssetHandle::new(8));

        let (copy, references) = round_trip(&registry, &texture);
        assert_eq!(copy, texture);
        assert!(references.is_empty());
    }

    #[test]
    fn test_full_mip_chain() {
        let texture = TextureSrc {
            width: 1024,
            height: 256,
            ..TextureSrc::default()
        };
        assert_eq!(texture.full_mip_chain(), 11);
        assert_eq!(TextureSrc::default().full_mip_chain(), 1);
    }
}
