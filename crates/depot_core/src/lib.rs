//! # depot_core - Asset Identity Primitives
//!
//! Zero-dependency identifiers shared by every depot crate:
//! - [`AssetHandle`]: the opaque 64-bit key of an asset, stable on disk
//! - [`HandleAllocator`]: thread-safe source of fresh handles

pub mod handle;

pub use handle::{AssetHandle, HandleAllocator};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::handle::{AssetHandle, HandleAllocator};
}
