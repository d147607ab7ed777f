//! # depot_asset - Asset Registry
//!
//! Discovers, loads, caches and saves on-disk asset containers:
//! - Container: flat JSON key/value document, one per asset
//! - ObjectFactory: class-name keyed payload constructors
//! - Asset: metadata, lock-guarded payload and dependency edges
//! - AssetRegistry: sharded handle-keyed table of all known assets
//! - AssetManager: pooled load/save/unload/delete and project scanning
//!
//! ## Example
//!
//! ```ignore
//! use depot_asset::prelude::*;
//!
//! let manager = AssetManager::new(AssetManagerConfig::with_root("game"))?;
//! manager.scan_project()?;
//!
//! let cube = manager.create_asset("cube", "/models/cube.json", "Model")?;
//! wait_result(manager.load_asset(cube)?)?;
//! wait_result(manager.save_asset(cube)?)?;
//! ```

pub mod asset;
pub mod config;
pub mod container;
pub mod context;
pub mod error;
pub mod event;
pub mod factory;
pub mod manager;
pub mod metadata;
pub mod payloads;
pub mod registry;

pub use asset::{Asset, AssetState};
pub use config::{AssetManagerConfig, DeletePolicy};
pub use container::Container;
pub use context::{LoadContext, SaveContext};
pub use error::{AssetError, AssetResult};
pub use event::AssetEvent;
pub use factory::{ObjectFactory, SerializableObject};
pub use manager::{wait_result, AssetManager, AssetTask};
pub use metadata::MetaData;
pub use registry::AssetRegistry;

pub use depot_core::AssetHandle;

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::asset::{Asset, AssetState};
    pub use crate::config::{AssetManagerConfig, DeletePolicy};
    pub use crate::error::{AssetError, AssetResult};
    pub use crate::event::AssetEvent;
    pub use crate::factory::{ObjectFactory, SerializableObject};
    pub use crate::manager::{wait_result, AssetManager};
    pub use crate::payloads::{Material, Model, Scene, TextureSrc};
    pub use depot_core::AssetHandle;
}
