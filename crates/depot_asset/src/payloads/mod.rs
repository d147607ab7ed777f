//! Built-in payload classes
//!
//! Reference chain: a `Scene` places `Model`s, a `Model` applies `Material`s,
//! a `Material` samples `TextureSrc`s. Each link is a handle that is resolved
//! (and therefore loaded) while the referencing payload deserializes.

pub mod material;
pub mod model;
pub mod scene;
pub mod texture;

pub use material::Material;
pub use model::{Bounds, Model};
pub use scene::{Scene, SceneNode, Transform};
pub use texture::TextureSrc;
