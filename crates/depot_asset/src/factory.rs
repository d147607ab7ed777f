//! Class-name keyed object construction
//!
//! Payload types are registered once at startup under the class name that
//! appears in the `ClassName` header key. Assets only ever construct payloads
//! through [`ObjectFactory::create_serializable_object`].

use core::any::Any;
use core::fmt;
use std::collections::BTreeMap;

use depot_core::AssetHandle;

use crate::context::{LoadContext, SaveContext};
use crate::error::AssetResult;
use crate::payloads::{Material, Model, Scene, TextureSrc};

/// A payload that can live inside an asset
pub trait SerializableObject: Any + Send + Sync {
    /// Class name this object is registered under
    fn class_name(&self) -> &str;

    /// Handle of the asset this object belongs to
    fn serialization_id(&self) -> AssetHandle;

    fn set_serialization_id(&mut self, id: AssetHandle);

    /// Write payload fields. References must go through the context so they
    /// are recorded as dependencies.
    fn serialize(&self, ctx: &mut SaveContext<'_>) -> AssetResult<()>;

    /// Read payload fields, resolving referenced assets as needed
    fn deserialize(&mut self, ctx: &mut LoadContext<'_>) -> AssetResult<()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

type Constructor = Box<dyn Fn() -> Box<dyn SerializableObject> + Send + Sync>;

/// Registry of payload constructors
#[derive(Default)]
pub struct ObjectFactory {
    constructors: BTreeMap<String, Constructor>,
}

impl ObjectFactory {
    /// Create an empty factory
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a factory with the built-in payload classes registered
    pub fn with_builtin_classes() -> Self {
        let mut factory = Self::new();
        factory
            .register_class::<TextureSrc>(TextureSrc::CLASS_NAME)
            .register_class::<Material>(Material::CLASS_NAME)
            .register_class::<Model>(Model::CLASS_NAME)
            .register_class::<Scene>(Scene::CLASS_NAME);
        factory
    }

    /// Register `T` under `name`, constructed with `T::default()`
    pub fn register_class<T>(&mut self, name: impl Into<String>) -> &mut Self
    where
        T: SerializableObject + Default,
    {
        self.register_constructor(name, || Box::new(T::default()))
    }

    /// Register an arbitrary constructor under `name`
    pub fn register_constructor<F>(&mut self, name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn() -> Box<dyn SerializableObject> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.constructors.insert(name.clone(), Box::new(constructor)).is_some() {
            log::warn!("Replaced constructor for class '{}'", name);
        }
        self
    }

    /// Construct a fresh object of class `name`
    ///
    /// Returns `None` (and logs) for an unregistered name.
    pub fn create_serializable_object(&self, name: &str) -> Option<Box<dyn SerializableObject>> {
        match self.constructors.get(name) {
            Some(constructor) => Some(constructor()),
            None => {
                log::error!("No class registered under '{}'", name);
                None
            }
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered class names, sorted
    pub fn class_names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl fmt::Debug for ObjectFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectFactory")
            .field("classes", &self.class_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_classes() {
        let factory = ObjectFactory::with_builtin_classes();
        assert_eq!(factory.class_names(), vec!["Material", "Model", "Scene", "TextureSrc"]);

        let object = factory.create_serializable_object("Model").unwrap();
        assert_eq!(object.class_name(), "Model");
        assert!(object.as_any().downcast_ref::<Model>().is_some());
    }

    #[test]
    fn test_unregistered_class() {
        let factory = ObjectFactory::new();
        assert!(factory.is_empty());
        assert!(!factory.is_registered("Model"));
        assert!(factory.create_serializable_object("Model").is_none());
    }

    #[test]
    fn test_custom_constructor() {
        let mut factory = ObjectFactory::new();
        factory.register_constructor("Glass", || {
            let mut material = Material::default();
            material.roughness = 0.05;
            Box::new(material)
        });

        let object = factory.create_serializable_object("Glass").unwrap();
        let material = object.as_any().downcast_ref::<Material>().unwrap();
        assert_eq!(material.roughness, 0.05);
        assert_eq!(factory.len(), 1);
    }
}
