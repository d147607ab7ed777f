//! Contexts handed to payload (de)serialization

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::sync::Arc;

use depot_core::AssetHandle;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::asset::Asset;
use crate::container::Container;
use crate::error::{AssetError, AssetResult};
use crate::registry::AssetRegistry;

thread_local! {
    /// Handles whose load is in progress on this thread, outermost first
    static LOADING: RefCell<Vec<AssetHandle>> = const { RefCell::new(Vec::new()) };
}

/// Marks a handle as being loaded on the current thread
///
/// Entering a handle that is already on the stack means the dependency graph
/// loops back to it. Taking its lock again would deadlock the thread.
pub(crate) struct LoadingGuard(AssetHandle);

impl LoadingGuard {
    pub(crate) fn enter(handle: AssetHandle) -> AssetResult<Self> {
        LOADING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&handle) {
                log::error!("Dependency cycle while loading {}: {:?}", handle, *stack);
                return Err(AssetError::DependencyCycle(handle));
            }
            stack.push(handle);
            Ok(Self(handle))
        })
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        LOADING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(index) = stack.iter().rposition(|h| *h == self.0) {
                stack.remove(index);
            }
        });
    }
}

/// Read access to an asset's container during load
pub struct LoadContext<'a> {
    asset: &'a Asset,
    registry: &'a AssetRegistry,
    container: &'a Container,
    resolved: BTreeSet<AssetHandle>,
}

impl<'a> LoadContext<'a> {
    pub(crate) fn new(asset: &'a Asset, registry: &'a AssetRegistry, container: &'a Container) -> Self {
        Self {
            asset,
            registry,
            container,
            resolved: BTreeSet::new(),
        }
    }

    /// Handle of the asset being loaded
    pub fn handle(&self) -> AssetHandle {
        self.asset.handle()
    }

    /// The raw container
    pub fn container(&self) -> &Container {
        self.container
    }

    /// Decode a required field
    pub fn field<T: DeserializeOwned>(&self, key: &str) -> AssetResult<T> {
        self.container
            .get_as(key)?
            .ok_or_else(|| AssetError::MissingField(key.to_string()))
    }

    /// Decode a field, `T::default()` when absent
    pub fn field_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> AssetResult<T> {
        Ok(self.container.get_as(key)?.unwrap_or_default())
    }

    /// Decode an optional field
    pub fn optional_field<T: DeserializeOwned>(&self, key: &str) -> AssetResult<Option<T>> {
        self.container.get_as(key)
    }

    /// Read a single handle reference without loading it
    pub fn reference(&self, key: &str) -> AssetResult<Option<AssetHandle>> {
        self.container.get_handle(key)
    }

    /// Read a handle array without loading the referenced assets
    pub fn references(&self, key: &str) -> AssetResult<Vec<AssetHandle>> {
        self.container.get_handles(key)
    }

    /// Load `handle` on this thread and link it as a child of this asset
    pub fn resolve(&mut self, handle: AssetHandle) -> AssetResult<Arc<Asset>> {
        self.registry.observe_all([&handle]);
        let child = self.registry.get(handle).ok_or_else(|| {
            log::error!("{} references missing asset {}", self.asset.handle(), handle);
            AssetError::NotFound(handle)
        })?;

        child.load_asset(self.registry)?;
        self.asset.link_child(&child);
        self.resolved.insert(handle);
        Ok(child)
    }

    /// Handles resolved so far
    pub fn resolved(&self) -> &BTreeSet<AssetHandle> {
        &self.resolved
    }

    pub(crate) fn into_resolved(self) -> BTreeSet<AssetHandle> {
        self.resolved
    }
}

/// Write access to a scratch container during save
pub struct SaveContext<'a> {
    handle: AssetHandle,
    container: &'a mut Container,
    references: BTreeSet<AssetHandle>,
}

impl<'a> SaveContext<'a> {
    pub(crate) fn new(handle: AssetHandle, container: &'a mut Container) -> Self {
        Self {
            handle,
            container,
            references: BTreeSet::new(),
        }
    }

    /// Handle of the asset being saved
    pub fn handle(&self) -> AssetHandle {
        self.handle
    }

    /// Encode a field
    pub fn set_field<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> AssetResult<()> {
        self.container.set_as(key, value)
    }

    /// Write a single handle reference and record it as a dependency
    pub fn set_reference(&mut self, key: &str, handle: Option<AssetHandle>) {
        if let Some(handle) = handle {
            self.record_reference(handle);
        }
        self.container.set_handle(key, handle);
    }

    /// Write a handle array and record every entry as a dependency
    pub fn set_references(&mut self, key: &str, handles: &[AssetHandle]) {
        for handle in handles {
            self.record_reference(*handle);
        }
        self.container.set_handles(key, handles);
    }

    /// Record a dependency written by other means (e.g. nested inside a field)
    pub fn record_reference(&mut self, handle: AssetHandle) {
        if !handle.is_null() {
            self.references.insert(handle);
        }
    }

    pub fn references(&self) -> &BTreeSet<AssetHandle> {
        &self.references
    }

    pub(crate) fn into_references(self) -> BTreeSet<AssetHandle> {
        self.references
    }
}
