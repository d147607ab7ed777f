//! Asset node
//!
//! An asset pairs immutable metadata with a lock-guarded content slot (the
//! container snapshot and at most one payload) and a separately locked set
//! of graph edges. Load, unload and save of one asset serialize on its
//! content lock; edges and dependencies can be read at any time.
//!
//! Edges are handles, resolved back through the registry, which is the only
//! owner of `Arc<Asset>`.

use core::fmt;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};

use depot_core::AssetHandle;
use parking_lot::{Mutex, RwLock};

use crate::container::Container;
use crate::context::{LoadContext, LoadingGuard, SaveContext};
use crate::error::{AssetError, AssetResult};
use crate::factory::SerializableObject;
use crate::metadata::MetaData;
use crate::registry::AssetRegistry;

/// Asset load state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AssetState {
    /// No payload
    Unloaded = 0,
    /// Payload being constructed
    Loading = 1,
    /// Payload present
    Loaded = 2,
    /// Payload being written to disk
    Saving = 3,
}

impl AssetState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Loading,
            2 => Self::Loaded,
            3 => Self::Saving,
            _ => Self::Unloaded,
        }
    }
}

struct Content {
    /// `None` until the file is first read; created assets start with their header
    container: Option<Container>,
    payload: Option<Box<dyn SerializableObject>>,
}

#[derive(Default)]
struct Links {
    parents: BTreeSet<AssetHandle>,
    children: BTreeSet<AssetHandle>,
    dependencies: BTreeSet<AssetHandle>,
}

/// A unit of persisted content
pub struct Asset {
    meta: MetaData,
    /// File the header was scanned from, when known
    source_file: Option<PathBuf>,
    content: Mutex<Content>,
    links: RwLock<Links>,
    state: AtomicU8,
}

impl Asset {
    fn with_container(
        mut meta: MetaData,
        source_file: Option<PathBuf>,
        container: Option<Container>,
    ) -> Self {
        let dependencies = std::mem::take(&mut meta.dependencies);
        Self {
            meta,
            source_file,
            content: Mutex::new(Content {
                container,
                payload: None,
            }),
            links: RwLock::new(Links {
                dependencies,
                ..Links::default()
            }),
            state: AtomicU8::new(AssetState::Unloaded as u8),
        }
    }

    /// An asset known from a header scan of `file`; the file is read on first load
    pub(crate) fn discovered(meta: MetaData, file: impl Into<PathBuf>) -> Self {
        Self::with_container(meta, Some(file.into()), None)
    }

    /// An asset that exists only in memory until its first save
    pub(crate) fn created(meta: MetaData) -> Self {
        let mut container = Container::new();
        meta.write_header(&mut container);
        Self::with_container(meta, None, Some(container))
    }

    pub fn handle(&self) -> AssetHandle {
        self.meta.asset_id
    }

    pub fn name(&self) -> &str {
        &self.meta.asset_name
    }

    pub fn path_on_disk(&self) -> &str {
        &self.meta.path_on_disk
    }

    pub fn class_id(&self) -> &str {
        &self.meta.class_id
    }

    /// File the asset was scanned from, if it was found by a scan
    pub fn source_file(&self) -> Option<&Path> {
        self.source_file.as_deref()
    }

    /// File loads read from and saves write to
    ///
    /// The scanned file when there is one, else `path_on_disk` below the
    /// project root.
    pub fn file_path(&self, registry: &AssetRegistry) -> PathBuf {
        match &self.source_file {
            Some(file) => file.clone(),
            None => registry.resolve_path(&self.meta.path_on_disk),
        }
    }

    /// Metadata snapshot including the current dependency set
    pub fn metadata(&self) -> MetaData {
        MetaData {
            dependencies: self.dependencies(),
            ..self.meta.clone()
        }
    }

    pub fn state(&self) -> AssetState {
        AssetState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: AssetState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state(), AssetState::Loaded | AssetState::Saving)
    }

    pub fn parents(&self) -> BTreeSet<AssetHandle> {
        self.links.read().parents.clone()
    }

    pub fn children(&self) -> BTreeSet<AssetHandle> {
        self.links.read().children.clone()
    }

    /// Handles this asset references, as last loaded or saved
    pub fn dependencies(&self) -> BTreeSet<AssetHandle> {
        self.links.read().dependencies.clone()
    }

    /// Check if this asset lists `handle` as a dependency
    pub fn depends_on(&self, handle: AssetHandle) -> bool {
        self.links.read().dependencies.contains(&handle)
    }

    /// Record `child` as a child of this asset, and this asset as its parent
    pub(crate) fn link_child(&self, child: &Asset) {
        self.links.write().children.insert(child.handle());
        child.links.write().parents.insert(self.handle());
    }

    /// Forget every edge to `handle`
    pub(crate) fn unlink(&self, handle: AssetHandle) {
        let mut links = self.links.write();
        links.parents.remove(&handle);
        links.children.remove(&handle);
    }

    /// Construct and deserialize the payload
    ///
    /// A no-op when the payload is already present. Referenced assets are
    /// loaded on the calling thread while this asset's lock is held.
    pub fn load_asset(&self, registry: &AssetRegistry) -> AssetResult<()> {
        if let Some(err) = self.meta.validation_error() {
            log::error!("Refusing to load {}: {}", self.handle(), err);
            return Err(err);
        }

        let _loading = LoadingGuard::enter(self.handle())?;
        let mut content = self.content.lock();
        if content.payload.is_some() {
            return Ok(());
        }

        self.set_state(AssetState::Loading);
        match self.load_locked(&mut content, registry) {
            Ok(payload) => {
                content.payload = Some(payload);
                self.set_state(AssetState::Loaded);
                log::debug!("Loaded {} '{}' ({})", self.handle(), self.name(), self.class_id());
                Ok(())
            }
            Err(e) => {
                self.set_state(AssetState::Unloaded);
                log::error!("Failed to load {} '{}': {}", self.handle(), self.name(), e);
                Err(e)
            }
        }
    }

    fn load_locked(
        &self,
        content: &mut Content,
        registry: &AssetRegistry,
    ) -> AssetResult<Box<dyn SerializableObject>> {
        if content.container.is_none() {
            content.container = Some(Container::read(&self.file_path(registry))?);
        }
        let container = content
            .container
            .as_ref()
            .ok_or(AssetError::NotLoaded(self.handle()))?;

        let mut payload = registry
            .factory()
            .create_serializable_object(&self.meta.class_id)
            .ok_or_else(|| AssetError::UnregisteredClass(self.meta.class_id.clone()))?;
        payload.set_serialization_id(self.handle());

        let mut ctx = LoadContext::new(self, registry, container);
        payload.deserialize(&mut ctx)?;

        let resolved = ctx.into_resolved();
        self.links.write().dependencies.extend(resolved);
        Ok(payload)
    }

    /// Drop the payload. Metadata and edges stay. Returns whether one was loaded.
    pub fn unload_asset(&self) -> bool {
        let mut content = self.content.lock();
        let was_loaded = content.payload.take().is_some();
        self.set_state(AssetState::Unloaded);
        if was_loaded {
            log::debug!("Unloaded {} '{}'", self.handle(), self.name());
        }
        was_loaded
    }

    /// Serialize the payload and write it to disk
    ///
    /// Either the file, the container snapshot and the dependency set are all
    /// updated, or none of them is.
    pub fn save_asset(&self, registry: &AssetRegistry) -> AssetResult<()> {
        let mut content = self.content.lock();
        let Some(payload) = content.payload.as_deref() else {
            log::error!("Cannot save {} '{}': not loaded", self.handle(), self.name());
            return Err(AssetError::NotLoaded(self.handle()));
        };

        self.set_state(AssetState::Saving);
        let result = self.save_locked(payload, content.container.as_ref(), registry);
        self.set_state(AssetState::Loaded);

        match result {
            Ok(container) => {
                content.container = Some(container);
                log::debug!("Saved {} to '{}'", self.handle(), self.path_on_disk());
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to save {} '{}': {}", self.handle(), self.name(), e);
                Err(e)
            }
        }
    }

    fn save_locked(
        &self,
        payload: &dyn SerializableObject,
        previous: Option<&Container>,
        registry: &AssetRegistry,
    ) -> AssetResult<Container> {
        let mut scratch = previous.cloned().unwrap_or_default();
        let mut ctx = SaveContext::new(self.handle(), &mut scratch);
        payload.serialize(&mut ctx)?;
        let dependencies = ctx.into_references();
        registry.observe_all(&dependencies);

        let header = MetaData {
            dependencies: dependencies.clone(),
            ..self.meta.clone()
        };
        header.write_header(&mut scratch);

        // Check and publish together so two concurrent saves can not close a cycle
        let replaced = {
            let _guard = registry.save_guard();
            if registry.reaches(&dependencies, self.handle()) {
                return Err(AssetError::DependencyCycle(self.handle()));
            }
            std::mem::replace(&mut self.links.write().dependencies, dependencies)
        };

        if let Err(e) = scratch.write(&self.file_path(registry)) {
            let _guard = registry.save_guard();
            self.links.write().dependencies = replaced;
            return Err(e);
        }
        Ok(scratch)
    }

    /// Run `f` on the payload if it is loaded and of type `T`
    pub fn with_payload<T, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R>
    where
        T: SerializableObject,
    {
        let content = self.content.lock();
        content.payload.as_deref()?.as_any().downcast_ref::<T>().map(f)
    }

    /// Run `f` on the payload mutably if it is loaded and of type `T`
    pub fn with_payload_mut<T, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R>
    where
        T: SerializableObject,
    {
        let mut content = self.content.lock();
        content
            .payload
            .as_deref_mut()?
            .as_any_mut()
            .downcast_mut::<T>()
            .map(f)
    }

    /// Class name of the live payload
    pub fn payload_class(&self) -> Option<String> {
        let content = self.content.lock();
        content.payload.as_ref().map(|p| p.class_name().to_string())
    }
}

impl fmt::Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Asset")
            .field("handle", &self.handle())
            .field("name", &self.meta.asset_name)
            .field("path", &self.meta.path_on_disk)
            .field("class", &self.meta.class_id)
            .field("state", &self.state())
            .finish()
    }
}
