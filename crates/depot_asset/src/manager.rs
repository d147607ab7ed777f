//! Asset manager - orchestrates the registry and the worker pool
//!
//! Every per-asset operation looks the handle up on the calling thread and
//! submits the work to the pool, returning a [`TaskHandle`]. Operations on
//! the same asset serialize on that asset's lock; operations on different
//! assets run in parallel up to the pool size.

use core::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use depot_core::AssetHandle;
use depot_tasks::{interruption_point, PoolConfig, TaskHandle, ThreadPool};

use crate::asset::Asset;
use crate::config::{AssetManagerConfig, DeletePolicy};
use crate::container::Container;
use crate::error::{AssetError, AssetResult};
use crate::event::AssetEvent;
use crate::factory::ObjectFactory;
use crate::metadata::MetaData;
use crate::registry::AssetRegistry;

/// Pending result of a pooled asset operation
pub type AssetTask = TaskHandle<AssetResult<()>>;

/// Block on a pooled operation and flatten task failures into [`AssetError`]
pub fn wait_result<T>(task: TaskHandle<AssetResult<T>>) -> AssetResult<T> {
    task.wait()?
}

/// The asset system's front door
pub struct AssetManager {
    config: AssetManagerConfig,
    registry: Arc<AssetRegistry>,
    pool: ThreadPool,
}

impl AssetManager {
    /// Create a manager with the built-in payload classes
    pub fn new(config: AssetManagerConfig) -> AssetResult<Self> {
        Self::with_factory(config, ObjectFactory::with_builtin_classes())
    }

    /// Create a manager with a caller-built factory
    pub fn with_factory(config: AssetManagerConfig, factory: ObjectFactory) -> AssetResult<Self> {
        let pool = ThreadPool::new(PoolConfig {
            worker_threads: config.worker_threads,
            thread_name: "depot-asset".to_string(),
        })
        .map_err(AssetError::Pool)?;

        let registry = Arc::new(AssetRegistry::new(
            config.project_root.clone(),
            factory,
            config.bucket_count,
        ));

        log::info!(
            "Asset manager ready: root '{}', {} workers, classes {:?}",
            config.project_root.display(),
            pool.worker_count(),
            registry.factory().class_names()
        );

        Ok(Self {
            config,
            registry,
            pool,
        })
    }

    pub fn config(&self) -> &AssetManagerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<AssetRegistry> {
        &self.registry
    }

    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    /// Register the headers of every container file below the project root
    pub fn scan_project(&self) -> AssetResult<usize> {
        let root = self.config.project_root.clone();
        self.load_project(root)
    }

    /// Register the headers of every container file below `path`
    ///
    /// Payloads are not loaded. Headers are parsed on the pool, one task per
    /// file. Unreadable files, files without an `ObjectID` and duplicate ids
    /// are skipped with a warning. Returns the number of assets registered.
    pub fn load_project(&self, path: impl AsRef<Path>) -> AssetResult<usize> {
        let scan_root = path.as_ref().to_path_buf();
        let mut files = Vec::new();
        collect_containers(&scan_root, &self.config, &mut files)
            .map_err(|e| AssetError::io(&scan_root, e))?;

        log::debug!("Found {} container files under {}", files.len(), scan_root.display());

        let tasks: Vec<_> = files
            .into_iter()
            .map(|file| {
                let registry = Arc::clone(&self.registry);
                let scan_root = scan_root.clone();
                self.pool.submit(move || register_file(&registry, &file, &scan_root))
            })
            .collect();

        let mut registered = 0;
        for task in tasks {
            match task.wait() {
                Ok(true) => registered += 1,
                Ok(false) => {}
                Err(e) => log::error!("Header scan task failed: {}", e),
            }
        }

        log::info!("Registered {} assets from {}", registered, scan_root.display());
        Ok(registered)
    }

    /// Create an in-memory asset; nothing touches disk until its first save
    pub fn create_asset(
        &self,
        name: impl Into<String>,
        path_on_disk: impl Into<String>,
        class_id: impl Into<String>,
    ) -> AssetResult<AssetHandle> {
        let handle = self.registry.allocate_handle();
        let meta = MetaData::new(handle, name, path_on_disk, class_id);
        if let Some(err) = meta.validation_error() {
            log::error!("Cannot create asset: {}", err);
            return Err(err);
        }

        let path = meta.path_on_disk.clone();
        if !self.registry.insert(Asset::created(meta)) {
            log::error!("Freshly allocated handle {} already registered", handle);
            return Err(AssetError::InvalidMetadata {
                path,
                reason: format!("handle {} already registered", handle),
            });
        }

        self.registry.emit(AssetEvent::Created(handle));
        log::debug!("Created asset {} at '{}'", handle, path);
        Ok(handle)
    }

    /// Load the payload of `handle` on the pool
    pub fn load_asset(&self, handle: AssetHandle) -> AssetResult<AssetTask> {
        self.submit_for(handle, "Load", move |registry, asset| {
            let result = asset.load_asset(registry);
            registry.record(handle, &result, AssetEvent::Loaded(handle));
            result
        })
    }

    /// Drop the payload of `handle` on the pool
    pub fn unload_asset(&self, handle: AssetHandle) -> AssetResult<AssetTask> {
        self.submit_for(handle, "Unload", move |registry, asset| {
            asset.unload_asset();
            registry.emit(AssetEvent::Unloaded(handle));
            Ok(())
        })
    }

    /// Write the payload of `handle` to disk on the pool
    pub fn save_asset(&self, handle: AssetHandle) -> AssetResult<AssetTask> {
        self.submit_for(handle, "Save", move |registry, asset| {
            let result = asset.save_asset(registry);
            registry.record(handle, &result, AssetEvent::Saved(handle));
            result
        })
    }

    /// Unload `handle` and remove it from the registry on the pool
    ///
    /// The file on disk is left alone.
    pub fn delete_asset(&self, handle: AssetHandle) -> AssetResult<AssetTask> {
        let policy = self.config.delete_policy;
        self.submit_for(handle, "Delete", move |registry, asset| {
            let result = delete_from(registry, asset, policy);
            registry.record(handle, &result, AssetEvent::Deleted(handle));
            result
        })
    }

    /// Submit a load for every registered asset
    pub fn load_all(&self) -> Vec<(AssetHandle, AssetTask)> {
        self.registry
            .handles()
            .into_iter()
            .filter_map(|handle| self.load_asset(handle).ok().map(|task| (handle, task)))
            .collect()
    }

    pub fn get_asset(&self, handle: AssetHandle) -> Option<Arc<Asset>> {
        self.registry.get(handle)
    }

    pub fn find_by_path(&self, path: &str) -> Option<Arc<Asset>> {
        self.registry.find_by_path(path)
    }

    pub fn handles(&self) -> Vec<AssetHandle> {
        self.registry.handles()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn drain_events(&self) -> Vec<AssetEvent> {
        self.registry.drain_events()
    }

    /// Stop the pool. Queued operations resolve as abandoned.
    pub fn shutdown(&mut self) {
        self.pool.shutdown();
    }

    fn submit_for<F>(&self, handle: AssetHandle, operation: &str, f: F) -> AssetResult<AssetTask>
    where
        F: FnOnce(&AssetRegistry, &Asset) -> AssetResult<()> + Send + 'static,
    {
        let asset = self.registry.get(handle).ok_or_else(|| {
            log::warn!("{} requested for unknown asset {}", operation, handle);
            AssetError::NotFound(handle)
        })?;

        let registry = Arc::clone(&self.registry);
        Ok(self.pool.submit(move || {
            interruption_point()?;
            f(&*registry, &*asset)
        }))
    }
}

impl fmt::Debug for AssetManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetManager")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("pool", &self.pool)
            .finish()
    }
}

/// Recursively collect files with the container extension
fn collect_containers(
    dir: &Path,
    config: &AssetManagerConfig,
    out: &mut Vec<PathBuf>,
) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if let Err(e) = collect_containers(&path, config, out) {
                log::warn!("Skipping directory {}: {}", path.display(), e);
            }
        } else if config.is_container(&path) {
            out.push(path);
        }
    }
    Ok(())
}

/// Parse one file's header and register it. Returns whether it was registered.
fn register_file(registry: &AssetRegistry, file: &Path, scan_root: &Path) -> bool {
    let container = match Container::read(file) {
        Ok(container) => container,
        Err(e) => {
            log::warn!("Skipping {}: {}", file.display(), e);
            return false;
        }
    };

    let fallback_path = registry.project_path(file, scan_root);
    let meta = match MetaData::from_container(&container, &fallback_path) {
        Ok(meta) => meta,
        Err(e) => {
            log::warn!("Skipping {}: {}", file.display(), e);
            return false;
        }
    };

    let handle = meta.asset_id;
    if handle.is_null() {
        log::warn!("Skipping {}: null ObjectID", file.display());
        return false;
    }
    if let Some(err) = meta.validation_error() {
        log::warn!("{} registered but not loadable: {}", file.display(), err);
    }

    if !registry.insert(Asset::discovered(meta, file)) {
        log::warn!("Skipping {}: duplicate asset id {}", file.display(), handle);
        return false;
    }

    registry.emit(AssetEvent::Discovered(handle));
    true
}

fn delete_from(registry: &AssetRegistry, asset: &Asset, policy: DeletePolicy) -> AssetResult<()> {
    let handle = asset.handle();

    if policy == DeletePolicy::Reject {
        let dependents = registry.dependents_of(handle);
        if !dependents.is_empty() {
            log::warn!("Refusing to delete {}: referenced by {:?}", handle, dependents);
            return Err(AssetError::HasDependents { handle, dependents });
        }
    }

    asset.unload_asset();
    if registry.remove(handle).is_none() {
        return Err(AssetError::NotFound(handle));
    }

    for neighbour in asset.parents().into_iter().chain(asset.children()) {
        if let Some(other) = registry.get(neighbour) {
            other.unlink(handle);
        }
    }

    log::info!("Deleted asset {} '{}'", handle, asset.name());
    Ok(())
}
