//! Handle-keyed asset table

use core::fmt;
use std::collections::{BTreeSet, VecDeque};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use depot_core::{AssetHandle, HandleAllocator};
use depot_structures::ThreadSafeMap;
use parking_lot::{Mutex, MutexGuard};

use crate::asset::Asset;
use crate::error::AssetResult;
use crate::event::AssetEvent;
use crate::factory::ObjectFactory;

/// Authoritative table of known assets
///
/// Shared by the manager and every pool task; the only owner of `Arc<Asset>`.
pub struct AssetRegistry {
    assets: ThreadSafeMap<AssetHandle, Arc<Asset>>,
    factory: ObjectFactory,
    project_root: PathBuf,
    allocator: HandleAllocator,
    events: Mutex<Vec<AssetEvent>>,
    /// Serializes the cycle check and dependency update of concurrent saves
    save_lock: Mutex<()>,
}

impl AssetRegistry {
    pub fn new(project_root: impl Into<PathBuf>, factory: ObjectFactory, bucket_count: usize) -> Self {
        Self {
            assets: ThreadSafeMap::with_buckets(bucket_count),
            factory,
            project_root: project_root.into(),
            allocator: HandleAllocator::new(),
            events: Mutex::new(Vec::new()),
            save_lock: Mutex::new(()),
        }
    }

    pub fn factory(&self) -> &ObjectFactory {
        &self.factory
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// File system location of a project-rooted path
    pub fn resolve_path(&self, path_on_disk: &str) -> PathBuf {
        let relative = path_on_disk.trim_start_matches(['/', '\\']);
        self.project_root.join(relative)
    }

    /// Project-rooted form of a file system path, `/`-separated
    ///
    /// Files outside the project root keep their path relative to `scan_root`.
    pub fn project_path(&self, file: &Path, scan_root: &Path) -> String {
        let relative = file
            .strip_prefix(&self.project_root)
            .or_else(|_| file.strip_prefix(scan_root))
            .unwrap_or(file);

        let parts: Vec<_> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy()),
                _ => None,
            })
            .collect();
        format!("/{}", parts.join("/"))
    }

    pub(crate) fn allocate_handle(&self) -> AssetHandle {
        self.allocator.allocate()
    }

    /// Keep fresh handles clear of every handle in `handles`
    pub(crate) fn observe_all<'h>(&self, handles: impl IntoIterator<Item = &'h AssetHandle>) {
        for handle in handles {
            self.allocator.observe(*handle);
        }
    }

    pub(crate) fn save_guard(&self) -> MutexGuard<'_, ()> {
        self.save_lock.lock()
    }

    /// Insert `asset` unless its handle is taken. Returns whether it was inserted.
    ///
    /// The asset's id and its dependencies are reserved in the allocator either
    /// way, so no fresh handle can alias something already referenced.
    pub fn insert(&self, asset: Asset) -> bool {
        let handle = asset.handle();
        self.allocator.observe(handle);
        self.observe_all(&asset.dependencies());
        self.assets.insert_if_absent(handle, Arc::new(asset))
    }

    pub fn get(&self, handle: AssetHandle) -> Option<Arc<Asset>> {
        self.assets.get(&handle)
    }

    pub fn contains(&self, handle: AssetHandle) -> bool {
        self.assets.contains_key(&handle)
    }

    pub(crate) fn remove(&self, handle: AssetHandle) -> Option<Arc<Asset>> {
        self.assets.remove_mapping(&handle)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// All registered handles, sorted
    pub fn handles(&self) -> Vec<AssetHandle> {
        let mut handles = self.assets.keys();
        handles.sort_unstable();
        handles
    }

    /// Every registered asset, in no particular order
    pub fn assets(&self) -> Vec<Arc<Asset>> {
        self.assets.snapshot().into_iter().map(|(_, asset)| asset).collect()
    }

    /// First asset whose project-rooted path equals `path`
    pub fn find_by_path(&self, path: &str) -> Option<Arc<Asset>> {
        let mut found = None;
        self.assets.foreach(|_, asset| {
            if found.is_none() && asset.path_on_disk() == path {
                found = Some(Arc::clone(asset));
            }
        });
        found
    }

    /// Assets that depend on `handle` or hold it as a child
    pub fn dependents_of(&self, handle: AssetHandle) -> Vec<AssetHandle> {
        let mut dependents: BTreeSet<AssetHandle> = BTreeSet::new();
        self.assets.foreach(|other, asset| {
            if *other != handle && asset.depends_on(handle) {
                dependents.insert(*other);
            }
        });
        if let Some(asset) = self.get(handle) {
            dependents.extend(asset.parents());
        }
        dependents.into_iter().collect()
    }

    /// Check if `target` is reachable from `start` along dependency sets
    pub fn reaches(&self, start: &BTreeSet<AssetHandle>, target: AssetHandle) -> bool {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<AssetHandle> = start.iter().copied().collect();

        while let Some(handle) = queue.pop_front() {
            if handle == target {
                return true;
            }
            if !seen.insert(handle) {
                continue;
            }
            if let Some(asset) = self.get(handle) {
                queue.extend(asset.dependencies());
            }
        }
        false
    }

    pub(crate) fn emit(&self, event: AssetEvent) {
        self.events.lock().push(event);
    }

    /// Emit `done` on success or a `Failed` event on error
    pub(crate) fn record(&self, handle: AssetHandle, result: &AssetResult<()>, done: AssetEvent) {
        match result {
            Ok(()) => self.emit(done),
            Err(e) => self.emit(AssetEvent::Failed {
                handle,
                error: e.to_string(),
            }),
        }
    }

    /// Take all pending events
    pub fn drain_events(&self) -> Vec<AssetEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl fmt::Debug for AssetRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetRegistry")
            .field("project_root", &self.project_root)
            .field("assets", &self.len())
            .field("factory", &self.factory)
            .finish()
    }
}
