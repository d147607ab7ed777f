//! Asset lifecycle events

use depot_core::AssetHandle;

/// Event from the asset manager, drained by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetEvent {
    /// Header registered by a project scan
    Discovered(AssetHandle),
    /// Asset created in memory
    Created(AssetHandle),
    /// Payload constructed
    Loaded(AssetHandle),
    /// Payload dropped
    Unloaded(AssetHandle),
    /// Written to disk
    Saved(AssetHandle),
    /// Removed from the registry
    Deleted(AssetHandle),
    /// An operation on the asset failed
    Failed { handle: AssetHandle, error: String },
}

impl AssetEvent {
    /// Handle the event refers to
    pub fn handle(&self) -> AssetHandle {
        match self {
            Self::Discovered(h)
            | Self::Created(h)
            | Self::Loaded(h)
            | Self::Unloaded(h)
            | Self::Saved(h)
            | Self::Deleted(h) => *h,
            Self::Failed { handle, .. } => *handle,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}
