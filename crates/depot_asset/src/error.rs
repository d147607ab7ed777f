//! Asset errors

use std::path::PathBuf;

use depot_core::AssetHandle;
use depot_tasks::{Interrupted, TaskError};
use thiserror::Error;

/// Asset system error
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Asset not found: {0}")]
    NotFound(AssetHandle),

    #[error("Invalid metadata for '{path}': {reason}")]
    InvalidMetadata { path: String, reason: String },

    #[error("Unregistered class: {0}")]
    UnregisteredClass(String),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in '{path}': {message}")]
    Parse { path: String, message: String },

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Asset {0} has no loaded payload")]
    NotLoaded(AssetHandle),

    #[error("Dependency cycle through asset {0}")]
    DependencyCycle(AssetHandle),

    #[error("Asset {handle} is still referenced by {dependents:?}")]
    HasDependents {
        handle: AssetHandle,
        dependents: Vec<AssetHandle>,
    },

    #[error("Failed to start worker threads: {0}")]
    Pool(#[source] std::io::Error),

    #[error("Operation interrupted")]
    Interrupted(#[from] Interrupted),

    #[error(transparent)]
    Task(#[from] TaskError),
}

impl AssetError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_field(field: &str, message: impl ToString) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// Result type for asset operations
pub type AssetResult<T> = Result<T, AssetError>;
