//! Asset manager configuration

use std::path::PathBuf;

use depot_structures::DEFAULT_BUCKET_COUNT;
use serde::{Deserialize, Serialize};

/// What `delete_asset` does when other assets still reference the target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletePolicy {
    /// Delete anyway; edges are unlinked, dependency lists keep the dangling handle
    #[default]
    Orphan,
    /// Refuse with `AssetError::HasDependents`
    Reject,
}

impl std::str::FromStr for DeletePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "orphan" => Ok(Self::Orphan),
            "reject" => Ok(Self::Reject),
            _ => Err(format!("Unknown delete policy: {}", s)),
        }
    }
}

/// Asset manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetManagerConfig {
    /// Directory project-rooted paths are resolved against
    pub project_root: PathBuf,
    /// Extension of container files, without the dot
    pub container_extension: String,
    /// Pool size; `None` uses the hardware parallelism
    pub worker_threads: Option<usize>,
    /// Registry shard count
    pub bucket_count: usize,
    pub delete_policy: DeletePolicy,
}

impl Default for AssetManagerConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("assets"),
            container_extension: "json".to_string(),
            worker_threads: None,
            bucket_count: DEFAULT_BUCKET_COUNT,
            delete_policy: DeletePolicy::Orphan,
        }
    }
}

impl AssetManagerConfig {
    /// Default configuration rooted at `project_root`
    pub fn with_root(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            ..Self::default()
        }
    }

    /// Check if `path` has the container extension
    pub fn is_container(&self, path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.container_extension))
    }
}
