//! Boot Configuration
//!
//! # Configuration Sources (later sources win)
//!
//! 1. Built-in defaults
//! 2. Config file: `$DEPOT_CONFIG`, or `depot.toml` in the working directory
//! 3. Environment: `DEPOT_PROJECT`, `DEPOT_WORKERS`, `DEPOT_EXTENSION`
//! 4. First command-line argument: project root
//!
//! # Example Config File
//!
//! ```toml
//! load_all = true
//!
//! [assets]
//! project_root = "game/content"
//! container_extension = "json"
//! worker_threads = 8
//! bucket_count = 19
//! delete_policy = "reject"  # orphan, reject
//! ```

use std::path::{Path, PathBuf};

use depot_asset::AssetManagerConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_CONFIG_FILE: &str = "depot.toml";

/// Failure to read the configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", path.display())]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Complete boot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootConfig {
    /// Asset manager settings
    pub assets: AssetManagerConfig,
    /// Load every payload after the header scan
    pub load_all: bool,
    /// File the configuration was read from
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            assets: AssetManagerConfig::default(),
            load_all: true,
            config_path: None,
        }
    }
}

impl BootConfig {
    /// Load boot configuration from all sources
    pub fn load(args: impl IntoIterator<Item = String>) -> Result<Self, ConfigError> {
        let env = |key: &str| std::env::var(key).ok();

        let mut config = match env("DEPOT_CONFIG") {
            Some(path) => Self::load_from_file(Path::new(&path))?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::load_from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        config.apply_env(env);
        config.apply_args(args);
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        config.config_path = Some(path.to_path_buf());
        log::info!("Loaded boot config from {}", path.display());
        Ok(config)
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(root) = lookup("DEPOT_PROJECT").filter(|s| !s.is_empty()) {
            log::info!("Project root from DEPOT_PROJECT: {}", root);
            self.assets.project_root = PathBuf::from(root);
        }

        if let Some(workers) = lookup("DEPOT_WORKERS") {
            match workers.parse::<usize>() {
                Ok(0) => self.assets.worker_threads = None,
                Ok(n) => self.assets.worker_threads = Some(n),
                Err(_) => log::warn!("Ignoring DEPOT_WORKERS={}: not a number", workers),
            }
        }

        if let Some(extension) = lookup("DEPOT_EXTENSION").filter(|s| !s.is_empty()) {
            self.assets.container_extension = extension.trim_start_matches('.').to_string();
        }
    }

    /// Apply command-line arguments; the first one is the project root
    pub fn apply_args(&mut self, args: impl IntoIterator<Item = String>) {
        if let Some(root) = args.into_iter().next() {
            self.assets.project_root = PathBuf::from(root);
        }
    }
}
