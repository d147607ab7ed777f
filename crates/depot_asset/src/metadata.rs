//! Asset header

use std::collections::BTreeSet;

use depot_core::AssetHandle;
use serde_json::Value;

use crate::container::{Container, ASSET_NAME, CLASS_NAME, DEPENDENCIES, DISC_PATH, OBJECT_ID};
use crate::error::{AssetError, AssetResult};

/// Identity and location of an asset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaData {
    pub asset_id: AssetHandle,
    pub asset_name: String,
    /// Project-rooted path, e.g. `/models/cube.json`
    pub path_on_disk: String,
    /// Factory class name
    pub class_id: String,
    pub dependencies: BTreeSet<AssetHandle>,
}

impl MetaData {
    pub fn new(
        asset_id: AssetHandle,
        asset_name: impl Into<String>,
        path_on_disk: impl Into<String>,
        class_id: impl Into<String>,
    ) -> Self {
        Self {
            asset_id,
            asset_name: asset_name.into(),
            path_on_disk: path_on_disk.into(),
            class_id: class_id.into(),
            dependencies: BTreeSet::new(),
        }
    }

    /// Loadable only with a non-null id, a path and a class
    pub fn is_valid(&self) -> bool {
        !self.asset_id.is_null() && !self.path_on_disk.is_empty() && !self.class_id.is_empty()
    }

    /// Why [`MetaData::is_valid`] fails, if it does
    pub fn validation_error(&self) -> Option<AssetError> {
        let reason = if self.asset_id.is_null() {
            "null ObjectID"
        } else if self.path_on_disk.is_empty() {
            "empty DiscPath"
        } else if self.class_id.is_empty() {
            "empty ClassName"
        } else {
            return None;
        };

        Some(AssetError::InvalidMetadata {
            path: self.path_on_disk.clone(),
            reason: reason.to_string(),
        })
    }

    /// Read the header keys of a container
    ///
    /// `ObjectID` is required. A missing `DiscPath` falls back to
    /// `fallback_path`, a missing `AssetName` to the file stem of the path.
    /// A missing `ClassName` is left empty, which makes the result invalid.
    pub fn from_container(container: &Container, fallback_path: &str) -> AssetResult<Self> {
        let asset_id = container
            .get_as::<u64>(OBJECT_ID)?
            .map(AssetHandle::new)
            .ok_or_else(|| AssetError::MissingField(OBJECT_ID.to_string()))?;

        let path_on_disk = container
            .get_as::<String>(DISC_PATH)?
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| fallback_path.to_string());

        let asset_name = match container.get_as::<String>(ASSET_NAME)? {
            Some(name) => name,
            None => file_stem(&path_on_disk).to_string(),
        };

        let class_id = container.get_as::<String>(CLASS_NAME)?.unwrap_or_default();
        let dependencies = container.get_handles(DEPENDENCIES)?.into_iter().collect();

        Ok(Self {
            asset_id,
            asset_name,
            path_on_disk,
            class_id,
            dependencies,
        })
    }

    /// Write the header keys into a container
    pub fn write_header(&self, container: &mut Container) {
        container.set(OBJECT_ID, Value::from(self.asset_id.to_raw()));
        container.set(DISC_PATH, Value::from(self.path_on_disk.as_str()));
        container.set(CLASS_NAME, Value::from(self.class_id.as_str()));
        container.set(ASSET_NAME, Value::from(self.asset_name.as_str()));
        container.set_handles(DEPENDENCIES, &self.dependencies);
    }
}

fn file_stem(path: &str) -> &str {
    let file = path.rsplit('/').next().unwrap_or(path);
    file.split('.').next().unwrap_or(file)
}
