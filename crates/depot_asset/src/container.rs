//! On-disk key/value document
//!
//! One JSON object per asset. The header keys are fixed; everything else is
//! written by the payload's own serialize routine.

use std::fs;
use std::path::Path;

use depot_core::AssetHandle;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{AssetError, AssetResult};

/// Header key: asset handle (u64)
pub const OBJECT_ID: &str = "ObjectID";
/// Header key: project-rooted path of the file
pub const DISC_PATH: &str = "DiscPath";
/// Header key: factory class name
pub const CLASS_NAME: &str = "ClassName";
/// Header key: display name
pub const ASSET_NAME: &str = "AssetName";
/// Header key: handles this asset references (array of u64)
pub const DEPENDENCIES: &str = "Dependencies";

/// Flat key/value document backing one asset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Container {
    fields: Map<String, Value>,
}

impl Container {
    /// Create an empty container
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a container from JSON text. `origin` names the source in errors.
    pub fn parse(text: &str, origin: &str) -> AssetResult<Self> {
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(fields)) => Ok(Self { fields }),
            Ok(_) => Err(AssetError::Parse {
                path: origin.to_string(),
                message: "top level is not an object".to_string(),
            }),
            Err(e) => Err(AssetError::Parse {
                path: origin.to_string(),
                message: e.to_string(),
            }),
        }
    }

    /// Read a container file
    pub fn read(path: &Path) -> AssetResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| AssetError::io(path, e))?;
        Self::parse(&text, &path.display().to_string())
    }

    /// Write the container to `path`
    ///
    /// The document goes to a temporary sibling first and is renamed into
    /// place, so readers never observe a partial file.
    pub fn write(&self, path: &Path) -> AssetResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| AssetError::io(parent, e))?;
        }

        let text = self.to_json_pretty()?;
        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = Path::new(&tmp_name);

        fs::write(tmp_path, text).map_err(|e| AssetError::io(tmp_path, e))?;
        if let Err(e) = fs::rename(tmp_path, path) {
            let _ = fs::remove_file(tmp_path);
            return Err(AssetError::io(path, e));
        }
        Ok(())
    }

    /// Render as pretty-printed JSON
    pub fn to_json_pretty(&self) -> AssetResult<String> {
        serde_json::to_string_pretty(&self.fields).map_err(|e| AssetError::Parse {
            path: String::new(),
            message: e.to_string(),
        })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Decode a field. `Ok(None)` when absent or null.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> AssetResult<Option<T>> {
        match self.fields.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::deserialize(value)
                .map(Some)
                .map_err(|e| AssetError::invalid_field(key, e)),
        }
    }

    /// Encode a field
    pub fn set_as<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> AssetResult<()> {
        let value = serde_json::to_value(value).map_err(|e| AssetError::invalid_field(key, e))?;
        self.fields.insert(key.to_string(), value);
        Ok(())
    }

    /// Decode a handle field stored as a raw u64. Zero and null read as `None`.
    pub fn get_handle(&self, key: &str) -> AssetResult<Option<AssetHandle>> {
        Ok(self
            .get_as::<u64>(key)?
            .map(AssetHandle::new)
            .filter(|h| !h.is_null()))
    }

    /// Decode an array of raw u64 handles, skipping nulls
    pub fn get_handles(&self, key: &str) -> AssetResult<Vec<AssetHandle>> {
        Ok(self
            .get_as::<Vec<u64>>(key)?
            .unwrap_or_default()
            .into_iter()
            .map(AssetHandle::new)
            .filter(|h| !h.is_null())
            .collect())
    }

    /// Encode a handle as a raw u64, or null for `None`
    pub fn set_handle(&mut self, key: &str, handle: Option<AssetHandle>) {
        let value = handle.map_or(Value::Null, |h| Value::from(h.to_raw()));
        self.fields.insert(key.to_string(), value);
    }

    /// Encode handles as an array of raw u64
    pub fn set_handles<'a>(&mut self, key: &str, handles: impl IntoIterator<Item = &'a AssetHandle>) {
        let values = handles.into_iter().map(|h| Value::from(h.to_raw())).collect();
        self.fields.insert(key.to_string(), Value::Array(values));
    }
}
