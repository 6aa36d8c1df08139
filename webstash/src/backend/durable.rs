//! Durable Storage
//!
//! String map persisted as a JSON object on disk.
//! Every mutation rewrites the file, so values survive restarts.

use super::session::check_quota;
use super::{BackendKind, StorageBackend};
use crate::core::error::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File-backed durable store
#[derive(Debug)]
pub struct DurableStorage {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl DurableStorage {
    /// Open or create the store at `path`
    pub fn open<P: AsRef<Path>>(path: P, quota_bytes: Option<usize>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let entries = Self::load(&path)?;
        debug!(
            "Opened durable storage at {:?} with {} entries",
            path,
            entries.len()
        );

        Ok(Self {
            path,
            entries: RwLock::new(entries),
            quota_bytes,
        })
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Result<HashMap<String, String>> {
        if !path.exists() {
            return Ok(HashMap::new());
        }

        let contents = fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            return Ok(HashMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, entries: &HashMap<String, String>) -> Result<()> {
        let json = serde_json::to_string(entries)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl StorageBackend for DurableStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::Durable
    }

    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write();
        check_quota(&entries, key, value, self.quota_bytes)?;

        let previous = entries.insert(key.to_string(), value.to_string());
        if let Err(e) = self.save(&entries) {
            match previous {
                Some(old) => entries.insert(key.to_string(), old),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write();
        let Some(previous) = entries.remove(key) else {
            return Ok(());
        };

        if let Err(e) = self.save(&entries) {
            entries.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::StorageError;
    use tempfile::TempDir;

    #[test]
    fn test_values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("local.json");

        let store = DurableStorage::open(&path, None).unwrap();
        store.set_item("a", "1").unwrap();
        store.set_item("b", "2").unwrap();
        store.remove_item("b").unwrap();
        drop(store);

        let reopened = DurableStorage::open(&path, None).unwrap();
        assert_eq!(reopened.get_item("a").unwrap(), Some("1".to_string()));
        assert_eq!(reopened.get_item("b").unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_fails_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("local.json");
        fs::write(&path, "{not json").unwrap();

        let err = DurableStorage::open(&path, None).unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[test]
    fn test_quota_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("local.json");

        let store = DurableStorage::open(&path, Some(6)).unwrap();
        store.set_item("k", "v").unwrap();
        assert!(store.set_item("key", "value").is_err());

        let on_disk: HashMap<String, String> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk.len(), 1);
        assert_eq!(on_disk.get("k"), Some(&"v".to_string()));
    }
}
