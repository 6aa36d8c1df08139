//! Session Storage
//!
//! In-process string map that lives exactly as long as the process.

use super::{BackendKind, StorageBackend};
use crate::core::error::{Result, StorageError};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// Bytes a key-value pair counts against the quota
pub(crate) fn entry_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

/// Check that replacing `key` with `value` keeps `entries` under `quota`
pub(crate) fn check_quota(
    entries: &HashMap<String, String>,
    key: &str,
    value: &str,
    quota: Option<usize>,
) -> Result<()> {
    let Some(quota) = quota else {
        return Ok(());
    };

    let current: usize = entries.iter().map(|(k, v)| entry_size(k, v)).sum();
    let replaced = entries.get(key).map_or(0, |old| entry_size(key, old));
    let needed = current - replaced + entry_size(key, value);

    if needed > quota {
        return Err(StorageError::QuotaExceeded { needed, quota });
    }
    Ok(())
}

/// Session-scoped store
#[derive(Debug, Default)]
pub struct SessionStorage {
    entries: RwLock<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl SessionStorage {
    pub fn new(quota_bytes: Option<usize>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            quota_bytes,
        }
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl StorageBackend for SessionStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::Session
    }

    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write();
        check_quota(&entries, key, value, self.quota_bytes)?;
        debug!("session set key={}, size={}", key, value.len());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}
