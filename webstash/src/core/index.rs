//! Index Record
//!
//! Secondary record of every key written through the store, grouped by
//! origin, with its expiration. It is persisted as one JSON blob under
//! [`INDEX_KEY`] and always read, modified and rewritten as a whole.

use super::error::Result;
use super::types::{CompositeKey, Expiry, logical_key_of};
use crate::backend::StorageBackend;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Reserved backend key holding the serialized index
pub const INDEX_KEY: &str = "storage-global-index";

/// Composite key to expiration, for one origin
pub type Bucket = BTreeMap<String, Expiry>;

/// Origin to bucket mapping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexRecord {
    buckets: BTreeMap<String, Bucket>,
}

impl IndexRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the index from `backend`.
    ///
    /// A missing index is empty. An unreadable or malformed one is logged
    /// and treated as empty; the next write replaces it.
    pub fn load(backend: &dyn StorageBackend) -> Self {
        match backend.get_item(INDEX_KEY) {
            Ok(Some(raw)) => Self::parse(&raw).unwrap_or_else(|e| {
                warn!("Discarding malformed index: {}", e);
                Self::default()
            }),
            Ok(None) => Self::default(),
            Err(e) => {
                warn!("Failed to read index: {}", e);
                Self::default()
            }
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Rewrite the whole index entry
    pub fn save(&self, backend: &dyn StorageBackend) -> Result<()> {
        backend.set_item(INDEX_KEY, &self.to_json()?)
    }

    /// Register `key` under `origin`, creating the bucket when needed
    pub fn insert(&mut self, origin: &str, key: &CompositeKey, expiry: Expiry) {
        self.buckets
            .entry(origin.to_string())
            .or_default()
            .insert(key.as_str().to_string(), expiry);
    }

    /// Drop `key` from `origin`'s bucket, returning whether it was present
    pub fn remove(&mut self, origin: &str, key: &CompositeKey) -> bool {
        self.buckets
            .get_mut(origin)
            .is_some_and(|bucket| bucket.remove(key.as_str()).is_some())
    }

    pub fn expiry(&self, origin: &str, key: &CompositeKey) -> Option<Expiry> {
        self.buckets.get(origin)?.get(key.as_str()).copied()
    }

    pub fn bucket(&self, origin: &str) -> Option<&Bucket> {
        self.buckets.get(origin)
    }

    /// Remove and return a whole bucket
    pub fn take_bucket(&mut self, origin: &str) -> Option<Bucket> {
        self.buckets.remove(origin)
    }

    pub fn origins(&self) -> Vec<String> {
        self.buckets.keys().cloned().collect()
    }

    /// Logical keys of every bucket, across all origins
    pub fn logical_keys(&self) -> Vec<String> {
        self.buckets
            .values()
            .flat_map(|bucket| bucket.keys())
            .map(|composite| logical_key_of(composite).to_string())
            .collect()
    }

    /// Total number of indexed keys
    pub fn len(&self) -> usize {
        self.buckets.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn buckets(&self) -> &BTreeMap<String, Bucket> {
        &self.buckets
    }
}
