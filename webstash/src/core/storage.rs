use super::error::Result;
use super::index::IndexRecord;
use super::types::{CompositeKey, Expiry, StashStats, logical_key_of};
use crate::backend::{self, BackendOptions, SharedBackend};
use crate::host::{Clock, PageContext, SystemClock};
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Encode a value for the backend: strings verbatim, other values as
/// JSON text, `null` as "no value"
pub(crate) fn encode_value<V: Serialize + ?Sized>(value: &V) -> Result<Option<String>> {
    Ok(match serde_json::to_value(value)? {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    })
}

/// Namespaced, expiring key-value store over a raw backend.
///
/// Keys are namespaced by the page's origin, path and fragment. Expiration
/// is enforced lazily when a key is read. Backend failures are logged and
/// absorbed; with no backend every operation is a no-op.
#[derive(Clone)]
pub struct Storage {
    page: PageContext,
    clock: Arc<dyn Clock>,
    backend: Option<SharedBackend>,
    stats: Arc<RwLock<StashStats>>,
}

impl Storage {
    /// Store for `page` over the process-wide backend
    pub fn new(page: PageContext) -> Self {
        Self::with_backend(page, Arc::new(SystemClock), backend::acquire())
    }

    /// Store for `page`, resolving the process-wide backend with `options`
    /// if none is cached yet
    pub fn with_options(page: PageContext, options: &BackendOptions) -> Self {
        Self::with_backend(page, Arc::new(SystemClock), backend::acquire_with(options))
    }

    /// Store over an explicit backend, bypassing the process-wide cache
    pub fn with_backend(
        page: PageContext,
        clock: Arc<dyn Clock>,
        backend: Option<SharedBackend>,
    ) -> Self {
        debug!(
            "Initializing storage for {}{} (backend={:?})",
            page.origin,
            page.path,
            backend.as_ref().map(|b| b.kind())
        );

        Self {
            page,
            clock,
            backend,
            stats: Arc::new(RwLock::new(StashStats::default())),
        }
    }

    /// Replace the clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn page(&self) -> &PageContext {
        &self.page
    }

    /// The backend in use, or `None` when persistence is unavailable
    pub fn available(&self) -> Option<SharedBackend> {
        self.backend.clone()
    }

    fn key(&self, key: &str, fragment: Option<&str>) -> CompositeKey {
        CompositeKey::new(&self.page, fragment, key)
    }

    fn save_index(&self, backend: &SharedBackend, index: &IndexRecord) {
        if let Err(e) = index.save(backend.as_ref()) {
            warn!("Failed to write index: {}", e);
        }
    }

    fn delete_raw(&self, backend: &SharedBackend, key: &str) {
        if let Err(e) = backend.remove_item(key) {
            warn!("Failed to delete {}: {}", key, e);
        }
    }

    /// Set a value under `key` with an expiration and optional fragment
    /// override.
    ///
    /// Strings are stored verbatim and other values as JSON text. A value
    /// serializing to `null` (such as `None`) removes the key instead.
    pub fn set_item<K, V>(&self, key: K, value: &V, expire: Expiry, fragment: Option<&str>)
    where
        K: AsRef<str>,
        V: Serialize + ?Sized,
    {
        let Some(backend) = &self.backend else {
            debug!("SET skipped, no backend: key={}", key.as_ref());
            return;
        };

        let encoded = match encode_value(value) {
            Ok(Some(text)) => text,
            Ok(None) => {
                self.remove_item(key, fragment);
                return;
            }
            Err(e) => {
                warn!("Failed to encode value for {}: {}", key.as_ref(), e);
                return;
            }
        };

        let composite = self.key(key.as_ref(), fragment);
        debug!(
            "SET key={}, size={}, expire={:?}",
            composite,
            encoded.len(),
            expire
        );

        let mut index = IndexRecord::load(backend.as_ref());
        let previous = index.expiry(&self.page.origin, &composite);
        index.insert(&self.page.origin, &composite, expire);
        self.save_index(backend, &index);

        if let Err(e) = backend.set_item(composite.as_str(), &encoded) {
            warn!("Failed to write {}: {}", composite, e);
            // The old value (if any) is still in place, so is its expiry
            match previous {
                Some(expiry) => index.insert(&self.page.origin, &composite, expiry),
                None => {
                    index.remove(&self.page.origin, &composite);
                }
            }
            self.save_index(backend, &index);
            return;
        }
        self.stats.write().sets += 1;
    }

    /// Set a value that never expires, under the page fragment
    pub fn set<K, V>(&self, key: K, value: &V)
    where
        K: AsRef<str>,
        V: Serialize + ?Sized,
    {
        self.set_item(key, value, Expiry::Never, None);
    }

    /// Set a value that expires `ttl` from now
    pub fn set_with_ttl<K, V>(&self, key: K, value: &V, ttl: Duration, fragment: Option<&str>)
    where
        K: AsRef<str>,
        V: Serialize + ?Sized,
    {
        let expire = Expiry::after(self.clock.now_millis(), ttl);
        self.set_item(key, value, expire, fragment);
    }

    /// Get the stored text for `key`.
    ///
    /// Expired or unindexed keys are dropped from the index and the
    /// backend, and read as `None`.
    pub fn get_item<K: AsRef<str>>(&self, key: K, fragment: Option<&str>) -> Option<String> {
        let composite = self.key(key.as_ref(), fragment);
        debug!("GET key={}", composite);
        self.stats.write().gets += 1;

        let Some(backend) = &self.backend else {
            self.stats.write().misses += 1;
            return None;
        };

        let mut index = IndexRecord::load(backend.as_ref());
        let now = self.clock.now_millis();

        match index.expiry(&self.page.origin, &composite) {
            Some(expiry) if expiry.is_live_at(now) => {
                let value = backend.get_item(composite.as_str()).unwrap_or_else(|e| {
                    warn!("Failed to read {}: {}", composite, e);
                    None
                });
                let mut stats = self.stats.write();
                if value.is_some() {
                    stats.hits += 1;
                } else {
                    stats.misses += 1;
                }
                return value;
            }
            Some(_) => {
                debug!("Key expired: {}", composite);
                let mut stats = self.stats.write();
                stats.expired += 1;
                stats.misses += 1;
            }
            None => self.stats.write().misses += 1,
        }

        if index.remove(&self.page.origin, &composite) {
            self.save_index(backend, &index);
        }
        self.delete_raw(backend, composite.as_str());
        None
    }

    /// Get `key` and parse it as JSON into `T`.
    ///
    /// Text that is not JSON is tried as a JSON string, so plain strings
    /// read back as `String`.
    pub fn get_json<K, T>(&self, key: K, fragment: Option<&str>) -> Option<T>
    where
        K: AsRef<str>,
        T: DeserializeOwned,
    {
        let raw = self.get_item(key.as_ref(), fragment)?;
        let parsed = serde_json::from_str::<T>(&raw)
            .or_else(|_| serde_json::from_value::<T>(Value::String(raw)));

        match parsed {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Value for {} does not match requested type: {}", key.as_ref(), e);
                None
            }
        }
    }

    /// Remaining lifetime of a live key.
    ///
    /// `None` when there is no live entry, `Some(None)` when it never
    /// expires. Does not enforce expiration.
    pub fn remaining_ttl_ms<K: AsRef<str>>(
        &self,
        key: K,
        fragment: Option<&str>,
    ) -> Option<Option<i64>> {
        let backend = self.backend.as_ref()?;
        let composite = self.key(key.as_ref(), fragment);
        let now = self.clock.now_millis();

        IndexRecord::load(backend.as_ref())
            .expiry(&self.page.origin, &composite)
            .filter(|expiry| expiry.is_live_at(now))
            .map(|expiry| expiry.remaining_ms(now))
    }

    /// Remove `key`. Absent keys are not an error.
    pub fn remove_item<K: AsRef<str>>(&self, key: K, fragment: Option<&str>) {
        let Some(backend) = &self.backend else {
            return;
        };

        let composite = self.key(key.as_ref(), fragment);
        debug!("REMOVE key={}", composite);

        let mut index = IndexRecord::load(backend.as_ref());
        if index.remove(&self.page.origin, &composite) {
            self.save_index(backend, &index);
        }
        self.delete_raw(backend, composite.as_str());
        self.stats.write().removes += 1;
    }

    /// Delete every key of `origin` (default: the page origin).
    /// Returns how many keys were removed.
    pub fn clear(&self, origin: Option<&str>) -> usize {
        let Some(backend) = &self.backend else {
            return 0;
        };

        let origin = origin.unwrap_or(&self.page.origin);
        let mut index = IndexRecord::load(backend.as_ref());
        let Some(bucket) = index.take_bucket(origin) else {
            debug!("CLEAR origin={} (empty)", origin);
            return 0;
        };

        debug!("CLEAR origin={}, keys={}", origin, bucket.len());
        for key in bucket.keys() {
            self.delete_raw(backend, key);
        }
        self.save_index(backend, &index);
        bucket.len()
    }

    /// Delete every key of every origin. Returns how many keys were removed.
    pub fn clear_all(&self) -> usize {
        let Some(backend) = &self.backend else {
            return 0;
        };

        let mut index = IndexRecord::load(backend.as_ref());
        let mut count = 0;
        for origin in index.origins() {
            if let Some(bucket) = index.take_bucket(&origin) {
                for key in bucket.keys() {
                    self.delete_raw(backend, key);
                }
                count += bucket.len();
            }
        }

        debug!("CLEAR ALL keys={}", count);
        self.save_index(backend, &index);
        count
    }

    /// Logical keys across all origins, including entries that expired but
    /// have not been read since
    pub fn index(&self) -> Vec<String> {
        self.backend
            .as_ref()
            .map(|backend| IndexRecord::load(backend.as_ref()).logical_keys())
            .unwrap_or_default()
    }

    /// Logical keys of one origin
    pub fn keys_for(&self, origin: &str) -> Vec<String> {
        let Some(backend) = &self.backend else {
            return Vec::new();
        };

        IndexRecord::load(backend.as_ref())
            .bucket(origin)
            .map(|bucket| {
                bucket
                    .keys()
                    .map(|k| logical_key_of(k).to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whole per-origin index
    #[deprecated(note = "use `index()` for the flattened key list or `keys_for()` per origin")]
    pub fn raw_index(&self) -> IndexRecord {
        self.backend
            .as_ref()
            .map(|backend| IndexRecord::load(backend.as_ref()))
            .unwrap_or_default()
    }

    /// Get statistics
    pub fn stats(&self) -> StashStats {
        self.stats.read().clone()
    }
}
