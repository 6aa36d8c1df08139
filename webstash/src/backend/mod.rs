//! Backend Adapter
//!
//! Uniform `{get, set, remove}` capability over string keys and values,
//! served by the first raw mechanism that passes its probe:
//! - Durable: file-backed store that survives restarts
//! - Session: in-process store that lives as long as the process
//! - Attribute: legacy element with named-attribute persistence
//!
//! The resolved handle is cached for the rest of the process.

pub mod attribute;
pub mod durable;
pub mod session;

pub use attribute::{AttributeStorage, UserDataElement};
pub use durable::DurableStorage;
pub use session::SessionStorage;

use crate::core::error::{Result, StorageError};
use lazy_static::lazy_static;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Key written and removed again to verify a store accepts writes
pub const PROBE_KEY: &str = "_tmptest";
const PROBE_VALUE: &str = "tmpval";

/// Store name the legacy element persists under
pub const DEFAULT_STORE_NAME: &str = "storage-global";

/// Raw mechanism behind a backend handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Durable,
    Session,
    Attribute,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Durable => "durable",
            Self::Session => "session",
            Self::Attribute => "attribute",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Durable => "Durable",
            Self::Session => "Session",
            Self::Attribute => "Attribute",
        };
        f.write_str(name)
    }
}

/// String key-value capability shared by all raw mechanisms
pub trait StorageBackend: Send + Sync {
    /// Which mechanism serves this handle
    fn kind(&self) -> BackendKind;

    fn get_item(&self, key: &str) -> Result<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Removing an absent key is not an error
    fn remove_item(&self, key: &str) -> Result<()>;
}

/// Shared handle to the resolved backend
pub type SharedBackend = Arc<dyn StorageBackend>;

/// Durable store options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurableOptions {
    pub enabled: bool,
    pub path: PathBuf,
    pub quota_bytes: Option<usize>,
}

/// Session store options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOptions {
    pub enabled: bool,
    pub quota_bytes: Option<usize>,
}

/// Legacy attribute element options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyOptions {
    pub enabled: bool,
    pub directory: PathBuf,
    pub store_name: String,
}

/// Candidate backends tried by [`resolve`], in order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendOptions {
    pub durable: DurableOptions,
    pub session: SessionOptions,
    pub legacy: LegacyOptions,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            durable: DurableOptions {
                enabled: true,
                path: PathBuf::from("./data/webstash/local.json"),
                quota_bytes: Some(5 * 1024 * 1024),
            },
            session: SessionOptions {
                enabled: true,
                quota_bytes: Some(5 * 1024 * 1024),
            },
            legacy: LegacyOptions {
                enabled: true,
                directory: PathBuf::from("./data/webstash/userdata"),
                store_name: DEFAULT_STORE_NAME.to_string(),
            },
        }
    }
}

impl BackendOptions {
    /// Options under which every probe fails
    pub fn unavailable() -> Self {
        let mut options = Self::default();
        options.durable.enabled = false;
        options.session.enabled = false;
        options.legacy.enabled = false;
        options
    }

    /// Keep only the session store enabled
    pub fn session_only() -> Self {
        let mut options = Self::unavailable();
        options.session.enabled = true;
        options
    }
}

/// Write then remove the probe key
pub fn probe(backend: &dyn StorageBackend) -> Result<()> {
    backend.set_item(PROBE_KEY, PROBE_VALUE)?;
    backend.remove_item(PROBE_KEY)
}

fn open_durable(options: &DurableOptions) -> Result<SharedBackend> {
    if !options.enabled {
        return Err(StorageError::Disabled(BackendKind::Durable));
    }
    let store = DurableStorage::open(&options.path, options.quota_bytes)?;
    probe(&store)?;
    Ok(Arc::new(store))
}

fn open_session(options: &SessionOptions) -> Result<SharedBackend> {
    if !options.enabled {
        return Err(StorageError::Disabled(BackendKind::Session));
    }
    let store = SessionStorage::new(options.quota_bytes);
    probe(&store)?;
    Ok(Arc::new(store))
}

fn attach_legacy(options: &LegacyOptions) -> Result<SharedBackend> {
    if !options.enabled {
        return Err(StorageError::Disabled(BackendKind::Attribute));
    }
    let element = UserDataElement::attach(&options.directory)?;
    Ok(Arc::new(AttributeStorage::new(element, &options.store_name)))
}

fn log_rejection(kind: BackendKind, e: &StorageError) {
    if e.is_capability_failure() {
        debug!("{} storage rejected: {}", kind.as_str(), e);
    } else {
        warn!("{} storage failed to open: {}", kind.as_str(), e);
    }
}

/// Probe the candidates in order without touching the process-wide cache
pub fn resolve(options: &BackendOptions) -> Option<SharedBackend> {
    let resolved = open_durable(&options.durable)
        .inspect_err(|e| log_rejection(BackendKind::Durable, e))
        .or_else(|_| open_session(&options.session))
        .inspect_err(|e| log_rejection(BackendKind::Session, e))
        .or_else(|_| attach_legacy(&options.legacy))
        .inspect_err(|e| log_rejection(BackendKind::Attribute, e));

    match resolved {
        Ok(backend) => {
            info!("Using {} storage backend", backend.kind().as_str());
            Some(backend)
        }
        Err(_) => {
            warn!("No storage backend available, persistence disabled");
            None
        }
    }
}

lazy_static! {
    static ref RESOLVED: RwLock<Option<SharedBackend>> = RwLock::new(None);
}

/// Return the cached backend, resolving it with `options` on first success
pub fn acquire_with(options: &BackendOptions) -> Option<SharedBackend> {
    if let Some(backend) = RESOLVED.read().as_ref() {
        return Some(Arc::clone(backend));
    }

    let mut slot = RESOLVED.write();
    if let Some(backend) = slot.as_ref() {
        return Some(Arc::clone(backend));
    }

    let backend = resolve(options)?;
    *slot = Some(Arc::clone(&backend));
    Some(backend)
}

/// Return the cached backend, resolving it with default options if needed
pub fn acquire() -> Option<SharedBackend> {
    acquire_with(&BackendOptions::default())
}

/// Forget the cached backend so the next acquire probes again
pub fn reset() {
    RESOLVED.write().take();
}
