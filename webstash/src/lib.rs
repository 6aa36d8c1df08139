//! # webstash
//!
//! Key-value persistence facade over heterogeneous storage backends
//! (durable, session-scoped and a legacy attribute fallback), with
//! per-origin/per-page key namespacing and lazy expiration.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use webstash::{PageContext, Storage};
//!
//! let page = PageContext::from_url("https://example.com/app/#inbox").unwrap();
//! let storage = Storage::new(page);
//!
//! storage.set_with_ttl("theme", "dark", Duration::from_secs(10), None);
//! assert_eq!(storage.get_item("theme", None).as_deref(), Some("dark"));
//! ```

pub mod backend;
pub mod config;
pub mod core;
pub mod host;

// Re-export commonly used types
pub use backend::{
    AttributeStorage, BackendKind, BackendOptions, DurableStorage, SessionStorage, SharedBackend,
    StorageBackend, UserDataElement,
};
pub use config::StashConfig;
pub use core::{CompositeKey, Expiry, INDEX_KEY, IndexRecord, StashStats, Storage, StorageError};
pub use host::{Clock, ManualClock, PageContext, SystemClock};
