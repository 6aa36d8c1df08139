pub mod error;
pub mod index;
pub mod storage;
pub mod types;

pub use error::{Result, StorageError};
pub use index::{INDEX_KEY, IndexRecord};
pub use storage::Storage;
pub use types::{CompositeKey, Expiry, StashStats};
