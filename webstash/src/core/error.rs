use thiserror::Error;

use crate::backend::BackendKind;

/// Error type for backend operations.
///
/// These never cross the `Storage` boundary: the store logs and absorbs them.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Quota exceeded: {needed} bytes needed, quota is {quota} bytes")]
    QuotaExceeded { needed: usize, quota: usize },

    #[error("{0} storage is disabled")]
    Disabled(BackendKind),

    #[error("Attribute element unavailable: {0}")]
    ElementUnavailable(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    /// Whether retrying against another backend could help
    pub fn is_capability_failure(&self) -> bool {
        matches!(
            self,
            Self::QuotaExceeded { .. } | Self::Disabled(_) | Self::ElementUnavailable(_)
        )
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Result type alias for backend operations
pub type Result<T> = std::result::Result<T, StorageError>;
