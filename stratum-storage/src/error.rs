//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A referenced record does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    /// A new record's identifier is already taken.
    #[error("record already exists: {0}")]
    AlreadyExists(String),

    /// Stored data could not be read back as a record.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl StorageError {
    pub(crate) fn not_found(entity_type: &str, id: &str) -> Self {
        Self::NotFound(format!("{entity_type}({id})"))
    }

    pub(crate) fn already_exists(entity_type: &str, id: &str) -> Self {
        Self::AlreadyExists(format!("{entity_type}({id})"))
    }
}
