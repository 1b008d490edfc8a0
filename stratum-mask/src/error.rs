//! Error types for field mask parsing.

use thiserror::Error;

/// Result type for field mask operations.
pub type MaskResult<T> = Result<T, MaskError>;

/// Errors that can occur while building a field mask.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MaskError {
    /// A path contained an empty segment (e.g. `"author..name"`).
    #[error("invalid field path: '{0}'")]
    InvalidPath(String),

    /// The plain structure could not be interpreted as a mask.
    #[error("invalid field mask shape: {0}")]
    InvalidShape(String),
}
