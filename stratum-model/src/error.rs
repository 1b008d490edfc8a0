//! Error types for the entity model.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur while building or using entities.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Read of an unset attribute that has no default.
    #[error("cannot get the value of an unset attribute (entity: '{owner}', attribute: '{name}')")]
    AttributeUnset { owner: String, name: String },

    /// Misconfigured attribute, raised when it is declared or written.
    #[error("{reason} (entity: '{owner}', attribute: '{name}')")]
    InvalidAttributeConfig {
        owner: String,
        name: String,
        reason: String,
    },

    /// The entity type does not declare the attribute.
    #[error("unknown attribute '{name}' on entity type '{entity_type}'")]
    UnknownAttribute { entity_type: String, name: String },

    /// No entity type is registered under the name.
    #[error("unknown entity type: {0}")]
    UnknownType(String),

    /// Misconfigured entity type.
    #[error("invalid entity type '{entity_type}': {reason}")]
    InvalidType { entity_type: String, reason: String },

    /// A record was applied to an entity of another type or identifier.
    #[error("record {actual} does not belong to entity {expected}")]
    RecordMismatch { expected: String, actual: String },

    /// `merge_fork` was given an entity that is not a fork of the target.
    #[error("entity {0} is not a fork of the merge target")]
    NotAFork(String),

    /// Invalid identifier or record shape.
    #[error(transparent)]
    Types(#[from] stratum_types::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ModelError {
    pub(crate) fn invalid_config(owner: &str, name: &str, reason: &str) -> Self {
        Self::InvalidAttributeConfig {
            owner: owner.to_string(),
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}
