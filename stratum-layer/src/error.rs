//! Error types for the lifecycle layer.

use stratum_model::{ModelError, Operation};
use stratum_storage::StorageError;
use thiserror::Error;

/// Result type for layer operations.
pub type LayerResult<T> = Result<T, LayerError>;

/// Errors that can occur while serving or forwarding lifecycle calls.
#[derive(Debug, Error)]
pub enum LayerError {
    /// An identifier is not a non-empty string.
    #[error("invalid identifier: {0:?} (identifiers must be non-empty strings)")]
    InvalidId(String),

    /// A get/load/delete/save target does not exist.
    #[error("entity not found: {0}")]
    NotFound(String),

    /// A new entity's identifier is already taken.
    #[error("entity already exists: {0}")]
    AlreadyExists(String),

    /// Neither a store nor a parent layer can serve the type.
    #[error("couldn't find a store or a parent layer (entity type: '{0}')")]
    NoStoreOrLayer(String),

    /// The type does not expose the operation to remote callers.
    #[error("operation '{operation:?}' is not exposed by entity type '{entity_type}'")]
    NotExposed {
        entity_type: String,
        operation: Operation,
    },

    /// A type was bound both to a store and to the parent layer.
    #[error("conflicting backend registration for entity type '{0}'")]
    ConflictingBackend(String),

    /// No entity type is registered under the name.
    #[error("unknown entity type: {0}")]
    UnknownType(String),

    /// A lifecycle hook failed.
    #[error("{hook} hook failed for {entity}: {source}")]
    Hook {
        entity: String,
        hook: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// Population kept finding unloaded entities.
    #[error("population did not converge after {0} passes")]
    PopulationDidNotConverge(usize),

    /// A backend answered with a result that does not match the request.
    #[error("malformed response from '{backend}': {reason}")]
    MalformedResponse { backend: String, reason: String },

    /// Entity model error.
    #[error(transparent)]
    Model(ModelError),

    /// Storage backend error.
    #[error(transparent)]
    Storage(StorageError),
}

impl From<ModelError> for LayerError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::UnknownType(name) => Self::UnknownType(name),
            ModelError::Types(stratum_types::Error::InvalidId(id)) => Self::InvalidId(id),
            other => Self::Model(other),
        }
    }
}

impl From<StorageError> for LayerError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => Self::NotFound(what),
            StorageError::AlreadyExists(what) => Self::AlreadyExists(what),
            other => Self::Storage(other),
        }
    }
}

impl From<stratum_types::Error> for LayerError {
    fn from(err: stratum_types::Error) -> Self {
        ModelError::from(err).into()
    }
}
