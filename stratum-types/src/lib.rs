//! Core type definitions for stratum.
//!
//! This crate defines the types that cross the store and layer boundaries:
//! - Entity identifiers ([`EntityId`], UUID v7 when generated)
//! - The serialized record wire shape ([`Record`])
//! - Request options shared by the store and layer contracts
//!
//! Nothing here knows about attributes, hooks or entity graphs; those live
//! in `stratum-model`.

mod ids;
mod record;
mod request;

pub use ids::EntityId;
pub use record::{Record, ID_KEY, NEW_KEY, REF_KEY, TYPE_KEY};
pub use request::{
    DeleteRequest, FindQuery, FindRequest, LoadRequest, SaveRequest, SortDirection, SortKey,
};
pub use stratum_mask::FieldMask;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid identifier: {0:?} (identifiers must be non-empty strings)")]
    InvalidId(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
