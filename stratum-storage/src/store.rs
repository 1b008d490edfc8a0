use crate::error::StorageResult;
use async_trait::async_trait;
use stratum_types::{DeleteRequest, FindQuery, FindRequest, LoadRequest, Record, SaveRequest};

/// A persistence backend for serialized records.
///
/// Every call is one batch. Implementations either apply a whole batch or
/// fail it; callers must not assume anything finer-grained.
#[async_trait]
pub trait Store: Send + Sync {
    /// Identifier stamped onto entities read from this store.
    fn id(&self) -> &str;

    /// Reads the referenced records, projected to `request.fields`.
    ///
    /// The result is aligned with `references`. A missing record fails the
    /// batch when `throw_if_not_found` is set and is `None` otherwise.
    async fn load(
        &self,
        references: &[Record],
        request: &LoadRequest,
    ) -> StorageResult<Vec<Option<Record>>>;

    /// Writes records and returns them as stored.
    ///
    /// Attributes are merged into any stored record. A record flagged new
    /// whose identifier exists fails with `AlreadyExists` when
    /// `throw_if_already_exists` is set; a record not flagged new that does
    /// not exist fails with `NotFound` when `throw_if_not_found` is set.
    async fn save(&self, records: &[Record], request: &SaveRequest) -> StorageResult<Vec<Record>>;

    /// Removes the referenced records.
    async fn delete(&self, references: &[Record], request: &DeleteRequest) -> StorageResult<()>;

    /// Returns the records of `query.entity_type` matching every filter.
    async fn find(&self, query: &FindQuery, request: &FindRequest) -> StorageResult<Vec<Record>>;
}
