use crate::error::LayerResult;
use async_trait::async_trait;
use stratum_model::TypeIntrospection;
use stratum_types::{DeleteRequest, FindQuery, FindRequest, LoadRequest, Record, SaveRequest};

/// The call contract a layer serves to the layers below it.
///
/// Signatures mirror [`Store`](stratum_storage::Store), so a child layer can
/// forward a call upward without knowing whether a store or another layer
/// answers it. A transport only has to carry these calls; the bundled
/// [`Layer`](crate::Layer) implements the trait in-process.
#[async_trait]
pub trait RemoteLayer: Send + Sync {
    /// Identifier stamped onto entities read through this layer.
    fn id(&self) -> &str;

    async fn load(
        &self,
        references: &[Record],
        request: &LoadRequest,
    ) -> LayerResult<Vec<Option<Record>>>;

    async fn save(&self, records: &[Record], request: &SaveRequest) -> LayerResult<Vec<Record>>;

    async fn delete(&self, references: &[Record], request: &DeleteRequest) -> LayerResult<()>;

    async fn find(&self, query: &FindQuery, request: &FindRequest) -> LayerResult<Vec<Record>>;

    /// Describes the types this layer exposes to remote callers.
    async fn introspect(&self) -> LayerResult<Vec<TypeIntrospection>>;
}
