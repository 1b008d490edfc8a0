//! The layer: entity types, backend bindings and call dispatch.
//!
//! Each registered type is served by at most one backend. A type bound to
//! a [`Store`] is always served by it. Any other type is forwarded to the
//! parent layer, if one is set when the call is made. Bindings are looked
//! up on every call, so stores and parents may be attached after types are
//! registered.

use crate::config::LayerConfig;
use crate::error::{LayerError, LayerResult};
use crate::remote::RemoteLayer;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};
use stratum_model::{EntityRef, EntityResolver, EntityTypeRef, Registry};
use stratum_storage::Store;
use stratum_types::{DeleteRequest, FindQuery, FindRequest, LoadRequest, Record, SaveRequest};
use tracing::{debug, info};

/// Where calls for one type go.
#[derive(Clone)]
pub(crate) enum Backend {
    Store(Arc<dyn Store>),
    Parent(Arc<dyn RemoteLayer>),
}

impl Backend {
    pub(crate) fn id(&self) -> &str {
        match self {
            Backend::Store(store) => store.id(),
            Backend::Parent(parent) => parent.id(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Backend::Store(_) => "store",
            Backend::Parent(_) => "parent",
        }
    }

    pub(crate) async fn load(
        &self,
        references: &[Record],
        request: &LoadRequest,
    ) -> LayerResult<Vec<Option<Record>>> {
        debug!(backend = self.kind(), id = self.id(), count = references.len(), "dispatching load");
        let records = match self {
            Backend::Store(store) => store.load(references, request).await?,
            Backend::Parent(parent) => parent.load(references, request).await?,
        };
        self.check_len(records.len(), references.len())?;
        Ok(records)
    }

    pub(crate) async fn save(
        &self,
        records: &[Record],
        request: &SaveRequest,
    ) -> LayerResult<Vec<Record>> {
        debug!(backend = self.kind(), id = self.id(), count = records.len(), "dispatching save");
        let saved = match self {
            Backend::Store(store) => store.save(records, request).await?,
            Backend::Parent(parent) => parent.save(records, request).await?,
        };
        self.check_len(saved.len(), records.len())?;
        Ok(saved)
    }

    pub(crate) async fn delete(
        &self,
        references: &[Record],
        request: &DeleteRequest,
    ) -> LayerResult<()> {
        debug!(backend = self.kind(), id = self.id(), count = references.len(), "dispatching delete");
        match self {
            Backend::Store(store) => store.delete(references, request).await?,
            Backend::Parent(parent) => parent.delete(references, request).await?,
        }
        Ok(())
    }

    pub(crate) async fn find(
        &self,
        query: &FindQuery,
        request: &FindRequest,
    ) -> LayerResult<Vec<Record>> {
        debug!(backend = self.kind(), id = self.id(), entity_type = %query.entity_type, "dispatching find");
        Ok(match self {
            Backend::Store(store) => store.find(query, request).await?,
            Backend::Parent(parent) => parent.find(query, request).await?,
        })
    }

    fn check_len(&self, actual: usize, expected: usize) -> LayerResult<()> {
        if actual == expected {
            return Ok(());
        }
        Err(LayerError::MalformedResponse {
            backend: self.id().to_string(),
            reason: format!("expected {expected} records, got {actual}"),
        })
    }
}

/// A tier of the entity graph: registered types, their backends, and the
/// lifecycle operations that move entities through them.
pub struct Layer {
    config: LayerConfig,
    registry: Registry,
    stores: RwLock<BTreeMap<String, Arc<dyn Store>>>,
    forwarded: RwLock<BTreeSet<String>>,
    parent: RwLock<Option<Arc<dyn RemoteLayer>>>,
}

impl Layer {
    pub fn new(config: LayerConfig) -> Self {
        Self {
            config,
            registry: Registry::new(),
            stores: RwLock::new(BTreeMap::new()),
            forwarded: RwLock::new(BTreeSet::new()),
            parent: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Registers an entity type.
    pub fn register(&self, entity_type: EntityTypeRef) -> LayerResult<()> {
        info!(layer = %self.config.name, entity_type = %entity_type.name(), "registering entity type");
        self.registry.register(entity_type)?;
        Ok(())
    }

    pub fn entity_type(&self, name: &str) -> LayerResult<EntityTypeRef> {
        Ok(self.registry.entity_type(name)?)
    }

    /// Binds a type to a store.
    ///
    /// Fails with `ConflictingBackend` if the type already has a store or
    /// was explicitly forwarded to the parent layer.
    pub fn bind_store(&self, type_name: &str, store: Arc<dyn Store>) -> LayerResult<()> {
        if self.is_forwarded(type_name) {
            return Err(LayerError::ConflictingBackend(type_name.to_string()));
        }
        let mut stores = self.stores.write().unwrap_or_else(|e| e.into_inner());
        if stores.contains_key(type_name) {
            return Err(LayerError::ConflictingBackend(type_name.to_string()));
        }
        debug!(layer = %self.config.name, entity_type = %type_name, store = %store.id(), "bound store");
        stores.insert(type_name.to_string(), store);
        Ok(())
    }

    /// Declares that a type is always served by the parent layer.
    pub fn forward_to_parent(&self, type_name: &str) -> LayerResult<()> {
        if self.store_for(type_name).is_some() {
            return Err(LayerError::ConflictingBackend(type_name.to_string()));
        }
        self.forwarded
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(type_name.to_string());
        Ok(())
    }

    pub fn set_parent(&self, parent: Arc<dyn RemoteLayer>) {
        debug!(layer = %self.config.name, parent = %parent.id(), "attached parent layer");
        *self.parent.write().unwrap_or_else(|e| e.into_inner()) = Some(parent);
    }

    pub fn has_store(&self, type_name: &str) -> bool {
        self.store_for(type_name).is_some()
    }

    pub fn has_parent(&self) -> bool {
        self.parent_layer().is_some()
    }

    /// Creates a brand-new entity of a registered type.
    pub fn create(&self, type_name: &str) -> LayerResult<EntityRef> {
        Ok(self.registry.create(type_name)?)
    }

    /// Returns the live instance for `(type, id)`, creating an unloaded shell
    /// if there is none.
    pub fn instance(&self, type_name: &str, id: &stratum_types::EntityId) -> LayerResult<EntityRef> {
        let entity_type = self.entity_type(type_name)?;
        Ok(self.registry.instance(&entity_type, id))
    }

    /// Enters an entity built outside the layer into its identity map.
    pub fn adopt(&self, entity: &EntityRef) -> LayerResult<EntityRef> {
        self.entity_type(entity.type_name())?;
        Ok(self.registry.adopt(entity))
    }

    fn store_for(&self, type_name: &str) -> Option<Arc<dyn Store>> {
        self.stores
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(type_name)
            .cloned()
    }

    fn is_forwarded(&self, type_name: &str) -> bool {
        self.forwarded
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(type_name)
    }

    fn parent_layer(&self) -> Option<Arc<dyn RemoteLayer>> {
        self.parent.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Resolves the backend for a type at call time.
    pub(crate) fn backend(&self, type_name: &str) -> LayerResult<Backend> {
        if let Some(store) = self.store_for(type_name) {
            return Ok(Backend::Store(store));
        }
        match self.parent_layer() {
            Some(parent) => Ok(Backend::Parent(parent)),
            None => Err(LayerError::NoStoreOrLayer(type_name.to_string())),
        }
    }
}

/// Groups entity indices by type name, keeping input order within a group.
pub(crate) fn group_by_type(entities: &[EntityRef]) -> BTreeMap<String, Vec<usize>> {
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (index, entity) in entities.iter().enumerate() {
        groups
            .entry(entity.type_name().to_string())
            .or_default()
            .push(index);
    }
    groups
}
