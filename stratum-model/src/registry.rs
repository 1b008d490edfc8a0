use crate::entity::{Entity, EntityRef};
use crate::entity_type::EntityTypeRef;
use crate::error::{ModelError, ModelResult};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};
use stratum_types::EntityId;
use tracing::debug;

/// Resolves type names and identifiers to live instances during deserialization.
pub trait EntityResolver: Send + Sync {
    fn entity_type(&self, name: &str) -> ModelResult<EntityTypeRef>;

    /// The resident instance for `(entity_type, id)`, or a fresh shell.
    fn instance(&self, entity_type: &EntityTypeRef, id: &EntityId) -> EntityRef;
}

/// Dead identity-map entries are swept once the map grows past this size.
const SWEEP_THRESHOLD: usize = 1024;

/// Registered entity types plus an identity map of live instances.
///
/// The identity map holds weak references: it never keeps an entity alive,
/// it only guarantees that while one is alive every lookup of its
/// `(type, id)` returns the same instance.
#[derive(Default)]
pub struct Registry {
    types: RwLock<BTreeMap<String, EntityTypeRef>>,
    instances: Mutex<HashMap<(String, EntityId), Weak<Entity>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, entity_type: EntityTypeRef) -> ModelResult<()> {
        let mut types = self.types.write().unwrap_or_else(|e| e.into_inner());
        let name = entity_type.name().to_string();
        if types.contains_key(&name) {
            return Err(ModelError::InvalidType {
                entity_type: name,
                reason: "a type with this name is already registered".into(),
            });
        }
        debug!(entity_type = %name, "registered entity type");
        types.insert(name, entity_type);
        Ok(())
    }

    pub fn type_names(&self) -> Vec<String> {
        self.types
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// Creates a brand-new instance of a registered type and adopts it.
    pub fn create(&self, type_name: &str) -> ModelResult<EntityRef> {
        let entity_type = self.entity_type(type_name)?;
        let entity = Entity::new(&entity_type);
        Ok(self.adopt(&entity))
    }

    /// Enters an entity into the identity map.
    ///
    /// If another live instance already holds its `(type, id)`, that
    /// instance is returned instead.
    pub fn adopt(&self, entity: &EntityRef) -> EntityRef {
        let mut instances = self.instances();
        let key = (entity.type_name().to_string(), entity.id().clone());
        if let Some(existing) = instances.get(&key).and_then(Weak::upgrade) {
            return existing;
        }
        instances.insert(key, Arc::downgrade(entity));
        entity.clone()
    }

    /// The live instance for `(type_name, id)`, if any.
    pub fn resident(&self, type_name: &str, id: &EntityId) -> Option<EntityRef> {
        self.instances()
            .get(&(type_name.to_string(), id.clone()))
            .and_then(Weak::upgrade)
    }

    /// Drops an instance from the identity map.
    pub fn forget(&self, entity: &EntityRef) {
        let mut instances = self.instances();
        let key = (entity.type_name().to_string(), entity.id().clone());
        let is_same = instances
            .get(&key)
            .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), Arc::as_ptr(entity)));
        if is_same {
            instances.remove(&key);
        }
    }

    fn instances(&self) -> MutexGuard<'_, HashMap<(String, EntityId), Weak<Entity>>> {
        let mut instances = self.instances.lock().unwrap_or_else(|e| e.into_inner());
        if instances.len() > SWEEP_THRESHOLD {
            instances.retain(|_, weak| weak.strong_count() > 0);
        }
        instances
    }
}

impl EntityResolver for Registry {
    fn entity_type(&self, name: &str) -> ModelResult<EntityTypeRef> {
        self.types
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::UnknownType(name.to_string()))
    }

    fn instance(&self, entity_type: &EntityTypeRef, id: &EntityId) -> EntityRef {
        let mut instances = self.instances();
        let key = (entity_type.name().to_string(), id.clone());
        if let Some(existing) = instances.get(&key).and_then(Weak::upgrade) {
            return existing;
        }
        let shell = Entity::shell(entity_type, id.clone());
        instances.insert(key, Arc::downgrade(&shell));
        shell
    }
}
