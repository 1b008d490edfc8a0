//! Entity instances.
//!
//! An [`Entity`] is an identified set of attribute slots belonging to one
//! [`EntityType`]. Instances are shared through [`EntityRef`] so that an
//! object graph can reference (and cycle through) them; all mutation goes
//! through interior locks that are never held while user callbacks run.
//!
//! # Forks
//!
//! [`Entity::fork`] creates a copy-on-write view of an entity. The fork
//! starts with no slots of its own; reads fall through to the origin. The
//! first access to an attribute on the fork allocates a forked slot that
//! still reads through until it is written, so writes on the fork never
//! reach the origin. [`Entity::merge_fork`] writes a fork's changes back.

use crate::attribute::{Attribute, AttributeOwner, GetValueOptions};
use crate::entity_type::EntityTypeRef;
use crate::error::{ModelError, ModelResult};
use crate::{EntityKind, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use stratum_mask::FieldMask;
use stratum_types::EntityId;

/// Shared handle to an entity instance. Identity is pointer identity.
pub type EntityRef = Arc<Entity>;

pub struct Entity {
    entity_type: EntityTypeRef,
    id: EntityId,
    origin: Option<EntityRef>,
    this: Weak<Entity>,
    state: RwLock<EntityState>,
}

struct EntityState {
    /// For a fork, only the slots allocated so far.
    attributes: BTreeMap<String, Attribute>,
    is_new: bool,
    /// Serialized attribute values as of the last load or save.
    baseline: BTreeMap<String, serde_json::Value>,
    /// Identifier of the store or layer the entity was last read from.
    source: Option<String>,
}

impl Entity {
    /// Creates a brand-new entity with a generated identifier.
    pub fn new(entity_type: &EntityTypeRef) -> EntityRef {
        Self::with_id(entity_type, EntityId::generate())
    }

    /// Creates a brand-new entity. Default values are applied immediately.
    pub fn with_id(entity_type: &EntityTypeRef, id: EntityId) -> EntityRef {
        let entity = Self::build(entity_type, id, true);
        entity.apply_defaults();
        entity
    }

    /// Creates an existing (not new) entity with nothing resident, ready
    /// to be loaded. Defaults are applied lazily on read.
    pub fn shell(entity_type: &EntityTypeRef, id: EntityId) -> EntityRef {
        Self::build(entity_type, id, false)
    }

    fn build(entity_type: &EntityTypeRef, id: EntityId, is_new: bool) -> EntityRef {
        Arc::new_cyclic(|this: &Weak<Entity>| {
            let owner = AttributeOwner::Entity {
                type_name: entity_type.name().to_string(),
                entity: this.clone(),
            };
            let attributes = entity_type
                .definitions()
                .iter()
                .map(|definition| {
                    let name = definition.name().to_string();
                    let attribute = Attribute::from_validated(
                        name.clone(),
                        owner.clone(),
                        definition.options().clone(),
                    );
                    (name, attribute)
                })
                .collect();
            Entity {
                entity_type: entity_type.clone(),
                id,
                origin: None,
                this: this.clone(),
                state: RwLock::new(EntityState {
                    attributes,
                    is_new,
                    baseline: BTreeMap::new(),
                    source: None,
                }),
            }
        })
    }

    fn apply_defaults(&self) {
        let attributes: Vec<Attribute> = self.read_state().attributes.values().cloned().collect();
        for attribute in attributes {
            if attribute.is_set() {
                continue;
            }
            if let Some(value) = attribute.get_default_value() {
                attribute.store(value);
            }
        }
    }

    pub fn entity_type(&self) -> &EntityTypeRef {
        &self.entity_type
    }

    pub fn type_name(&self) -> &str {
        self.entity_type.name()
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.entity_type.kind()
    }

    /// True until the entity is first saved.
    pub fn is_new(&self) -> bool {
        self.read_state().is_new
    }

    pub fn source(&self) -> Option<String> {
        self.read_state().source.clone()
    }

    pub fn set_source(&self, source: Option<String>) {
        self.write_state().source = source;
    }

    pub(crate) fn set_new(&self, is_new: bool) {
        self.write_state().is_new = is_new;
    }

    /// The owner handle attributes of this entity are bound to.
    pub fn owner(&self) -> AttributeOwner {
        AttributeOwner::Entity {
            type_name: self.type_name().to_string(),
            entity: self.this.clone(),
        }
    }

    // ── Attributes ───────────────────────────────────────────────

    /// Returns the slot for `name`.
    ///
    /// On a fork this allocates a forked slot on first access.
    pub fn attribute(&self, name: &str) -> ModelResult<Attribute> {
        if let Some(attribute) = self.read_state().attributes.get(name) {
            return Ok(attribute.clone());
        }
        let Some(origin) = &self.origin else {
            return Err(self.unknown_attribute(name));
        };
        let forked = origin.attribute(name)?.fork(self.owner());
        let mut state = self.write_state();
        Ok(state
            .attributes
            .entry(name.to_string())
            .or_insert(forked)
            .clone())
    }

    /// Read-only lookup that never allocates fork slots.
    fn lookup(&self, name: &str) -> Option<Attribute> {
        if let Some(attribute) = self.read_state().attributes.get(name) {
            return Some(attribute.clone());
        }
        self.origin.as_ref().and_then(|origin| origin.lookup(name))
    }

    pub(crate) fn resident_value_of(&self, name: &str) -> Option<Value> {
        self.lookup(name).and_then(|attribute| attribute.resident_value())
    }

    pub fn get(&self, name: &str) -> ModelResult<Value> {
        self.attribute(name)?.get_value()
    }

    /// Like [`get`](Self::get) but returns `None` instead of failing when unset.
    pub fn get_or_none(&self, name: &str) -> ModelResult<Option<Value>> {
        self.attribute(name)?
            .get_value_with(GetValueOptions { throw_if_unset: false })
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) -> ModelResult<()> {
        self.attribute(name)?.set_value(value)
    }

    pub fn unset(&self, name: &str) -> ModelResult<()> {
        self.attribute(name)?.unset_value();
        Ok(())
    }

    pub fn is_set(&self, name: &str) -> bool {
        match self.lookup(name) {
            Some(attribute) if attribute.is_computed() => true,
            Some(_) => self.resident_value_of(name).is_some(),
            None => false,
        }
    }

    fn unknown_attribute(&self, name: &str) -> ModelError {
        ModelError::UnknownAttribute {
            entity_type: self.type_name().to_string(),
            name: name.to_string(),
        }
    }

    // ── Forks ────────────────────────────────────────────────────

    /// Creates a copy-on-write fork of this entity.
    pub fn fork(self: &Arc<Self>) -> EntityRef {
        let (is_new, baseline, source) = {
            let state = self.read_state();
            (state.is_new, state.baseline.clone(), state.source.clone())
        };
        Arc::new_cyclic(|this: &Weak<Entity>| Entity {
            entity_type: self.entity_type.clone(),
            id: self.id.clone(),
            origin: Some(self.clone()),
            this: this.clone(),
            state: RwLock::new(EntityState {
                attributes: BTreeMap::new(),
                is_new,
                baseline,
                source,
            }),
        })
    }

    /// The entity this one was forked from.
    pub fn origin(&self) -> Option<&EntityRef> {
        self.origin.as_ref()
    }

    pub fn is_fork(&self) -> bool {
        self.origin.is_some()
    }

    /// Writes every attribute the fork wrote (or unset) back onto this entity.
    pub fn merge_fork(&self, fork: &EntityRef) -> ModelResult<()> {
        let forked_from_self = fork
            .origin
            .as_ref()
            .is_some_and(|origin| std::ptr::eq(Arc::as_ptr(origin), self));
        if !forked_from_self {
            return Err(ModelError::NotAFork(fork.to_string()));
        }
        let written: Vec<(String, Option<Value>)> = fork
            .read_state()
            .attributes
            .iter()
            .filter_map(|(name, attribute)| attribute.own_value().map(|v| (name.clone(), v)))
            .collect();
        for (name, value) in written {
            let attribute = self.attribute(&name)?;
            match value {
                Some(value) => attribute.store(value),
                None => attribute.unset_value(),
            }
        }
        self.set_new(fork.is_new());
        Ok(())
    }

    // ── Resident fields ──────────────────────────────────────────

    /// The mask of attributes currently held by this entity.
    ///
    /// Referenced documents count as fully resident: their own fields are
    /// the concern of population, not of the holder. Computed attributes
    /// are always resident.
    pub fn resident_mask(&self) -> FieldMask {
        self.entity_type
            .definitions()
            .iter()
            .fold(FieldMask::identifier_only(), |mask, definition| {
                let name = definition.name();
                if !definition.is_stored() {
                    return mask.with(name, FieldMask::all());
                }
                match self.resident_value_of(name) {
                    Some(value) => mask.with(name, value_resident_mask(&value)),
                    None => mask,
                }
            })
    }

    /// Whether every attribute `mask` selects is resident.
    ///
    /// Names the type does not declare are ignored, at every depth.
    pub fn fields_are_resident(&self, mask: &FieldMask) -> bool {
        let check = |name: &str| -> bool {
            let Some(definition) = self.entity_type.definition(name) else {
                return true;
            };
            if !definition.is_stored() {
                return true;
            }
            match (self.resident_value_of(name), mask.get(name)) {
                (Some(value), Some(sub)) => value_is_resident(&value, &sub),
                (Some(_), None) => true,
                (None, _) => false,
            }
        };
        match mask.field_names() {
            None => self.entity_type.definitions().iter().all(|d| check(d.name())),
            Some(mut names) => names.all(check),
        }
    }

    /// Entities held by the stored attributes `mask` selects, each paired
    /// with the submask that applies to it.
    pub fn nested_entities(&self, mask: &FieldMask) -> Vec<(EntityRef, FieldMask)> {
        let mut nested = Vec::new();
        for (name, sub) in self.entity_type.selected_attributes(mask) {
            if let Some(value) = self.resident_value_of(name) {
                nested.extend(value.entities().into_iter().map(|e| (e, sub.clone())));
            }
        }
        nested
    }

    // ── Change tracking ──────────────────────────────────────────

    pub(crate) fn baseline_value(&self, name: &str) -> Option<serde_json::Value> {
        self.read_state().baseline.get(name).cloned()
    }

    pub(crate) fn set_baseline(&self, name: &str, plain: serde_json::Value) {
        self.write_state().baseline.insert(name.to_string(), plain);
    }

    /// Names of stored attributes whose value differs from the baseline.
    pub fn changed_attributes(&self) -> Vec<String> {
        self.entity_type
            .stored_attribute_names()
            .filter(|name| {
                self.resident_value_of(name).is_some_and(|value| {
                    self.baseline_value(name).as_ref()
                        != Some(&crate::serialize::value_to_plain(&value))
                })
            })
            .map(str::to_string)
            .collect()
    }

    /// Records a successful save: the entity is no longer new and its
    /// current values become the change-tracking baseline.
    pub fn mark_saved(&self) {
        let baseline: BTreeMap<String, serde_json::Value> = self
            .entity_type
            .stored_attribute_names()
            .filter_map(|name| {
                self.resident_value_of(name)
                    .map(|value| (name.to_string(), crate::serialize::value_to_plain(&value)))
            })
            .collect();
        let mut state = self.write_state();
        state.is_new = false;
        state.baseline = baseline;
    }

    /// Records a deletion: the entity is new again and nothing is tracked.
    pub fn mark_deleted(&self) {
        let mut state = self.write_state();
        state.is_new = true;
        state.baseline.clear();
    }

    fn read_state(&self) -> RwLockReadGuard<'_, EntityState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, EntityState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn value_resident_mask(value: &Value) -> FieldMask {
    match value {
        Value::Data(_) => FieldMask::all(),
        Value::Entity(entity) if entity.entity_type.is_document() => FieldMask::all(),
        Value::Entity(entity) => entity.resident_mask(),
        Value::List(items) => items
            .iter()
            .map(value_resident_mask)
            .reduce(|a, b| a.intersect(&b))
            .unwrap_or_else(FieldMask::all),
    }
}

fn value_is_resident(value: &Value, mask: &FieldMask) -> bool {
    match value {
        Value::Data(_) => true,
        Value::Entity(entity) if entity.entity_type.is_document() => true,
        Value::Entity(entity) => entity.fields_are_resident(mask),
        Value::List(items) => items.iter().all(|item| value_is_resident(item, mask)),
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.type_name(), self.id)
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("type", &self.type_name())
            .field("id", &self.id)
            .field("is_new", &self.is_new())
            .field("fork", &self.is_fork())
            .finish()
    }
}
