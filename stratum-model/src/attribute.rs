//! Attribute value slots.
//!
//! An [`Attribute`] is a named slot owned by an entity instance or by an
//! entity type (static attributes). It is either unset or set, may fall
//! back to a default provider, or may be computed through a getter/setter
//! pair. Accessors and providers receive the owner explicitly.
//!
//! Forking an attribute produces a new slot for a new owner that reads
//! through to the origin until it is first written.

use crate::error::{ModelError, ModelResult};
use crate::exposure::AttributeExposure;
use crate::{Entity, EntityRef, Value};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

/// Computes an attribute's value from its owner.
pub type Getter = Arc<dyn Fn(&AttributeOwner) -> Value + Send + Sync>;
/// Receives writes to a computed attribute.
pub type Setter = Arc<dyn Fn(&AttributeOwner, Value) + Send + Sync>;
/// Supplies a value for an attribute that has none.
pub type DefaultProvider = Arc<dyn Fn(&AttributeOwner) -> Value + Send + Sync>;

/// What an attribute belongs to.
#[derive(Clone)]
pub enum AttributeOwner {
    /// A static attribute of an entity type.
    Type(String),
    /// An attribute of one entity instance.
    Entity {
        type_name: String,
        entity: Weak<Entity>,
    },
}

impl AttributeOwner {
    pub fn entity_type(name: impl Into<String>) -> Self {
        Self::Type(name.into())
    }

    pub fn instance(entity: &EntityRef) -> Self {
        Self::Entity {
            type_name: entity.type_name().to_string(),
            entity: Arc::downgrade(entity),
        }
    }

    /// The owning instance, while it is alive.
    pub fn entity(&self) -> Option<EntityRef> {
        match self {
            Self::Type(_) => None,
            Self::Entity { entity, .. } => entity.upgrade(),
        }
    }

    /// Whether this owner is the given instance.
    pub fn is(&self, other: &EntityRef) -> bool {
        match self {
            Self::Type(_) => false,
            Self::Entity { entity, .. } => std::ptr::eq(entity.as_ptr(), Arc::as_ptr(other)),
        }
    }

    /// Name used in error messages: `Movie` for the type, `movie` for an instance.
    pub fn describe(&self) -> String {
        match self {
            Self::Type(name) => name.clone(),
            Self::Entity { type_name, .. } => {
                let mut chars = type_name.chars();
                match chars.next() {
                    Some(first) => first.to_lowercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        }
    }
}

impl fmt::Debug for AttributeOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type(name) => write!(f, "Type({name})"),
            Self::Entity { type_name, .. } => write!(f, "Entity({type_name})"),
        }
    }
}

/// How an attribute is declared.
#[derive(Clone, Default)]
pub struct AttributeOptions {
    pub value: Option<Value>,
    pub default: Option<DefaultProvider>,
    pub getter: Option<Getter>,
    pub setter: Option<Setter>,
    pub exposure: Option<AttributeExposure>,
}

impl AttributeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    #[must_use]
    pub fn default_value<F>(mut self, provider: F) -> Self
    where
        F: Fn(&AttributeOwner) -> Value + Send + Sync + 'static,
    {
        self.default = Some(Arc::new(provider));
        self
    }

    #[must_use]
    pub fn getter<F>(mut self, getter: F) -> Self
    where
        F: Fn(&AttributeOwner) -> Value + Send + Sync + 'static,
    {
        self.getter = Some(Arc::new(getter));
        self
    }

    #[must_use]
    pub fn setter<F>(mut self, setter: F) -> Self
    where
        F: Fn(&AttributeOwner, Value) + Send + Sync + 'static,
    {
        self.setter = Some(Arc::new(setter));
        self
    }

    #[must_use]
    pub fn exposure(mut self, exposure: AttributeExposure) -> Self {
        self.exposure = Some(exposure);
        self
    }

    pub fn is_computed(&self) -> bool {
        self.getter.is_some()
    }

    pub(crate) fn validate(&self, owner: &str, name: &str) -> ModelResult<()> {
        let has_accessor = self.getter.is_some() || self.setter.is_some();
        if self.setter.is_some() && self.getter.is_none() {
            return Err(ModelError::invalid_config(
                owner,
                name,
                "an attribute cannot have a setter without a getter",
            ));
        }
        if has_accessor && self.value.is_some() {
            return Err(ModelError::invalid_config(
                owner,
                name,
                "an attribute cannot have both a getter or setter and an initial value",
            ));
        }
        if has_accessor && self.default.is_some() {
            return Err(ModelError::invalid_config(
                owner,
                name,
                "an attribute cannot have both a getter or setter and a default value",
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for AttributeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeOptions")
            .field("value", &self.value)
            .field("default", &self.default.is_some())
            .field("getter", &self.getter.is_some())
            .field("setter", &self.setter.is_some())
            .field("exposure", &self.exposure)
            .finish()
    }
}

/// Options for [`Attribute::get_value_with`].
#[derive(Debug, Clone, Copy)]
pub struct GetValueOptions {
    pub throw_if_unset: bool,
}

impl Default for GetValueOptions {
    fn default() -> Self {
        Self {
            throw_if_unset: true,
        }
    }
}

/// Tri-state presence of an attribute's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Unset,
    /// Unset, but reads fall back to the default provider.
    Defaulted,
    Set,
}

#[derive(Clone)]
enum Slot {
    /// Fork slot that has not been written: read through to the origin.
    Inherit,
    Unset,
    Set(Value),
}

struct Inner {
    name: String,
    owner: AttributeOwner,
    options: AttributeOptions,
    slot: RwLock<Slot>,
    origin: Option<Attribute>,
}

/// A named value slot. Cloning yields another handle to the same slot.
#[derive(Clone)]
pub struct Attribute(Arc<Inner>);

impl Attribute {
    /// Declares an attribute, validating its options.
    pub fn new(
        name: impl Into<String>,
        owner: AttributeOwner,
        options: AttributeOptions,
    ) -> ModelResult<Self> {
        let name = name.into();
        options.validate(&owner.describe(), &name)?;
        Ok(Self::from_validated(name, owner, options))
    }

    pub(crate) fn from_validated(name: String, owner: AttributeOwner, options: AttributeOptions) -> Self {
        let slot = match &options.value {
            Some(value) => Slot::Set(value.clone()),
            None => Slot::Unset,
        };
        Self(Arc::new(Inner {
            name,
            owner,
            options,
            slot: RwLock::new(slot),
            origin: None,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn owner(&self) -> &AttributeOwner {
        &self.0.owner
    }

    pub fn options(&self) -> &AttributeOptions {
        &self.0.options
    }

    pub fn exposure(&self) -> Option<AttributeExposure> {
        self.0.options.exposure
    }

    pub fn is_computed(&self) -> bool {
        self.0.options.is_computed()
    }

    /// Whether reads return a value without consulting the default.
    ///
    /// Computed attributes always count as set.
    pub fn is_set(&self) -> bool {
        self.is_computed() || self.resident_value().is_some()
    }

    pub fn presence(&self) -> Presence {
        if self.is_set() {
            Presence::Set
        } else if self.0.options.default.is_some() {
            Presence::Defaulted
        } else {
            Presence::Unset
        }
    }

    /// Returns the value, failing with `AttributeUnset` when there is none.
    pub fn get_value(&self) -> ModelResult<Value> {
        self.get_value_with(GetValueOptions::default())?
            .ok_or_else(|| self.unset_error())
    }

    /// Returns the value; when unset and `throw_if_unset` is false, returns `None`.
    ///
    /// A getter is invoked on every read. Otherwise the stored value is
    /// returned, then the default provider's value.
    pub fn get_value_with(&self, options: GetValueOptions) -> ModelResult<Option<Value>> {
        if let Some(getter) = &self.0.options.getter {
            return Ok(Some(getter(&self.0.owner)));
        }
        if let Some(value) = self.resident_value() {
            return Ok(Some(value));
        }
        if let Some(value) = self.get_default_value() {
            return Ok(Some(value));
        }
        if options.throw_if_unset {
            Err(self.unset_error())
        } else {
            Ok(None)
        }
    }

    /// Writes a value. Computed attributes forward to their setter.
    pub fn set_value(&self, value: impl Into<Value>) -> ModelResult<()> {
        let value = value.into();
        if self.is_computed() {
            return match &self.0.options.setter {
                Some(setter) => {
                    setter(&self.0.owner, value);
                    Ok(())
                }
                None => Err(ModelError::invalid_config(
                    &self.0.owner.describe(),
                    &self.0.name,
                    "cannot set the value of an attribute that has a getter but no setter",
                )),
            };
        }
        self.store(value);
        Ok(())
    }

    /// Clears the stored value.
    pub fn unset_value(&self) {
        *self.write_slot() = Slot::Unset;
    }

    /// The default provider's value, if there is a provider.
    pub fn get_default_value(&self) -> Option<Value> {
        self.0.options.default.as_ref().map(|provider| provider(&self.0.owner))
    }

    /// The stored value, following the fork chain. Ignores getters and defaults.
    pub fn resident_value(&self) -> Option<Value> {
        match &*self.read_slot() {
            Slot::Set(value) => return Some(value.clone()),
            Slot::Unset => return None,
            Slot::Inherit => {}
        }
        self.0.origin.as_ref().and_then(|origin| origin.resident_value())
    }

    /// Creates a copy-on-write fork bound to `owner`.
    ///
    /// The fork reads the origin's value until it is written; writes to the
    /// fork never reach the origin.
    #[must_use]
    pub fn fork(&self, owner: AttributeOwner) -> Self {
        Self(Arc::new(Inner {
            name: self.0.name.clone(),
            owner,
            options: self.0.options.clone(),
            slot: RwLock::new(Slot::Inherit),
            origin: Some(self.clone()),
        }))
    }

    pub fn origin(&self) -> Option<&Attribute> {
        self.0.origin.as_ref()
    }

    /// Whether two handles point at the same slot.
    pub fn same_slot(&self, other: &Attribute) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// The value written on this slot itself: `None` if it still inherits,
    /// `Some(None)` if it was unset, `Some(Some(v))` if it was set.
    pub fn own_value(&self) -> Option<Option<Value>> {
        match &*self.read_slot() {
            Slot::Inherit => None,
            Slot::Unset => Some(None),
            Slot::Set(value) => Some(Some(value.clone())),
        }
    }

    /// Writes the slot directly, bypassing accessors.
    pub(crate) fn store(&self, value: Value) {
        *self.write_slot() = Slot::Set(value);
    }

    fn unset_error(&self) -> ModelError {
        ModelError::AttributeUnset {
            owner: self.0.owner.describe(),
            name: self.0.name.clone(),
        }
    }

    fn read_slot(&self) -> RwLockReadGuard<'_, Slot> {
        self.0.slot.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_slot(&self) -> RwLockWriteGuard<'_, Slot> {
        self.0.slot.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.0.name)
            .field("owner", &self.0.owner)
            .field("value", &self.resident_value())
            .field("forked", &self.0.origin.is_some())
            .finish()
    }
}
