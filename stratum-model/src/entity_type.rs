use crate::attribute::{Attribute, AttributeOptions, AttributeOwner};
use crate::error::{ModelError, ModelResult};
use crate::exposure::ExposureTable;
use crate::hooks::{EntityHooks, NoHooks};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use stratum_mask::FieldMask;

/// Shared handle to a declared entity type.
pub type EntityTypeRef = Arc<EntityType>;

/// How instances of a type relate to the entities that hold them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Stored on its own and referenced by identifier.
    Document,
    /// Embedded inside its holder and stored with it.
    Subdocument,
}

/// An instance attribute declaration.
#[derive(Debug, Clone)]
pub struct AttributeDefinition {
    name: String,
    options: AttributeOptions,
}

impl AttributeDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &AttributeOptions {
        &self.options
    }

    /// Computed attributes are never serialized.
    pub fn is_stored(&self) -> bool {
        !self.options.is_computed()
    }
}

/// Describes an entity type: its attributes, kind, exposure and hooks.
pub struct EntityType {
    name: String,
    kind: EntityKind,
    definitions: Vec<AttributeDefinition>,
    statics: BTreeMap<String, Attribute>,
    exposure: ExposureTable,
    hooks: Arc<dyn EntityHooks>,
}

impl EntityType {
    /// Starts declaring a document type.
    pub fn document(name: impl Into<String>) -> EntityTypeBuilder {
        EntityTypeBuilder::new(name.into(), EntityKind::Document)
    }

    /// Starts declaring a subdocument type.
    pub fn subdocument(name: impl Into<String>) -> EntityTypeBuilder {
        EntityTypeBuilder::new(name.into(), EntityKind::Subdocument)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn is_document(&self) -> bool {
        self.kind == EntityKind::Document
    }

    pub fn definitions(&self) -> &[AttributeDefinition] {
        &self.definitions
    }

    pub fn definition(&self, name: &str) -> Option<&AttributeDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.definition(name).is_some()
    }

    /// Names of the attributes that are persisted.
    pub fn stored_attribute_names(&self) -> impl Iterator<Item = &str> {
        self.definitions
            .iter()
            .filter(|d| d.is_stored())
            .map(|d| d.name.as_str())
    }

    /// Names of the stored attributes selected by `mask`, with their submasks.
    pub fn selected_attributes(&self, mask: &FieldMask) -> Vec<(&str, FieldMask)> {
        self.stored_attribute_names()
            .filter_map(|name| mask.get(name).map(|sub| (name, sub)))
            .collect()
    }

    pub fn static_attribute(&self, name: &str) -> Option<&Attribute> {
        self.statics.get(name)
    }

    pub fn static_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.statics.values()
    }

    pub fn exposure(&self) -> &ExposureTable {
        &self.exposure
    }

    pub fn hooks(&self) -> &Arc<dyn EntityHooks> {
        &self.hooks
    }
}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityType")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("definitions", &self.definitions)
            .field("exposure", &self.exposure)
            .finish()
    }
}

/// Builder for [`EntityType`]. Misconfiguration surfaces from [`build`](Self::build).
pub struct EntityTypeBuilder {
    name: String,
    kind: EntityKind,
    definitions: Vec<AttributeDefinition>,
    statics: Vec<(String, AttributeOptions)>,
    exposure: ExposureTable,
    hooks: Arc<dyn EntityHooks>,
}

impl EntityTypeBuilder {
    fn new(name: String, kind: EntityKind) -> Self {
        Self {
            name,
            kind,
            definitions: Vec::new(),
            statics: Vec::new(),
            exposure: ExposureTable::none(),
            hooks: Arc::new(NoHooks),
        }
    }

    /// Declares an instance attribute.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>, options: AttributeOptions) -> Self {
        self.definitions.push(AttributeDefinition {
            name: name.into(),
            options,
        });
        self
    }

    /// Declares an attribute owned by the type itself.
    #[must_use]
    pub fn static_attribute(mut self, name: impl Into<String>, options: AttributeOptions) -> Self {
        self.statics.push((name.into(), options));
        self
    }

    #[must_use]
    pub fn exposure(mut self, exposure: ExposureTable) -> Self {
        self.exposure = exposure;
        self
    }

    #[must_use]
    pub fn hooks(mut self, hooks: Arc<dyn EntityHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn build(self) -> ModelResult<EntityTypeRef> {
        let invalid = |reason: String| ModelError::InvalidType {
            entity_type: self.name.clone(),
            reason,
        };
        if self.name.is_empty() || self.name.starts_with('_') {
            return Err(invalid("type names must be non-empty and not start with '_'".into()));
        }

        let instance_owner = AttributeOwner::Entity {
            type_name: self.name.clone(),
            entity: std::sync::Weak::new(),
        }
        .describe();
        let mut seen = HashSet::new();
        for definition in &self.definitions {
            check_name(&definition.name).map_err(&invalid)?;
            if !seen.insert(definition.name.as_str()) {
                return Err(invalid(format!("duplicate attribute '{}'", definition.name)));
            }
            definition.options.validate(&instance_owner, &definition.name)?;
        }

        let mut statics = BTreeMap::new();
        for (name, options) in &self.statics {
            check_name(name).map_err(&invalid)?;
            let attribute =
                Attribute::new(name.clone(), AttributeOwner::entity_type(&self.name), options.clone())?;
            if statics.insert(name.clone(), attribute).is_some() {
                return Err(invalid(format!("duplicate static attribute '{name}'")));
            }
        }

        Ok(Arc::new(EntityType {
            name: self.name.clone(),
            kind: self.kind,
            definitions: self.definitions.clone(),
            statics,
            exposure: self.exposure.clone(),
            hooks: self.hooks.clone(),
        }))
    }
}

fn check_name(name: &str) -> Result<(), String> {
    if name.is_empty() || name.starts_with('_') || name.contains('.') {
        return Err(format!(
            "invalid attribute name '{name}' (names must be non-empty, not start with '_' and not contain '.')"
        ));
    }
    Ok(())
}
