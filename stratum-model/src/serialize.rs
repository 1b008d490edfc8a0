//! Conversion between entities and wire [`Record`]s.
//!
//! Nested documents are written as reference records and resolved back to
//! resident instances through an [`EntityResolver`]. Subdocuments are
//! embedded recursively. Computed attributes are never written.

use crate::entity::Entity;
use crate::error::{ModelError, ModelResult};
use crate::registry::EntityResolver;
use crate::{EntityRef, Value};
use stratum_mask::FieldMask;
use stratum_types::Record;
use tracing::warn;

/// Options for [`Entity::serialize`].
#[derive(Debug, Clone)]
pub struct SerializeOptions {
    /// Attributes to include. The identifier is always included.
    pub fields: FieldMask,
    /// Emit only attributes that differ from the last loaded or saved state.
    pub only_changed: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            fields: FieldMask::all(),
            only_changed: false,
        }
    }
}

impl SerializeOptions {
    pub fn changes() -> Self {
        Self {
            only_changed: true,
            ..Self::default()
        }
    }
}

/// Options for [`Entity::deserialize`].
#[derive(Debug, Clone)]
pub struct DeserializeOptions {
    /// The mask the record was produced with. Requested attributes missing
    /// from the record become resident as null.
    pub fields: Option<FieldMask>,
    /// Identifier of the store or layer the record came from.
    pub source: Option<String>,
    /// Treat the applied values as the change-tracking baseline.
    pub mark_clean: bool,
}

impl Default for DeserializeOptions {
    fn default() -> Self {
        Self {
            fields: None,
            source: None,
            mark_clean: true,
        }
    }
}

impl Entity {
    /// Serializes the resident attributes selected by `options.fields`.
    pub fn serialize(&self, options: &SerializeOptions) -> Record {
        let mut record = Record::new(self.type_name(), self.id().clone());
        record.is_new = self.is_new();
        for (name, sub) in self.entity_type().selected_attributes(&options.fields) {
            let Some(value) = self.resident_value_of(name) else {
                continue;
            };
            if options.only_changed
                && self.baseline_value(name).as_ref() == Some(&value_to_plain(&value))
            {
                continue;
            }
            record
                .attributes
                .insert(name.to_string(), serialize_value(&value, &sub));
        }
        record
    }

    /// A reference record: type and identifier only.
    pub fn serialize_reference(&self) -> Record {
        Record::reference(self.type_name(), self.id().clone())
    }

    /// Resolves the record's entity through `resolver` and applies the
    /// record to it.
    pub fn deserialize(
        resolver: &dyn EntityResolver,
        record: &Record,
        options: &DeserializeOptions,
    ) -> ModelResult<EntityRef> {
        let entity_type = resolver.entity_type(&record.entity_type)?;
        let entity = resolver.instance(&entity_type, &record.id);
        entity.apply_record(resolver, record, options)?;
        Ok(entity)
    }

    /// Writes a record's attributes onto this entity.
    ///
    /// Reference records leave the entity untouched. Unknown attributes are
    /// skipped with a warning.
    pub fn apply_record(
        &self,
        resolver: &dyn EntityResolver,
        record: &Record,
        options: &DeserializeOptions,
    ) -> ModelResult<()> {
        if record.entity_type != self.type_name() || &record.id != self.id() {
            return Err(ModelError::RecordMismatch {
                expected: self.to_string(),
                actual: format!("{}({})", record.entity_type, record.id),
            });
        }
        if record.is_reference {
            return Ok(());
        }
        self.set_new(record.is_new);
        if options.source.is_some() {
            self.set_source(options.source.clone());
        }

        let entity_type = self.entity_type().clone();
        for (name, plain) in &record.attributes {
            let Some(definition) = entity_type.definition(name) else {
                warn!(entity = %self, attribute = %name, "ignoring unknown attribute in record");
                continue;
            };
            if !definition.is_stored() {
                continue;
            }
            let sub = options
                .fields
                .as_ref()
                .map(|fields| fields.get(name).unwrap_or_else(FieldMask::all));
            let value = deserialize_value(resolver, plain, sub.as_ref(), options)?;
            self.store_applied(name, value, options.mark_clean)?;
        }

        if let Some(fields) = &options.fields {
            for (name, _) in entity_type.selected_attributes(fields) {
                if !record.attributes.contains_key(name) {
                    self.store_applied(name, Value::null(), options.mark_clean)?;
                }
            }
        }
        Ok(())
    }

    fn store_applied(&self, name: &str, value: Value, mark_clean: bool) -> ModelResult<()> {
        if mark_clean {
            self.set_baseline(name, value_to_plain(&value));
        }
        self.attribute(name)?.store(value);
        Ok(())
    }
}

/// The plain form of a value with every nested subdocument field included.
pub(crate) fn value_to_plain(value: &Value) -> serde_json::Value {
    serialize_value(value, &FieldMask::all())
}

fn serialize_value(value: &Value, mask: &FieldMask) -> serde_json::Value {
    match value {
        Value::Data(data) => data.clone(),
        Value::Entity(entity) if entity.entity_type().is_document() => {
            entity.serialize_reference().to_value()
        }
        Value::Entity(entity) => {
            let mut record = entity.serialize(&SerializeOptions {
                fields: mask.clone(),
                only_changed: false,
            });
            record.is_new = false;
            record.to_value()
        }
        Value::List(items) => {
            serde_json::Value::Array(items.iter().map(|item| serialize_value(item, mask)).collect())
        }
    }
}

fn deserialize_value(
    resolver: &dyn EntityResolver,
    plain: &serde_json::Value,
    fields: Option<&FieldMask>,
    options: &DeserializeOptions,
) -> ModelResult<Value> {
    match plain {
        serde_json::Value::Object(_) if Record::is_record(plain) => {
            let record = Record::from_value(plain.clone())?;
            let nested = DeserializeOptions {
                fields: fields.cloned(),
                ..options.clone()
            };
            Ok(Value::Entity(Entity::deserialize(resolver, &record, &nested)?))
        }
        serde_json::Value::Array(items) if items.iter().any(Record::is_record) => items
            .iter()
            .map(|item| deserialize_value(resolver, item, fields, options))
            .collect::<ModelResult<Vec<_>>>()
            .map(Value::List),
        other => Ok(Value::Data(other.clone())),
    }
}
