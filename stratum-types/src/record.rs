//! The serialized record wire shape.
//!
//! ```text
//! {_type: string, _id: string, _ref?: true, _new?: true, ...attributeName: value}
//! ```
//!
//! A reference carries only `_type`, `_id` and `_ref`. Nested entities
//! appear inside attribute values as nested records.

use crate::{EntityId, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const TYPE_KEY: &str = "_type";
pub const ID_KEY: &str = "_id";
pub const REF_KEY: &str = "_ref";
pub const NEW_KEY: &str = "_new";

/// A serialized entity as exchanged with stores and layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "_type")]
    pub entity_type: String,
    #[serde(rename = "_id")]
    pub id: EntityId,
    #[serde(rename = "_ref", default, skip_serializing_if = "is_false")]
    pub is_reference: bool,
    #[serde(rename = "_new", default, skip_serializing_if = "is_false")]
    pub is_new: bool,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Record {
    /// Creates an empty (non-reference) record.
    pub fn new(entity_type: impl Into<String>, id: EntityId) -> Self {
        Self {
            entity_type: entity_type.into(),
            id,
            is_reference: false,
            is_new: false,
            attributes: Map::new(),
        }
    }

    /// Creates a reference-only record.
    pub fn reference(entity_type: impl Into<String>, id: EntityId) -> Self {
        Self {
            is_reference: true,
            ..Self::new(entity_type, id)
        }
    }

    /// Builder-style attribute insertion.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Returns an attribute's serialized value.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Returns this record reduced to a reference.
    #[must_use]
    pub fn to_reference(&self) -> Self {
        Self::reference(self.entity_type.clone(), self.id.clone())
    }

    /// Converts the record to a plain JSON object.
    pub fn to_value(&self) -> Value {
        let mut obj = Map::with_capacity(self.attributes.len() + 4);
        obj.insert(TYPE_KEY.into(), Value::String(self.entity_type.clone()));
        obj.insert(ID_KEY.into(), Value::String(self.id.to_string()));
        if self.is_reference {
            obj.insert(REF_KEY.into(), Value::Bool(true));
        }
        if self.is_new {
            obj.insert(NEW_KEY.into(), Value::Bool(true));
        }
        for (name, value) in &self.attributes {
            obj.insert(name.clone(), value.clone());
        }
        Value::Object(obj)
    }

    /// Parses a record from a plain JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        if !Self::is_record(&value) {
            return Err(Error::InvalidRecord(format!(
                "expected an object with string '{TYPE_KEY}' and '{ID_KEY}' keys, got {value}"
            )));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Whether a plain value has the shape of a serialized record.
    pub fn is_record(value: &Value) -> bool {
        value.as_object().is_some_and(|obj| {
            obj.get(TYPE_KEY).is_some_and(Value::is_string)
                && obj.get(ID_KEY).is_some_and(Value::is_string)
        })
    }
}
