//! Options shared by the store and layer contracts.
//!
//! Stores and layers expose identical method signatures; these request
//! types are the option bags both receive.

use crate::{ID_KEY, Record, TYPE_KEY};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use stratum_mask::FieldMask;

/// Options for loading referenced records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadRequest {
    /// Attributes to return for each record.
    pub fields: FieldMask,
    /// Bypass any resident copy on the serving side. Stores ignore it.
    #[serde(default)]
    pub reload: bool,
    /// Fail the batch when a reference does not exist.
    pub throw_if_not_found: bool,
}

impl Default for LoadRequest {
    fn default() -> Self {
        Self {
            fields: FieldMask::all(),
            reload: false,
            throw_if_not_found: true,
        }
    }
}

/// Options for saving records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRequest {
    /// Fail when an existing (non-new) record is missing from the store.
    pub throw_if_not_found: bool,
    /// Fail when a new record's identifier is already taken.
    pub throw_if_already_exists: bool,
}

impl Default for SaveRequest {
    fn default() -> Self {
        Self {
            throw_if_not_found: true,
            throw_if_already_exists: true,
        }
    }
}

/// Options for deleting records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub throw_if_not_found: bool,
}

impl Default for DeleteRequest {
    fn default() -> Self {
        Self {
            throw_if_not_found: true,
        }
    }
}

/// A query: an entity type plus attribute equality filters.
///
/// On the wire this is `{_type, ...filter}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindQuery {
    #[serde(rename = "_type")]
    pub entity_type: String,
    #[serde(flatten)]
    pub filter: Map<String, Value>,
}

impl FindQuery {
    /// A query matching every record of a type.
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            filter: Map::new(),
        }
    }

    /// Adds an equality condition on an attribute.
    #[must_use]
    pub fn filter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.filter.insert(name.into(), value);
        self
    }

    /// Returns true if the record satisfies every condition.
    ///
    /// Nested records compare by type and identifier only, so a filter
    /// value may be a reference to the entity it should match.
    pub fn matches(&self, record: &Record) -> bool {
        record.entity_type == self.entity_type
            && self.filter.iter().all(|(name, expected)| match name.as_str() {
                TYPE_KEY => expected.as_str() == Some(record.entity_type.as_str()),
                ID_KEY => expected.as_str() == Some(record.id.as_str()),
                _ => values_match(record.attributes.get(name).unwrap_or(&Value::Null), expected),
            })
    }
}

fn values_match(actual: &Value, expected: &Value) -> bool {
    if Record::is_record(actual) && Record::is_record(expected) {
        return actual.get(TYPE_KEY) == expected.get(TYPE_KEY)
            && actual.get(ID_KEY) == expected.get(ID_KEY);
    }
    actual == expected
}

/// Sort direction for one sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// One attribute to sort find results by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortKey {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// Options for a find call. Query planning beyond these is not supported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindRequest {
    #[serde(default)]
    pub sort: Vec<SortKey>,
    #[serde(default)]
    pub skip: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
    pub fields: FieldMask,
}

impl Default for FindRequest {
    fn default() -> Self {
        Self {
            sort: Vec::new(),
            skip: None,
            limit: None,
            fields: FieldMask::all(),
        }
    }
}
