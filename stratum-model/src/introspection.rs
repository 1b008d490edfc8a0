//! Introspection: describing attributes and types across a layer boundary.
//!
//! Introspection never transfers behavior. A getter is never exported, and
//! a default provider is exported as the value it currently produces.

use crate::attribute::{Attribute, AttributeOptions};
use crate::exposure::{AttributeExposure, ExposureTable};
use crate::entity_type::{EntityKind, EntityType};
use crate::serialize::value_to_plain;
use crate::{AttributeOwner, Value};
use serde::{Deserialize, Serialize};

/// Description of one attribute: `{name, type: "attribute", value?, default?, exposure?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeIntrospection {
    pub name: String,
    #[serde(rename = "type", default = "attribute_kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposure: Option<AttributeExposure>,
}

fn attribute_kind() -> String {
    "attribute".to_string()
}

/// Description of an entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeIntrospection {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    /// Attributes owned by the type itself.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeIntrospection>,
    /// Attributes every instance carries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instance_attributes: Vec<AttributeIntrospection>,
    #[serde(default)]
    pub exposure: ExposureTable,
}

impl Attribute {
    /// Describes the attribute.
    ///
    /// `value` and `default` are only included when the exposure grants
    /// `get`; an unexposed attribute yields just its name and type.
    pub fn introspect(&self) -> AttributeIntrospection {
        let readable = self.exposure().is_some_and(|e| e.get);
        let value = if readable && !self.is_computed() {
            self.resident_value().map(|v| value_to_plain(&v))
        } else {
            None
        };
        let default = if readable {
            self.get_default_value().map(|v| value_to_plain(&v))
        } else {
            None
        };
        AttributeIntrospection {
            name: self.name().to_string(),
            kind: attribute_kind(),
            value,
            default,
            exposure: self.exposure(),
        }
    }

    /// Rebuilds declaration options from an introspection.
    ///
    /// An exported default becomes a provider returning that value.
    pub fn unintrospect(introspection: &AttributeIntrospection) -> (String, AttributeOptions) {
        let mut options = AttributeOptions::new();
        if let Some(value) = &introspection.value {
            options.value = Some(Value::Data(value.clone()));
        }
        if let Some(default) = introspection.default.clone() {
            options = options.default_value(move |_| Value::Data(default.clone()));
        }
        options.exposure = introspection.exposure;
        (introspection.name.clone(), options)
    }
}

impl EntityType {
    /// Describes the type's shape and exposure.
    pub fn introspect(&self) -> TypeIntrospection {
        let owner = AttributeOwner::entity_type(self.name());
        let instance_attributes = self
            .definitions()
            .iter()
            .map(|definition| {
                Attribute::from_validated(
                    definition.name().to_string(),
                    owner.clone(),
                    definition.options().clone(),
                )
                .introspect()
            })
            .collect();
        TypeIntrospection {
            name: self.name().to_string(),
            kind: self.kind(),
            attributes: self.static_attributes().map(Attribute::introspect).collect(),
            instance_attributes,
            exposure: self.exposure().clone(),
        }
    }
}
