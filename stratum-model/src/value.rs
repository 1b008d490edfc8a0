use crate::EntityRef;
use std::fmt;
use std::sync::Arc;

/// The content of an attribute.
///
/// Plain data is held as JSON. Nested entities are held by reference so a
/// graph can share (and cycle through) instances.
#[derive(Clone)]
pub enum Value {
    Data(serde_json::Value),
    Entity(EntityRef),
    List(Vec<Value>),
}

impl Value {
    pub fn null() -> Self {
        Value::Data(serde_json::Value::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Data(serde_json::Value::Null))
    }

    pub fn as_data(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Data(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_data().and_then(|d| d.as_str())
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_data().and_then(|d| d.as_i64())
    }

    pub fn as_entity(&self) -> Option<&EntityRef> {
        match self {
            Value::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Every entity held by this value, flattening lists.
    pub fn entities(&self) -> Vec<EntityRef> {
        let mut out = Vec::new();
        self.collect_entities(&mut out);
        out
    }

    fn collect_entities(&self, out: &mut Vec<EntityRef>) {
        match self {
            Value::Data(_) => {}
            Value::Entity(entity) => out.push(entity.clone()),
            Value::List(items) => items.iter().for_each(|item| item.collect_entities(out)),
        }
    }
}

/// Entities compare by identity, not by content.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Data(a), Value::Data(b)) => a == b,
            (Value::Entity(a), Value::Entity(b)) => Arc::ptr_eq(a, b),
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Data(data) => write!(f, "Data({data})"),
            Value::Entity(entity) => write!(f, "Entity({}#{})", entity.type_name(), entity.id()),
            Value::List(items) => f.debug_list().entries(items).finish(),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(data: serde_json::Value) -> Self {
        Value::Data(data)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Data(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Data(s.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Data(n.into())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Data(b.into())
    }
}

impl From<EntityRef> for Value {
    fn from(entity: EntityRef) -> Self {
        Value::Entity(entity)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}
