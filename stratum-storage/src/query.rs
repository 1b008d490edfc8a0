//! Record-level query helpers shared by the bundled stores.
//!
//! Filtering is equality only (see [`FindQuery::matches`]). Sorting
//! compares JSON values with `null` (and missing attributes) first, then
//! booleans, numbers, strings, and finally arrays and objects by their
//! text form.

use serde_json::{Map, Value};
use std::cmp::Ordering;
use stratum_mask::FieldMask;
use stratum_types::{FindQuery, FindRequest, Record, SortDirection, SortKey};

/// Restricts a record's attributes to `fields`.
///
/// Embedded records are projected with the nested mask. References are
/// kept as they are.
pub fn project(record: &Record, fields: &FieldMask) -> Record {
    Record {
        attributes: project_attributes(&record.attributes, fields),
        ..record.clone()
    }
}

fn project_attributes(attributes: &Map<String, Value>, fields: &FieldMask) -> Map<String, Value> {
    if fields.is_all() {
        return attributes.clone();
    }
    attributes
        .iter()
        .filter_map(|(name, value)| {
            fields
                .get(name)
                .map(|sub| (name.clone(), project_value(value, &sub)))
        })
        .collect()
}

fn project_value(value: &Value, fields: &FieldMask) -> Value {
    match value {
        Value::Object(object) if Record::is_record(value) => {
            let mut projected = Map::new();
            for (key, inner) in object {
                if key.starts_with('_') {
                    projected.insert(key.clone(), inner.clone());
                }
            }
            let attributes: Map<String, Value> = object
                .iter()
                .filter(|(key, _)| !key.starts_with('_'))
                .map(|(key, inner)| (key.clone(), inner.clone()))
                .collect();
            projected.extend(project_attributes(&attributes, fields));
            Value::Object(projected)
        }
        Value::Array(items) => Value::Array(items.iter().map(|item| project_value(item, fields)).collect()),
        other => other.clone(),
    }
}

/// Orders records by `keys`, earlier keys taking precedence.
pub fn sort(records: &mut [Record], keys: &[SortKey]) {
    if keys.is_empty() {
        return;
    }
    records.sort_by(|a, b| {
        keys.iter()
            .map(|key| {
                let ordering = compare_values(sort_value(a, &key.field), sort_value(b, &key.field));
                match key.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    });
}

fn sort_value<'a>(record: &'a Record, field: &str) -> Option<&'a Value> {
    record.attributes.get(field)
}

fn rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_) | Value::Object(_)) => 4,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)).then_with(|| match (a, b) {
            (Some(x), Some(y)) if rank(a) == 4 => x.to_string().cmp(&y.to_string()),
            _ => Ordering::Equal,
        }),
    }
}

/// Applies `skip` then `limit`.
pub fn paginate(records: Vec<Record>, skip: Option<usize>, limit: Option<usize>) -> Vec<Record> {
    records
        .into_iter()
        .skip(skip.unwrap_or(0))
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

/// Runs a find over candidate records of any type.
pub fn find<I>(candidates: I, query: &FindQuery, request: &FindRequest) -> Vec<Record>
where
    I: IntoIterator<Item = Record>,
{
    let mut matched: Vec<Record> = candidates
        .into_iter()
        .filter(|record| query.matches(record))
        .collect();
    sort(&mut matched, &request.sort);
    paginate(matched, request.skip, request.limit)
        .iter()
        .map(|record| project(record, &request.fields))
        .collect()
}

/// Merges an incoming record's attributes over a stored one.
///
/// The result is never flagged new or as a reference.
pub fn merge(stored: Option<&Record>, incoming: &Record) -> Record {
    let mut merged = match stored {
        Some(stored) => stored.clone(),
        None => Record::new(incoming.entity_type.clone(), incoming.id.clone()),
    };
    for (name, value) in &incoming.attributes {
        merged.attributes.insert(name.clone(), value.clone());
    }
    merged.is_new = false;
    merged.is_reference = false;
    merged
}
