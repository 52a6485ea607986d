//! Normalizes raw client input into the set of fields to persist.
//!
//! An absent key leaves a field untouched. The sentinel [`EMPTY_SENTINEL`]
//! clears it: as the value itself for scalar fields, as the first element for
//! list fields. A sentinel in the wrong shape is passed through untouched and
//! fails type validation.

use serde_json::{Map, Value};

/// Marker a client sends to erase an optional field.
pub const EMPTY_SENTINEL: &str = "@--empty--string";

/// Fields holding a list of strings.
pub const LIST_FIELDS: &[&str] = &["tags", "talentsNeeded", "objectives"];

pub fn is_list_field(key: &str) -> bool {
    LIST_FIELDS.contains(&key)
}

/// Keep only populated keys, turning clear markers into empty values.
pub fn filter_for_update(raw: &Map<String, Value>) -> Map<String, Value> {
    raw.iter()
        .filter_map(|(key, value)| normalize(key, value).map(|v| (key.clone(), v)))
        .collect()
}

fn normalize(key: &str, value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::Array(items) if items.is_empty() => None,
        Value::String(s) if s == EMPTY_SENTINEL && !is_list_field(key) => {
            Some(Value::String(String::new()))
        }
        Value::Array(items) if is_list_field(key) && starts_with_sentinel(items) => {
            Some(Value::Array(Vec::new()))
        }
        other => Some(other.clone()),
    }
}

fn starts_with_sentinel(items: &[Value]) -> bool {
    matches!(items.first(), Some(Value::String(first)) if first == EMPTY_SENTINEL)
}

/// True when a filtered value means "erase this field".
pub fn is_cleared(key: &str, value: &Value) -> bool {
    match value {
        Value::Array(items) if is_list_field(key) => items.is_empty(),
        Value::String(s) if !is_list_field(key) => s.is_empty(),
        _ => false,
    }
}
