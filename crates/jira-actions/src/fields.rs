//! Lenient accessors for request bodies.
//!
//! Fields of the wrong type read as absent, matching how callers have always
//! been treated: a numeric `summary` is the same as no summary.

use serde_json::{Map, Value};

/// String field, or `""` when missing or not a string.
pub(crate) fn string_field<'a>(body: &'a Map<String, Value>, key: &str) -> &'a str {
    body.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Boolean field, `false` when missing or not a boolean.
pub(crate) fn bool_field(body: &Map<String, Value>, key: &str) -> bool {
    body.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Object field, when present and an object.
pub(crate) fn object_field(body: &Map<String, Value>, key: &str) -> Option<Map<String, Value>> {
    body.get(key).and_then(Value::as_object).cloned()
}

/// `additionalFields` from the body, plus every unknown top-level key whose
/// value is neither null nor an empty string.
pub(crate) fn collect_additional_fields(body: &Map<String, Value>, known: &[&str]) -> Map<String, Value> {
    let mut additional = object_field(body, "additionalFields").unwrap_or_default();
    for (key, value) in body {
        if known.contains(&key.as_str()) {
            continue;
        }
        let empty = match value {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        };
        if !empty {
            additional.insert(key.clone(), value.clone());
        }
    }
    additional
}
