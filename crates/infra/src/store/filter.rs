//! Document filters evaluated against JSON documents.
//!
//! Field paths are dotted (`audit_log.action`). When a path crosses an array,
//! the filter matches if any element matches, so `Eq("audit_log.action", "Diminished")`
//! selects every record with at least one such entry.

use serde::Serialize;
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every document.
    All,
    /// Field equals value.
    Eq(String, JsonValue),
    /// Field equals one of the values.
    In(String, Vec<JsonValue>),
    /// Case-insensitive substring match on a string field.
    Contains(String, String),
    /// Numeric field strictly below the bound.
    Lt(String, f64),
    /// All sub-filters match.
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: &str, value: impl Serialize) -> Self {
        Filter::Eq(field.to_string(), to_json(value))
    }

    pub fn any_of<T: Serialize>(field: &str, values: impl IntoIterator<Item = T>) -> Self {
        Filter::In(field.to_string(), values.into_iter().map(to_json).collect())
    }

    pub fn contains(field: &str, needle: &str) -> Self {
        Filter::Contains(field.to_string(), needle.trim().to_lowercase())
    }

    pub fn lt(field: &str, bound: f64) -> Self {
        Filter::Lt(field.to_string(), bound)
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::All => other,
            Filter::And(mut parts) => {
                parts.push(other);
                Filter::And(parts)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    pub fn matches(&self, doc: &JsonValue) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, value) => lookup(doc, field).into_iter().any(|v| v == value),
            Filter::In(field, values) => lookup(doc, field)
                .into_iter()
                .any(|v| values.iter().any(|candidate| candidate == v)),
            Filter::Contains(field, needle) => lookup(doc, field).into_iter().any(|v| {
                v.as_str()
                    .map(|s| s.to_lowercase().contains(needle.as_str()))
                    .unwrap_or(false)
            }),
            Filter::Lt(field, bound) => lookup(doc, field)
                .into_iter()
                .any(|v| v.as_f64().map(|n| n < *bound).unwrap_or(false)),
            Filter::And(parts) => parts.iter().all(|f| f.matches(doc)),
        }
    }
}

fn to_json(value: impl Serialize) -> JsonValue {
    // Identifiers, strings and numbers always serialize.
    serde_json::to_value(value).unwrap_or(JsonValue::Null)
}

/// Resolve a dotted path into every value it reaches, flattening arrays.
fn lookup<'a>(doc: &'a JsonValue, path: &str) -> Vec<&'a JsonValue> {
    let mut current = vec![doc];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            collect_field(value, segment, &mut next);
        }
        current = next;
    }

    let mut out = Vec::with_capacity(current.len());
    for value in current {
        match value {
            JsonValue::Array(items) => out.extend(items.iter()),
            other => out.push(other),
        }
    }
    out
}

fn collect_field<'a>(value: &'a JsonValue, segment: &str, out: &mut Vec<&'a JsonValue>) {
    match value {
        JsonValue::Object(map) => {
            if let Some(v) = map.get(segment) {
                out.push(v);
            }
        }
        JsonValue::Array(items) => {
            for item in items {
                collect_field(item, segment, out);
            }
        }
        _ => {}
    }
}
