//! Key resolution against resource records.
//!
//! Keys are either dotted paths into the record (`vip_subnet_cidr_id`,
//! `func_vpc.subnet_id`, `eips.0.eip_id`) or `tag:<Key>`, which reads the
//! normalized tag set.

use serde_json::Value;

use cirrus_contracts::resource::Resource;

use crate::tagging::resource_tags;

const TAG_PREFIX: &str = "tag:";

/// Resolve `key` on `resource`. JSON `null` resolves to `None`.
pub fn resolve(resource: &Resource, key: &str) -> Option<Value> {
    if let Some(tag_key) = key.strip_prefix(TAG_PREFIX) {
        return resource_tags(resource)
            .get(tag_key)
            .map(|v| Value::String(v.to_string()));
    }

    let mut segments = key.split('.');
    let first = segments.next()?;
    let mut current = resource.get(first)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    match current {
        Value::Null => None,
        other => Some(other.clone()),
    }
}

/// Resolve `key` and render the result as a comparison string.
pub fn resolve_string(resource: &Resource, key: &str) -> Option<String> {
    resolve(resource, key).map(|v| render(&v))
}

/// Render a JSON value as the string used for equality and set membership.
///
/// Strings are taken verbatim; everything else uses its JSON text.
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Python-style truthiness: `null`, `false`, `0`, `""`, `[]` and `{}` are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Collect string ids from a field holding a string or an array of strings.
pub fn string_list(resource: &Resource, key: &str) -> Vec<String> {
    match resolve(resource, key) {
        Some(Value::String(s)) if !s.is_empty() => vec![s],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
