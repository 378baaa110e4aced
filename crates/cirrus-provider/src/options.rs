//! Typed reads from option blocks.
//!
//! Blocks have already passed schema validation when a builder sees them,
//! so a wrong type is treated like a missing key.

use serde_json::Value;

pub(crate) fn opt_str<'a>(options: &'a Value, key: &str) -> Option<&'a str> {
    options.get(key).and_then(Value::as_str)
}

pub(crate) fn opt_bool(options: &Value, key: &str, default: bool) -> bool {
    options.get(key).and_then(Value::as_bool).unwrap_or(default)
}

pub(crate) fn opt_f64(options: &Value, key: &str, default: f64) -> f64 {
    options.get(key).and_then(Value::as_f64).unwrap_or(default)
}

/// The strings of an array option. Non-string entries are skipped.
pub(crate) fn opt_strings(options: &Value, key: &str) -> Option<Vec<String>> {
    options.get(key).and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}
