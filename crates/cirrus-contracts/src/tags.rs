//! Tag sets and the normalization of vendor tag representations.
//!
//! Resource records carry tags in one of several shapes depending on the
//! service that produced them:
//!
//! ```text
//! {"Owner": "alice", "Env": "prod"}                  mapping
//! ["Owner=alice", "Env=prod"]                        key=value strings
//! [{"Owner": "alice"}, {"Env": "prod"}]              single-entry mappings
//! [{"key": "Owner", "value": "alice"}]               key/value records
//! ```
//!
//! `TagForm` captures the two top-level shapes; `TagForm::normalize` turns
//! either into a canonical `TagSet`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TagParseError;

/// Canonical tag collection: unique keys, string values, no ordering meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeMap<String, String>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tag, replacing any previous value for `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Parse a raw `tags` value straight into a `TagSet`.
    pub fn from_value(value: &Value) -> Result<Self, TagParseError> {
        TagForm::from_value(value)?.normalize()
    }

    /// Render as a JSON mapping, the shape written back onto resources.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// The two top-level shapes a `tags` field may take.
#[derive(Debug, Clone, PartialEq)]
pub enum TagForm {
    /// `{"key": "value", ...}`
    Mapping(Map<String, Value>),
    /// `["k=v", {"k": "v"}, {"key": "k", "value": "v"}, ...]`
    List(Vec<Value>),
}

impl TagForm {
    /// Classify a raw `tags` value.
    pub fn from_value(value: &Value) -> Result<Self, TagParseError> {
        match value {
            Value::Object(map) => Ok(Self::Mapping(map.clone())),
            Value::Array(items) => Ok(Self::List(items.clone())),
            other => Err(TagParseError::UnsupportedShape {
                found: json_kind(other),
            }),
        }
    }

    /// Produce the canonical `TagSet`.
    ///
    /// Later entries win when a key repeats inside a list.
    pub fn normalize(&self) -> Result<TagSet, TagParseError> {
        let mut tags = TagSet::new();
        match self {
            Self::Mapping(map) => {
                for (key, value) in map {
                    tags.insert(key.clone(), scalar_to_string(key, value)?);
                }
            }
            Self::List(items) => {
                for (index, item) in items.iter().enumerate() {
                    let (key, value) = list_entry(index, item)?;
                    tags.insert(key, value);
                }
            }
        }
        Ok(tags)
    }
}

fn list_entry(index: usize, item: &Value) -> Result<(String, String), TagParseError> {
    match item {
        Value::String(pair) => match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => Err(TagParseError::MalformedEntry {
                index,
                detail: format!("'{pair}' is not of the form key=value"),
            }),
        },
        Value::Object(map) => {
            // A record needs both fields; `{"key": "Env"}` is a tag named `key`.
            if let (Some(Value::String(key)), Some(value)) = (map.get("key"), map.get("value")) {
                return Ok((key.clone(), scalar_to_string(key, value)?));
            }
            let mut entries = map.iter();
            match (entries.next(), entries.next()) {
                (Some((key, value)), None) => Ok((key.clone(), scalar_to_string(key, value)?)),
                _ => Err(TagParseError::MalformedEntry {
                    index,
                    detail: format!("mapping entry has {} keys, expected 1", map.len()),
                }),
            }
        }
        other => Err(TagParseError::MalformedEntry {
            index,
            detail: format!("unexpected {}", json_kind(other)),
        }),
    }
}

fn scalar_to_string(key: &str, value: &Value) -> Result<String, TagParseError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Array(_) | Value::Object(_) => Err(TagParseError::NonScalarValue {
            key: key.to_string(),
        }),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn mapping_form_normalizes_scalars() {
        let tags = TagSet::from_value(&json!({"Owner": "alice", "Cost": 12, "Pinned": true}))
            .unwrap();
        assert_eq!(tags.get("Owner"), Some("alice"));
        assert_eq!(tags.get("Cost"), Some("12"));
        assert_eq!(tags.get("Pinned"), Some("true"));
    }

    #[test]
    fn list_of_pairs_splits_on_first_equals() {
        let tags = TagSet::from_value(&json!(["Owner=alice", "Query=a=b"])).unwrap();
        assert_eq!(tags.get("Owner"), Some("alice"));
        assert_eq!(tags.get("Query"), Some("a=b"));
    }

    #[test]
    fn list_mixes_single_entry_and_key_value_records() {
        let tags = TagSet::from_value(&json!([
            {"Owner": "alice"},
            {"key": "Env", "value": "prod"}
        ]))
        .unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags.get("Env"), Some("prod"));
    }

    #[test]
    fn single_entry_tag_named_key_is_not_a_record() {
        let tags = TagSet::from_value(&json!([{"key": "Env"}])).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get("key"), Some("Env"));
        assert!(!tags.contains_key("Env"));
    }

    #[test]
    fn string_without_separator_is_malformed() {
        let err = TagSet::from_value(&json!(["Owner"])).unwrap_err();
        assert!(matches!(err, TagParseError::MalformedEntry { index: 0, .. }));
    }

    #[test]
    fn scalar_tags_field_is_unsupported() {
        let err = TagSet::from_value(&json!("Owner=alice")).unwrap_err();
        assert_eq!(err, TagParseError::UnsupportedShape { found: "string" });
    }

    #[test]
    fn nested_value_is_rejected() {
        let err = TagSet::from_value(&json!({"Owner": {"name": "alice"}})).unwrap_err();
        assert!(matches!(err, TagParseError::NonScalarValue { .. }));
    }

    #[test]
    fn to_value_round_trips_through_mapping_form() {
        let tags: TagSet = [("a", "1"), ("b", "2")].into_iter().collect();
        assert_eq!(TagSet::from_value(&tags.to_value()).unwrap(), tags);
    }
}
