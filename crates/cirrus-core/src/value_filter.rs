//! The generic value predicate.
//!
//! Used directly by the `value` and `attributes` filters and embedded in the
//! related-resource and trigger filters. A predicate is a key, an expected
//! value and an operator:
//!
//! ```toml
//! [[policies.filters]]
//! type = "value"
//! key = "protocol"
//! value = "HTTPS"
//! op = "ne"
//! ```
//!
//! Four expected values are special: `absent`, `present`, `empty` and
//! `not-null` test for the key's presence or truthiness and ignore `op`.

use std::cmp::Ordering;

use serde_json::Value;

use cirrus_contracts::{
    error::{CirrusError, CirrusResult},
    resource::Resource,
};

use crate::value::{is_truthy, render, resolve};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Contains,
}

impl Op {
    pub fn parse(name: &str) -> CirrusResult<Self> {
        Ok(match name {
            "eq" | "equal" => Self::Eq,
            "ne" | "not-equal" => Self::Ne,
            "gt" | "greater-than" => Self::Gt,
            "gte" | "ge" => Self::Gte,
            "lt" | "less-than" => Self::Lt,
            "lte" | "le" => Self::Lte,
            "in" => Self::In,
            "not-in" | "ni" => Self::NotIn,
            "contains" => Self::Contains,
            other => {
                return Err(CirrusError::validation(format!("unknown operator '{other}'")));
            }
        })
    }

    /// Read `op` from an option block, falling back to `default`.
    pub fn from_options(options: &Value, default: Op) -> CirrusResult<Self> {
        match options.get("op").and_then(Value::as_str) {
            Some(name) => Self::parse(name),
            None => Ok(default),
        }
    }

    /// Apply an ordering operator to two numbers. Membership operators never match.
    pub fn compare_numbers(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
            Self::Gt => lhs > rhs,
            Self::Gte => lhs >= rhs,
            Self::Lt => lhs < rhs,
            Self::Lte => lhs <= rhs,
            Self::In | Self::NotIn | Self::Contains => false,
        }
    }

    /// Apply the operator to a resolved value and the expected value.
    pub fn apply(self, actual: &Value, expected: &Value) -> bool {
        match self {
            Self::Eq => loose_eq(actual, expected),
            Self::Ne => !loose_eq(actual, expected),
            Self::Gt | Self::Gte | Self::Lt | Self::Lte => match loose_cmp(actual, expected) {
                Some(ord) => match self {
                    Self::Gt => ord == Ordering::Greater,
                    Self::Gte => ord != Ordering::Less,
                    Self::Lt => ord == Ordering::Less,
                    _ => ord != Ordering::Greater,
                },
                None => false,
            },
            Self::In => as_list(expected).iter().any(|e| loose_eq(actual, e)),
            Self::NotIn => !as_list(expected).iter().any(|e| loose_eq(actual, e)),
            Self::Contains => match actual {
                Value::Array(items) => items.iter().any(|i| loose_eq(i, expected)),
                Value::String(s) => s.contains(render(expected).as_str()),
                _ => false,
            },
        }
    }
}

/// What the resolved value is compared against.
#[derive(Debug, Clone, PartialEq)]
pub enum Expected {
    Absent,
    Present,
    Empty,
    NotNull,
    Value(Value),
}

impl Expected {
    fn from_value(value: Value) -> Self {
        match value.as_str() {
            Some("absent") => Self::Absent,
            Some("present") => Self::Present,
            Some("empty") => Self::Empty,
            Some("not-null") => Self::NotNull,
            _ => Self::Value(value),
        }
    }
}

/// A compiled value predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueFilter {
    pub key: String,
    pub expected: Expected,
    pub op: Op,
}

impl ValueFilter {
    pub fn new(key: impl Into<String>, expected: Value, op: Op) -> Self {
        Self {
            key: key.into(),
            expected: Expected::from_value(expected),
            op,
        }
    }

    /// Compile from an option block.
    ///
    /// Accepts `{key, value, op}` or the single-entry shorthand
    /// `{"tag:Owner": "absent"}` (the `type` key is ignored).
    pub fn from_options(options: &Value) -> CirrusResult<Self> {
        let op = Op::from_options(options, Op::Eq)?;
        if let Some(key) = options.get("key").and_then(Value::as_str) {
            let expected = options.get("value").cloned().unwrap_or(Value::Null);
            return Ok(Self::new(key, expected, op));
        }

        let shorthand: Vec<(&String, &Value)> = options
            .as_object()
            .map(|m| m.iter().filter(|(k, _)| *k != "type" && *k != "op").collect())
            .unwrap_or_default();
        match shorthand.as_slice() {
            [(key, value)] => Ok(Self::new(key.as_str(), (*value).clone(), op)),
            _ => Err(CirrusError::validation(
                "value predicate requires 'key' or a single key: value entry",
            )),
        }
    }

    /// Test an already-resolved value. `None` means the key was absent.
    pub fn matches_value(&self, actual: Option<&Value>) -> bool {
        match (&self.expected, actual) {
            (Expected::Absent, a) => a.is_none(),
            (Expected::Present, a) => a.is_some(),
            (Expected::Empty, a) => !a.is_some_and(is_truthy),
            (Expected::NotNull, a) => a.is_some_and(is_truthy),
            (Expected::Value(_), None) => self.op == Op::Ne || self.op == Op::NotIn,
            (Expected::Value(expected), Some(a)) => self.op.apply(a, expected),
        }
    }

    pub fn matches(&self, resource: &Resource) -> bool {
        self.matches_value(resolve(resource, &self.key).as_ref())
    }
}

fn as_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Value::Number(_), _) | (_, Value::Number(_)) => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
        (Value::Bool(x), Value::String(s)) | (Value::String(s), Value::Bool(x)) => {
            s.eq_ignore_ascii_case(if *x { "true" } else { "false" })
        }
        _ => false,
    }
}

fn loose_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => match (as_number(a), as_number(b)) {
            (Some(p), Some(q)) => p.partial_cmp(&q),
            _ => Some(x.cmp(y)),
        },
        _ => as_number(a)?.partial_cmp(&as_number(b)?),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn listener() -> Resource {
        Resource::from_value(json!({
            "id": "l-1",
            "protocol": "HTTP",
            "protocol_port": 80,
            "tags": {"Owner": "alice"},
            "sni_container_refs": [],
            "loadbalancers": [{"id": "lb-1"}]
        }))
    }

    #[test]
    fn equality_and_inequality() {
        let r = listener();
        assert!(ValueFilter::new("protocol", json!("HTTP"), Op::Eq).matches(&r));
        assert!(ValueFilter::new("protocol", json!("HTTPS"), Op::Ne).matches(&r));
    }

    #[test]
    fn numeric_comparisons_coerce_numeric_strings() {
        let r = listener();
        assert!(ValueFilter::new("protocol_port", json!(443), Op::Lt).matches(&r));
        assert!(ValueFilter::new("protocol_port", json!("80"), Op::Eq).matches(&r));
        assert!(!ValueFilter::new("protocol", json!(1), Op::Gt).matches(&r));
    }

    #[test]
    fn membership_operators() {
        let r = listener();
        assert!(ValueFilter::new("protocol", json!(["HTTP", "TCP"]), Op::In).matches(&r));
        assert!(ValueFilter::new("protocol", json!(["UDP"]), Op::NotIn).matches(&r));
        assert!(ValueFilter::new("protocol", json!("TT"), Op::Contains).matches(&r));
    }

    #[test]
    fn special_values() {
        let r = listener();
        assert!(ValueFilter::new("tag:Env", json!("absent"), Op::Eq).matches(&r));
        assert!(ValueFilter::new("tag:Owner", json!("present"), Op::Eq).matches(&r));
        assert!(ValueFilter::new("sni_container_refs", json!("empty"), Op::Eq).matches(&r));
        assert!(!ValueFilter::new("sni_container_refs", json!("not-null"), Op::Eq).matches(&r));
        assert!(ValueFilter::new("loadbalancers", json!("not-null"), Op::Eq).matches(&r));
    }

    #[test]
    fn missing_key_only_matches_negative_operators() {
        let r = listener();
        assert!(!ValueFilter::new("description", json!("x"), Op::Eq).matches(&r));
        assert!(ValueFilter::new("description", json!("x"), Op::Ne).matches(&r));
    }

    #[test]
    fn shorthand_options_compile() {
        let f = ValueFilter::from_options(&json!({"type": "value", "tag:Owner": "alice"})).unwrap();
        assert_eq!(f.key, "tag:Owner");
        assert!(f.matches(&listener()));
    }

    #[test]
    fn ambiguous_shorthand_is_rejected() {
        let err = ValueFilter::from_options(&json!({"a": 1, "b": 2})).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn unknown_operator_is_rejected() {
        assert!(Op::parse("regex").is_err());
    }
}
