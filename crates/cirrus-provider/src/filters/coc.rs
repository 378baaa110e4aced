//! Operations center filters.

use serde_json::{json, Value};

use cirrus_contracts::{error::CirrusResult, resource::Resource};
use cirrus_core::{schema::type_schema, traits::Filter};

use super::predicate;
use crate::registry::BuildContext;

pub fn script_non_reviewer_schema() -> Value {
    type_schema("script-non-reviewer", json!({}), &[])
}

pub fn build_script_non_reviewer(_options: &Value, _ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Filter>> {
    Ok(predicate("script-non-reviewer", lacks_reviewer))
}

/// The underscore spelling existing policies use.
pub fn script_non_reviewer_legacy_schema() -> Value {
    type_schema("script_non_reviewer", json!({}), &[])
}

pub fn build_script_non_reviewer_legacy(_options: &Value, _ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Filter>> {
    Ok(predicate("script_non_reviewer", lacks_reviewer))
}

/// A script with a properties block but no reviewers assigned.
///
/// Scripts without any properties block are skipped; their review state is
/// unknown.
fn lacks_reviewer(script: &Resource) -> bool {
    let Some(properties) = script.get("properties").filter(|p| p.is_object()) else {
        return false;
    };
    match properties.get("reviewers") {
        None | Some(Value::Null) => true,
        Some(Value::Array(reviewers)) => reviewers.is_empty(),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(properties: Value) -> Resource {
        Resource::from_value(json!({"id": "s-1", "script_uuid": "s-1", "properties": properties}))
    }

    #[test]
    fn empty_or_missing_reviewers_match() {
        assert!(lacks_reviewer(&script(json!({"reviewers": []}))));
        assert!(lacks_reviewer(&script(json!({"risk_level": "HIGH"}))));
    }

    #[test]
    fn reviewed_scripts_do_not_match() {
        assert!(!lacks_reviewer(&script(json!({"reviewers": [{"reviewer_id": "u-1"}]}))));
    }

    #[test]
    fn scripts_without_properties_are_skipped() {
        assert!(!lacks_reviewer(&Resource::from_value(json!({"id": "s-2"}))));
    }
}
