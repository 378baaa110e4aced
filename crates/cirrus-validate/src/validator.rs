//! JSON Schema validation of option blocks.
//!
//! Validation runs in two phases:
//!
//! 1. **Structural**: the block is checked against the declared schema with
//!    the `jsonschema` crate.
//! 2. **Semantic**: named checks registered for the block's `type` run
//!    afterwards, for constraints a schema cannot express (mutually
//!    exclusive keys, cross-field requirements).
//!
//! All violations are collected before returning, so a policy author sees
//! every problem with a block in one error.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use cirrus_contracts::error::{CirrusError, CirrusResult};
use cirrus_core::traits::SchemaValidator;

/// A semantic check over a whole block. Returns `Some(message)` on failure.
pub type BlockCheckFn = Box<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// The option-block validator used by the policy loader.
pub struct JsonSchemaValidator {
    /// Semantic checks keyed by block `type`.
    checks: HashMap<String, Vec<BlockCheckFn>>,
}

impl JsonSchemaValidator {
    /// A validator with no semantic checks registered.
    pub fn new() -> Self {
        Self {
            checks: HashMap::new(),
        }
    }

    /// A validator with the checks every Cirrus policy relies on.
    pub fn with_default_checks() -> Self {
        let mut v = Self::new();
        v.register_check(
            "tag",
            Box::new(|block| {
                (block.get("key").is_some() && block.get("tag").is_some())
                    .then(|| "'key' and 'tag' cannot be used together".to_string())
            }),
        );
        v.register_check(
            "tag",
            Box::new(|block| {
                let keyed = block.get("key").is_some() || block.get("tag").is_some();
                (block.get("value").is_some() && !keyed)
                    .then(|| "'value' must be used with 'key' or 'tag'".to_string())
            }),
        );
        v
    }

    /// Register a semantic check for blocks whose `type` is `block_type`.
    ///
    /// Checks for the same type run in registration order.
    pub fn register_check(&mut self, block_type: impl Into<String>, check: BlockCheckFn) {
        self.checks.entry(block_type.into()).or_default().push(check);
    }
}

impl Default for JsonSchemaValidator {
    fn default() -> Self {
        Self::with_default_checks()
    }
}

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, schema: &Value, instance: &Value) -> CirrusResult<()> {
        let block_type = instance.get("type").and_then(Value::as_str).unwrap_or("");

        // ── Phase 1: structural ──────────────────────────────────────────────
        let validator = jsonschema::validator_for(schema).map_err(|e| CirrusError::ConfigError {
            reason: format!("invalid schema for '{block_type}': {e}"),
        })?;

        let mut violations: Vec<String> = validator
            .iter_errors(instance)
            .map(|error| {
                let path = error.instance_path.to_string();
                if path.is_empty() {
                    error.to_string()
                } else {
                    format!("at {path}: {error}")
                }
            })
            .collect();

        // ── Phase 2: semantic ────────────────────────────────────────────────
        if let Some(checks) = self.checks.get(block_type) {
            violations.extend(checks.iter().filter_map(|check| check(instance)));
        }

        debug!(
            block_type,
            violation_count = violations.len(),
            "option block validated"
        );

        if violations.is_empty() {
            return Ok(());
        }
        warn!(block_type, violations = ?violations, "option block rejected");
        Err(CirrusError::SchemaValidation {
            reason: format!("'{block_type}': {}", violations.join("; ")),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use cirrus_contracts::error::CirrusError;
    use cirrus_core::schema::type_schema;
    use cirrus_core::traits::SchemaValidator;

    use super::JsonSchemaValidator;

    fn tag_schema() -> serde_json::Value {
        type_schema(
            "tag",
            json!({
                "key": {"type": "string"},
                "tag": {"type": "string"},
                "value": {"type": "string"},
                "tags": {"type": "object"}
            }),
            &[],
        )
    }

    #[test]
    fn conforming_block_passes() {
        let v = JsonSchemaValidator::default();
        v.validate(&tag_schema(), &json!({"type": "tag", "key": "Owner", "value": "alice"}))
            .unwrap();
    }

    #[test]
    fn unknown_key_is_rejected() {
        let v = JsonSchemaValidator::default();
        let err = v
            .validate(&tag_schema(), &json!({"type": "tag", "colour": "blue"}))
            .unwrap_err();
        assert!(matches!(err, CirrusError::SchemaValidation { .. }));
    }

    #[test]
    fn wrong_type_names_the_offending_path() {
        let v = JsonSchemaValidator::default();
        let err = v
            .validate(&tag_schema(), &json!({"type": "tag", "key": 7}))
            .unwrap_err();
        assert!(err.to_string().contains("/key"), "{err}");
    }

    #[test]
    fn semantic_checks_collect_every_violation() {
        let v = JsonSchemaValidator::default();
        let err = v
            .validate(
                &tag_schema(),
                &json!({"type": "tag", "key": "a", "tag": "b", "value": "c"}),
            )
            .unwrap_err();
        assert!(err.to_string().contains("cannot be used together"));

        let err = v
            .validate(&tag_schema(), &json!({"type": "tag", "value": "c"}))
            .unwrap_err();
        assert!(err.to_string().contains("must be used with"));
    }

    #[test]
    fn checks_only_apply_to_their_block_type() {
        let v = JsonSchemaValidator::default();
        let schema = type_schema("mark", json!({"key": {}, "tag": {}}), &[]);
        v.validate(&schema, &json!({"type": "mark", "key": "a", "tag": "b"}))
            .unwrap();
    }

    #[test]
    fn malformed_schema_is_a_config_error() {
        let v = JsonSchemaValidator::new();
        let err = v
            .validate(&json!({"type": "no-such-type"}), &json!({}))
            .unwrap_err();
        assert!(matches!(err, CirrusError::ConfigError { .. }));
    }
}
