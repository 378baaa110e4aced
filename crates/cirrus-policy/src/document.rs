//! Policy document types.
//!
//! A `PolicyDocument` is deserialized from TOML and holds an ordered list of
//! `PolicyEntry`s. Entries are raw: filter and action blocks stay untyped
//! JSON until the loader validates them against the registry.
//!
//! Example:
//! ```toml
//! [[policies]]
//! name = "tag-new-functions"
//! resource = "functiongraph"
//! mode = { type = "cloudtrace", events = ["CreateFunction"] }
//! actions = [{ type = "auto-tag-user", tag = "Owner" }]
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use cirrus_contracts::{
    error::{CirrusError, CirrusResult},
    policy::PolicyMode,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDocument {
    #[serde(default)]
    pub policies: Vec<PolicyEntry>,
}

/// One policy as written by its author.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyEntry {
    /// Unique within a document; used in logs and the ledger.
    pub name: String,

    /// A registered resource type name, e.g. `"elb-loadbalancer"`.
    pub resource: String,

    #[serde(default)]
    pub mode: PolicyMode,

    #[serde(default)]
    pub description: Option<String>,

    /// Filter blocks, in evaluation order.
    #[serde(default)]
    pub filters: Vec<Value>,

    /// Action blocks, in execution order.
    #[serde(default)]
    pub actions: Vec<Value>,
}

/// Which list a block came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Filter,
    Action,
}

impl BlockKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Filter => "filter",
            Self::Action => "action",
        }
    }
}

/// Bring a block into its table form with an explicit `type`.
///
/// A bare string names a block with no options. A filter table without
/// `type` and a single entry is value shorthand: `{"tag:Owner" = "absent"}`
/// means `{type = "value", key = "tag:Owner", value = "absent"}`.
pub fn normalize_block(kind: BlockKind, block: &Value) -> CirrusResult<Value> {
    match block {
        Value::String(name) => {
            let mut table = Map::new();
            table.insert("type".to_string(), Value::String(name.clone()));
            Ok(Value::Object(table))
        }
        Value::Object(table) if table.contains_key("type") => Ok(block.clone()),
        Value::Object(table) if kind == BlockKind::Filter && table.len() == 1 => table
            .iter()
            .next()
            .map(|(key, value)| json!({"type": "value", "key": key, "value": value}))
            .ok_or_else(|| CirrusError::validation("empty filter block")),
        Value::Object(_) => Err(CirrusError::validation(format!(
            "{} block has no 'type'",
            kind.name()
        ))),
        other => Err(CirrusError::validation(format!(
            "{} block must be a string or a table, found {other}",
            kind.name()
        ))),
    }
}

/// The `type` of a normalized block.
pub fn block_type(block: &Value) -> Option<&str> {
    block.get("type").and_then(Value::as_str)
}
