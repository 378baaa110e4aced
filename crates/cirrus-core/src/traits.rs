//! Core trait definitions for the policy pipeline.
//!
//! Four seams make up a run:
//!
//! - `Filter`          narrows the fetched resource set
//! - `Action`          mutates the matched resources through a collaborator
//! - `AuditWriter`     records every executed action immutably
//! - `SchemaValidator` checks filter/action option blocks before compilation
//!
//! The runner wires them together: fetch, filter in order, act in order,
//! audit each action.

use serde_json::Value;

use cirrus_contracts::{
    error::CirrusResult,
    report::ActionReport,
    resource::Resource,
    run::{RunId, RunRecord},
};

use crate::context::RunContext;

/// A predicate stage over fetched resources.
///
/// Filters may annotate the resources they keep, and may call read-only
/// collaborators to augment them. They never mutate cloud state.
pub trait Filter: Send + Sync {
    /// The registered name, e.g. `"network-location"`.
    fn name(&self) -> &str;

    /// Return the subset of `resources` that match, in input order.
    fn process(&self, ctx: &RunContext<'_>, resources: Vec<Resource>)
        -> CirrusResult<Vec<Resource>>;
}

/// A mutating stage over the matched resources.
pub trait Action: Send + Sync {
    /// The registered name, e.g. `"auto-tag-user"`.
    fn name(&self) -> &str;

    /// Act on `resources`.
    ///
    /// Per-resource failures reported by a collaborator land in the
    /// returned report. A failed collaborator call is returned as `Err`
    /// and ends the action.
    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport>;
}

/// The remediation ledger.
///
/// Every executed action produces exactly one `RunRecord`. A failed write
/// is fatal for the run and surfaces as `CirrusError::AuditWriteFailed`.
pub trait AuditWriter: Send + Sync {
    /// Append one record. Records are never modified or deleted.
    fn write(&self, record: &RunRecord) -> CirrusResult<()>;

    /// Mark a run as complete. Implementations may seal or flush here.
    fn finalize(&self, run_id: &RunId) -> CirrusResult<()>;
}

/// Structural validation of option blocks against a declared JSON schema.
pub trait SchemaValidator: Send + Sync {
    /// `Ok(())` when `instance` conforms to `schema`.
    ///
    /// Violations are reported together as `CirrusError::SchemaValidation`;
    /// a schema that cannot be compiled is a `CirrusError::ConfigError`.
    fn validate(&self, schema: &Value, instance: &Value) -> CirrusResult<()>;
}
