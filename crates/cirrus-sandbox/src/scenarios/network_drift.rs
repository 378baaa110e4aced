//! Scenario: find functions whose network location is inconsistent.
//!
//! `fn-reports` runs in a prod subnet behind a dev security group and is
//! flagged. `fn-ingest` also sits behind the shared infra group, which the
//! policy ignores, so it stays consistent.

use cirrus_contracts::{error::CirrusResult, settings::RunnerSettings};

use super::{execute, ScenarioResult};
use crate::fixtures::network_cloud;

const POLICY: &str = include_str!("../../policies/network_drift.toml");

pub fn run_scenario() -> CirrusResult<ScenarioResult> {
    println!("=== Scenario: Network drift (network-location) ===");
    println!("  Key:      tag:Env across function, subnet and security groups");
    println!();

    execute(network_cloud(), POLICY, None, RunnerSettings::default())
}
