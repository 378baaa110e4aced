//! Scenario: load balancers without access logging.
//!
//! `lb-edge` logs nothing and holds two public addresses: it is tagged and
//! both addresses are released. Its HTTP listener is deleted together with
//! the listener's default pool. Access logging is then enabled on `lb-edge`
//! and both load balancers' log streams get a transfer job.

use cirrus_contracts::{error::CirrusResult, settings::RunnerSettings};

use super::{execute, ScenarioResult};
use crate::fixtures::elb_cloud;

const POLICY: &str = include_str!("../../policies/elb_hygiene.toml");

pub fn run_scenario() -> CirrusResult<ScenarioResult> {
    println!("=== Scenario: ELB hygiene (is-not-logging, unbind-publicips, enable-logging) ===");
    println!();

    execute(elb_cloud(), POLICY, None, RunnerSettings::default())
}
