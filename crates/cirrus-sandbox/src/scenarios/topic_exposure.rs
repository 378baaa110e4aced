//! Scenario: notification topics open to every account.
//!
//! `orders` lets any account publish. It is reported and tagged, then its
//! wildcard grant is removed, which leaves it with no access policy.
//! `audit-feed` only grants the object storage service and ships its
//! deliveries to a log stream; it matches neither policy.

use cirrus_contracts::{error::CirrusResult, settings::RunnerSettings};

use super::{execute, ScenarioResult};
use crate::fixtures::topic_cloud;

const POLICY: &str = include_str!("../../policies/topic_exposure.toml");

pub fn run_scenario() -> CirrusResult<ScenarioResult> {
    println!("=== Scenario: Topic exposure (topic-access, topic-lts) ===");
    println!();

    execute(topic_cloud(), POLICY, None, RunnerSettings::default())
}
