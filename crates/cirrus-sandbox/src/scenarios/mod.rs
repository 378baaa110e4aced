//! Runnable sandbox scenarios.
//!
//! Each scenario loads an embedded policy document, runs it against one of
//! the canned clouds from [`crate::fixtures`], prints what happened and
//! verifies the ledger. The returned [`ScenarioResult`] lets tests assert on
//! the same run.

pub mod elb_hygiene;
pub mod network_drift;
pub mod owner_tagging;
pub mod topic_exposure;

use std::sync::Arc;

use cirrus_audit::InMemoryLedger;
use cirrus_contracts::{
    error::{CirrusError, CirrusResult},
    event::CloudEvent,
    settings::RunnerSettings,
};
use cirrus_core::{PolicyRunner, RunOutcome};
use cirrus_policy::PolicyLoader;

use crate::cloud::InMemoryCloud;

/// Everything a scenario produced.
pub struct ScenarioResult {
    pub cloud: Arc<InMemoryCloud>,
    pub ledger: InMemoryLedger,
    pub outcomes: Vec<RunOutcome>,
}

impl ScenarioResult {
    pub fn outcome(&self, policy: &str) -> Option<&RunOutcome> {
        self.outcomes.iter().find(|o| o.policy == policy)
    }
}

/// Compile `policies` and run each one once against `cloud`.
pub fn execute(
    cloud: InMemoryCloud,
    policies: &str,
    event: Option<&CloudEvent>,
    settings: RunnerSettings,
) -> CirrusResult<ScenarioResult> {
    let cloud = Arc::new(cloud);
    let ledger = InMemoryLedger::new();
    let compiled = PolicyLoader::new(settings.clone()).from_toml_str(policies)?;
    let runner = PolicyRunner::new(cloud.clone(), Box::new(ledger.clone()), settings);

    let mut outcomes = Vec::with_capacity(compiled.len());
    for policy in &compiled {
        let outcome = runner.run(policy, event)?;
        print_outcome(&outcome);
        outcomes.push(outcome);
    }

    let entries = ledger.export()?.entries.len();
    match ledger.verify() {
        Ok(()) => println!("  Ledger:   VERIFIED ({entries} entr{})", if entries == 1 { "y" } else { "ies" }),
        Err(sequence) => {
            return Err(CirrusError::AuditWriteFailed {
                reason: format!("ledger chain broken at entry {sequence}"),
            })
        }
    }
    println!();

    Ok(ScenarioResult {
        cloud,
        ledger,
        outcomes,
    })
}

fn print_outcome(outcome: &RunOutcome) {
    println!("  Policy:   {}", outcome.policy);
    if !outcome.triggered {
        println!("    not triggered by this event");
        return;
    }
    let ids: Vec<&str> = outcome.matched.iter().map(|r| r.id()).collect();
    println!("    matched:  {} [{}]", ids.len(), ids.join(", "));
    for report in &outcome.reports {
        println!(
            "    {:<26} ok: [{}]  failed: {}",
            report.action,
            report.succeeded.join(", "),
            report.failed.len()
        );
        for failed in &report.failed {
            println!("      {} -> {}", failed.id, failed.reason);
        }
    }
}
