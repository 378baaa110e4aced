//! Scenario: attribute a new function to its creator.
//!
//! An IAM user creates `fn-fresh`. The event-driven policy sees only the
//! resources the event names, keeps the ones without an `Owner` tag and
//! tags them with the user name and principal id. A second delivery of the
//! same event finds nothing left to tag.

use cirrus_contracts::{error::CirrusResult, settings::RunnerSettings};

use super::{execute, ScenarioResult};
use crate::fixtures::{network_cloud, user_event};

const POLICY: &str = include_str!("../../policies/owner_tagging.toml");

pub fn run_scenario() -> CirrusResult<ScenarioResult> {
    println!("=== Scenario: Owner tagging (auto-tag-user) ===");
    println!("  Event:    CreateFunction by IAMUser alice on fn-fresh");
    println!();

    let event = user_event("alice", "CreateFunction", &["fn-fresh"]);
    execute(network_cloud(), POLICY, Some(&event), RunnerSettings::default())
}

#[cfg(test)]
mod tests {
    use cirrus_contracts::resource::ResourceType;
    use cirrus_core::PolicyRunner;
    use cirrus_policy::PolicyLoader;

    use super::*;

    #[test]
    fn creator_is_written_to_owner_tags() {
        let result = run_scenario().unwrap();
        let outcome = result.outcome("function-owner").unwrap();
        assert_eq!(outcome.reports[0].succeeded, vec!["fn-fresh"]);
        assert_eq!(outcome.reports[0].tags.get("Owner"), Some("alice"));

        let tags = result.cloud.tags_of(ResourceType::Functiongraph, "fn-fresh").unwrap();
        assert_eq!(tags.get("Owner"), Some("alice"));
        assert_eq!(tags.get("OwnerId"), Some("alice-principal"));

        // Untouched by the event.
        let billing = result.cloud.tags_of(ResourceType::Functiongraph, "fn-billing").unwrap();
        assert!(!billing.contains_key("Owner"));
    }

    #[test]
    fn redelivered_event_finds_nothing_to_tag() {
        let result = run_scenario().unwrap();
        let policies = PolicyLoader::new(RunnerSettings::default()).from_toml_str(POLICY).unwrap();
        let runner = PolicyRunner::new(
            result.cloud.clone(),
            Box::new(result.ledger.clone()),
            RunnerSettings::default(),
        );
        let event = user_event("bob", "CreateFunction", &["fn-fresh"]);
        let again = runner.run(&policies[0], Some(&event)).unwrap();

        assert!(again.matched.is_empty());
        let tags = result.cloud.tags_of(ResourceType::Functiongraph, "fn-fresh").unwrap();
        assert_eq!(tags.get("Owner"), Some("alice"));
        assert!(result.ledger.verify().is_ok());
    }

    #[test]
    fn event_without_resource_ids_tags_nothing() {
        let event = user_event("mallory", "CreateFunction", &[]);
        let result = execute(network_cloud(), POLICY, Some(&event), RunnerSettings::default()).unwrap();
        let outcome = result.outcome("function-owner").unwrap();

        assert!(outcome.triggered);
        assert!(outcome.matched.is_empty());
        assert!(result.cloud.calls_to("create_tags").is_empty());
        let fresh = result.cloud.tags_of(ResourceType::Functiongraph, "fn-fresh").unwrap();
        assert!(!fresh.contains_key("Owner"));
    }

    #[test]
    fn unsubscribed_event_is_ignored() {
        let event = user_event("alice", "UpdateFunctionCode", &["fn-fresh"]);
        let result = execute(network_cloud(), POLICY, Some(&event), RunnerSettings::default()).unwrap();
        assert!(!result.outcomes[0].triggered);
        assert!(result.cloud.calls_to("create_tags").is_empty());
    }
}
