//! # cirrus-contracts
//!
//! Shared types and error contracts for the Cirrus cloud policy plugin.
//!
//! Every crate in the workspace imports from here. Apart from tag
//! normalization, no logic lives in this crate: only data definitions and
//! error types.

pub mod error;
pub mod evaluation;
pub mod event;
pub mod policy;
pub mod report;
pub mod resource;
pub mod run;
pub mod settings;
pub mod tags;

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use error::CirrusError;
    use policy::PolicyMode;
    use report::ActionReport;
    use resource::ResourceType;
    use run::{RunId, RunRecord};
    use settings::RunnerSettings;

    // ── RunId ────────────────────────────────────────────────────────────────

    #[test]
    fn run_ids_are_unique() {
        let a = RunId::new();
        let b = RunId::new();
        assert_ne!(a, b);
    }

    // ── PolicyMode ───────────────────────────────────────────────────────────

    #[test]
    fn pull_is_the_default_mode() {
        assert_eq!(PolicyMode::default(), PolicyMode::Pull);
        assert!(!PolicyMode::Pull.is_event_driven());
    }

    #[test]
    fn cloudtrace_mode_parses_from_tagged_json() {
        let mode: PolicyMode =
            serde_json::from_value(json!({"type": "cloudtrace", "events": ["createTopic"]}))
                .unwrap();
        assert!(mode.is_event_driven());
        assert!(mode.accepts(Some("createTopic")));
        assert!(!mode.accepts(Some("deleteTopic")));
        assert!(!mode.accepts(None));
    }

    #[test]
    fn cloudtrace_without_events_accepts_anything() {
        let mode = PolicyMode::Cloudtrace { events: vec![] };
        assert!(mode.accepts(None));
        assert!(mode.accepts(Some("anything")));
    }

    // ── ActionReport ─────────────────────────────────────────────────────────

    #[test]
    fn report_merge_keeps_own_name() {
        let mut report = ActionReport::new("auto-tag-user");
        report.success("lb-1");

        let mut other = ActionReport::new("tag");
        other.success("lb-2");
        other.failure("lb-3", "quota exceeded");

        report.merge(other);
        assert_eq!(report.action, "auto-tag-user");
        assert_eq!(report.succeeded, vec!["lb-1", "lb-2"]);
        assert_eq!(report.failed.len(), 1);
        assert!(!report.is_clean());
    }

    // ── RunnerSettings ───────────────────────────────────────────────────────

    #[test]
    fn settings_defaults() {
        let s = RunnerSettings::default();
        assert_eq!(s.max_workers, 3);
        assert_eq!(s.tag_batch_size, 50);
        assert_eq!(s.max_tags_per_call, 10);
        assert!(!s.dry_run);
    }

    #[test]
    fn settings_fill_missing_fields_from_defaults() {
        let s: RunnerSettings = serde_json::from_value(json!({"dry_run": true})).unwrap();
        assert!(s.dry_run);
        assert_eq!(s.tag_batch_size, 50);
    }

    // ── RunRecord serde ──────────────────────────────────────────────────────

    #[test]
    fn run_record_round_trips() {
        let mut report = ActionReport::new("delete");
        report.success("topic-1");
        let record = RunRecord::new(RunId::new(), "delete-topics", ResourceType::SmnTopic, report);

        let encoded = serde_json::to_string(&record).unwrap();
        let decoded: RunRecord = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, record);
        assert!(encoded.contains("\"resource_type\":\"smn-topic\""));
    }

    // ── CirrusError display ──────────────────────────────────────────────────

    #[test]
    fn error_display_policy_validation() {
        let e = CirrusError::validation("network-location requires a security-group filter");
        assert_eq!(
            e.to_string(),
            "policy validation failed: network-location requires a security-group filter"
        );
    }

    #[test]
    fn error_display_service_call() {
        let e = CirrusError::service("tms", "create_tags", "throttled");
        assert_eq!(e.to_string(), "service call tms:create_tags failed: throttled");
        assert!(!e.is_configuration());
    }

    #[test]
    fn error_display_audit_write_failed() {
        let e = CirrusError::AuditWriteFailed {
            reason: "lock poisoned".to_string(),
        };
        assert_eq!(e.to_string(), "audit write failed: lock poisoned");
    }

    #[test]
    fn configuration_errors_are_classified() {
        assert!(CirrusError::ConfigError {
            reason: "bad toml".into()
        }
        .is_configuration());
        assert!(CirrusError::SchemaValidation {
            reason: "missing key".into()
        }
        .is_configuration());
        assert!(!CirrusError::Execution {
            reason: "x".into()
        }
        .is_configuration());
    }
}
