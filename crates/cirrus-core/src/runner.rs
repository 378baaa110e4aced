//! The policy runner: fetch, filter, act, audit.
//!
//! One call to `PolicyRunner::run` executes one compiled policy:
//!
//!   Fetch → [restrict to event] → Filter* → Action* → Audit → Finalize
//!
//! Filters run in declaration order, each seeing only what the previous one
//! kept. Every action sees the full matched set. Each executed action writes
//! exactly one `RunRecord`; a failed audit write ends the run.

use std::sync::Arc;

use tracing::{debug, info, warn};

use cirrus_contracts::{
    error::{CirrusError, CirrusResult},
    event::CloudEvent,
    policy::PolicyMode,
    report::ActionReport,
    resource::{Resource, ResourceType},
    run::{RunId, RunRecord},
    settings::RunnerSettings,
};

use crate::context::RunContext;
use crate::services::CloudServices;
use crate::traits::{Action, AuditWriter, Filter};

/// A policy whose filters and actions have been resolved and validated.
///
/// Produced by the policy loader; nothing in it is re-validated at run time.
pub struct CompiledPolicy {
    pub name: String,
    pub resource_type: ResourceType,
    pub mode: PolicyMode,
    pub filters: Vec<Box<dyn Filter>>,
    pub actions: Vec<Box<dyn Action>>,
}

impl std::fmt::Debug for CompiledPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledPolicy")
            .field("name", &self.name)
            .field("resource_type", &self.resource_type)
            .field("mode", &self.mode)
            .field("filters", &self.filters.iter().map(|x| x.name()).collect::<Vec<_>>())
            .field("actions", &self.actions.iter().map(|x| x.name()).collect::<Vec<_>>())
            .finish()
    }
}

/// What one run did.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub policy: String,
    /// False when an event-driven policy ignored the event it was given.
    pub triggered: bool,
    pub matched: Vec<Resource>,
    pub reports: Vec<ActionReport>,
}

/// Executes compiled policies against one cloud session.
///
/// The runner owns the trusted sink (audit) and borrows nothing from the
/// policies it runs, so one runner can execute any number of them.
pub struct PolicyRunner {
    services: Arc<dyn CloudServices>,
    audit: Box<dyn AuditWriter>,
    settings: RunnerSettings,
}

impl PolicyRunner {
    pub fn new(
        services: Arc<dyn CloudServices>,
        audit: Box<dyn AuditWriter>,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            services,
            audit,
            settings,
        }
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// Run `policy` once.
    ///
    /// Event-driven policies require `event`; an event whose name the
    /// policy does not subscribe to yields an untriggered outcome. Pull
    /// policies ignore `event`.
    ///
    /// # Errors
    ///
    /// Collaborator failures from the fetch, any filter or any action, and
    /// audit write failures. Actions that ran before the failure stay
    /// recorded in the ledger.
    pub fn run(
        &self,
        policy: &CompiledPolicy,
        event: Option<&CloudEvent>,
    ) -> CirrusResult<RunOutcome> {
        let run_id = RunId::new();
        let mut outcome = RunOutcome {
            run_id,
            policy: policy.name.clone(),
            triggered: true,
            matched: Vec::new(),
            reports: Vec::new(),
        };

        let event = match (&policy.mode, event) {
            (PolicyMode::Pull, _) => None,
            (mode, Some(ev)) => {
                if !mode.accepts(ev.event_name.as_deref()) {
                    debug!(
                        policy = %policy.name,
                        event_name = ?ev.event_name,
                        "event does not trigger policy"
                    );
                    outcome.triggered = false;
                    return Ok(outcome);
                }
                Some(ev)
            }
            (_, None) => {
                return Err(CirrusError::Execution {
                    reason: format!("policy '{}' is event-driven and needs an event", policy.name),
                });
            }
        };

        debug!(
            run_id = %run_id,
            policy = %policy.name,
            resource_type = %policy.resource_type,
            mode = policy.mode.name(),
            "policy run starting"
        );

        // ── Fetch ────────────────────────────────────────────────────────────
        let mut resources = self.services.resources().list(policy.resource_type)?;
        if let Some(ev) = event {
            // Event-driven runs only ever see the resources the event names.
            resources.retain(|r| ev.resource_ids.iter().any(|id| id == r.id()));
            if resources.is_empty() {
                warn!(
                    policy = %policy.name,
                    event_name = ?ev.event_name,
                    resource_ids = ?ev.resource_ids,
                    "event implicates no fetched resources"
                );
            }
        }
        debug!(
            policy = %policy.name,
            count = resources.len(),
            "resources fetched"
        );

        let ctx = RunContext {
            policy: &policy.name,
            resource_type: policy.resource_type,
            services: self.services.as_ref(),
            settings: &self.settings,
            event,
        };

        // ── Filters ──────────────────────────────────────────────────────────
        for filter in &policy.filters {
            if resources.is_empty() {
                break;
            }
            let before = resources.len();
            resources = filter.process(&ctx, resources)?;
            debug!(
                policy = %policy.name,
                filter = filter.name(),
                before,
                after = resources.len(),
                "filter applied"
            );
        }
        outcome.matched = resources;

        if self.settings.dry_run {
            info!(
                policy = %policy.name,
                matched = outcome.matched.len(),
                "dry run, skipping actions"
            );
            self.audit.finalize(&run_id)?;
            return Ok(outcome);
        }

        // ── Actions ──────────────────────────────────────────────────────────
        if !outcome.matched.is_empty() {
            for action in &policy.actions {
                let report = action.process(&ctx, &outcome.matched)?;
                for failed in &report.failed {
                    warn!(
                        policy = %policy.name,
                        action = action.name(),
                        resource_id = %failed.id,
                        reason = %failed.reason,
                        "action failed for resource"
                    );
                }

                let record =
                    RunRecord::new(run_id, &policy.name, policy.resource_type, report.clone());
                self.audit.write(&record)?;
                outcome.reports.push(report);
            }
        }

        self.audit.finalize(&run_id)?;
        info!(
            run_id = %run_id,
            policy = %policy.name,
            matched = outcome.matched.len(),
            actions = outcome.reports.len(),
            "policy run complete"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::{json, Value};

    use cirrus_contracts::{
        error::{CirrusError, CirrusResult},
        event::{CloudEvent, EventUser},
        policy::PolicyMode,
        report::{ActionReport, FailedResource},
        resource::{Resource, ResourceType},
        run::{RunId, RunRecord},
        settings::RunnerSettings,
        tags::TagSet,
    };

    use crate::context::RunContext;
    use crate::services::*;
    use crate::traits::{Action, AuditWriter, Filter};

    use super::{CompiledPolicy, PolicyRunner};

    // ── Mock helpers ─────────────────────────────────────────────────────────

    /// A cloud that only serves a fixed resource list; every other call fails.
    struct MockCloud {
        resources: Vec<Resource>,
    }

    fn unsupported<T>(op: &str) -> CirrusResult<T> {
        Err(CirrusError::service("mock", op, "not supported"))
    }

    impl ResourceSource for MockCloud {
        fn list(&self, _rt: ResourceType) -> CirrusResult<Vec<Resource>> {
            Ok(self.resources.clone())
        }
    }

    impl TagService for MockCloud {
        fn create_tags(&self, _: &str, _: &[String], _: &TagSet) -> CirrusResult<Vec<FailedResource>> {
            unsupported("create_tags")
        }
        fn delete_tags(&self, _: &str, _: &[String], _: &[String]) -> CirrusResult<Vec<FailedResource>> {
            unsupported("delete_tags")
        }
    }

    impl NetworkService for MockCloud {
        fn subnets(&self, _: &[String]) -> CirrusResult<Vec<Resource>> {
            unsupported("subnets")
        }
        fn security_groups(&self, _: &[String]) -> CirrusResult<Vec<Resource>> {
            unsupported("security_groups")
        }
    }

    impl LoadBalancerService for MockCloud {
        fn member_count(&self, _: &str) -> CirrusResult<usize> {
            unsupported("member_count")
        }
        fn delete_loadbalancer_cascade(&self, _: &str) -> CirrusResult<()> {
            unsupported("delete_loadbalancer_cascade")
        }
        fn remove_ipv6_bandwidth(&self, _: &str) -> CirrusResult<()> {
            unsupported("remove_ipv6_bandwidth")
        }
        fn disassociate_publicip(&self, _: &str) -> CirrusResult<()> {
            unsupported("disassociate_publicip")
        }
        fn disassociate_global_eip(&self, _: &str) -> CirrusResult<()> {
            unsupported("disassociate_global_eip")
        }
        fn delete_pool_cascade(&self, _: &str) -> CirrusResult<()> {
            unsupported("delete_pool_cascade")
        }
        fn delete_listener_force(&self, _: &str) -> CirrusResult<()> {
            unsupported("delete_listener_force")
        }
        fn create_logtank(&self, _: &str, _: &str, _: &str) -> CirrusResult<()> {
            unsupported("create_logtank")
        }
        fn list_ip_groups(&self) -> CirrusResult<Vec<Value>> {
            unsupported("list_ip_groups")
        }
        fn update_listener_ipgroup(&self, _: &str, _: &ListenerIpGroup) -> CirrusResult<()> {
            unsupported("update_listener_ipgroup")
        }
        fn list_l7_policies(&self, _: &str) -> CirrusResult<Vec<Value>> {
            unsupported("list_l7_policies")
        }
        fn create_redirect_policy(&self, _: &str, _: &str) -> CirrusResult<()> {
            unsupported("create_redirect_policy")
        }
    }

    impl LogService for MockCloud {
        fn list_log_groups(&self) -> CirrusResult<Vec<Value>> {
            unsupported("list_log_groups")
        }
        fn list_log_streams(&self, _: &str) -> CirrusResult<Vec<Value>> {
            unsupported("list_log_streams")
        }
        fn list_transfers(&self) -> CirrusResult<Vec<Value>> {
            unsupported("list_transfers")
        }
        fn create_transfer(&self, _: &Value) -> CirrusResult<()> {
            unsupported("create_transfer")
        }
    }

    impl FunctionService for MockCloud {
        fn list_triggers(&self, _: &str) -> CirrusResult<Option<Vec<Value>>> {
            unsupported("list_triggers")
        }
        fn delete_function(&self, _: &str) -> CirrusResult<()> {
            unsupported("delete_function")
        }
        fn update_max_instances(&self, _: &str, _: i64) -> CirrusResult<()> {
            unsupported("update_max_instances")
        }
        fn show_function_config(&self, _: &str) -> CirrusResult<Value> {
            unsupported("show_function_config")
        }
        fn update_function_config(&self, _: &str, _: &Value) -> CirrusResult<()> {
            unsupported("update_function_config")
        }
        fn list_reserved_instances(&self, _: &str) -> CirrusResult<Vec<Value>> {
            unsupported("list_reserved_instances")
        }
        fn list_versions(&self, _: &str) -> CirrusResult<Vec<Value>> {
            unsupported("list_versions")
        }
        fn list_aliases(&self, _: &str) -> CirrusResult<Vec<Value>> {
            unsupported("list_aliases")
        }
        fn invoke(&self, _: &str, _: &Invocation) -> CirrusResult<Value> {
            unsupported("invoke")
        }
    }

    impl NotificationService for MockCloud {
        fn publish(&self, _: &str, _: Option<&str>, _: MessageBody<'_>) -> CirrusResult<String> {
            unsupported("publish")
        }
        fn delete_topic(&self, _: &str) -> CirrusResult<()> {
            unsupported("delete_topic")
        }
        fn list_logtanks(&self, _: &str) -> CirrusResult<Vec<Value>> {
            unsupported("list_logtanks")
        }
        fn access_policy(&self, _: &str) -> CirrusResult<Option<String>> {
            unsupported("access_policy")
        }
        fn create_logtank(&self, _: &str, _: &str, _: &str) -> CirrusResult<()> {
            unsupported("create_logtank")
        }
        fn delete_logtank(&self, _: &str, _: &str) -> CirrusResult<()> {
            unsupported("delete_logtank")
        }
        fn update_access_policy(&self, _: &str, _: Option<&str>) -> CirrusResult<()> {
            unsupported("update_access_policy")
        }
        fn delete_topic_attributes(&self, _: &str) -> CirrusResult<()> {
            unsupported("delete_topic_attributes")
        }
    }

    impl CloudServices for MockCloud {
        fn region(&self) -> &str {
            "test-region-1"
        }
        fn resources(&self) -> &dyn ResourceSource {
            self
        }
        fn tags(&self) -> &dyn TagService {
            self
        }
        fn network(&self) -> &dyn NetworkService {
            self
        }
        fn load_balancers(&self) -> &dyn LoadBalancerService {
            self
        }
        fn logs(&self) -> &dyn LogService {
            self
        }
        fn functions(&self) -> &dyn FunctionService {
            self
        }
        fn notifications(&self) -> &dyn NotificationService {
            self
        }
    }

    fn cloud() -> Arc<MockCloud> {
        Arc::new(MockCloud {
            resources: vec![
                Resource::from_value(json!({"id": "lb-1", "name": "web"})),
                Resource::from_value(json!({"id": "lb-2", "name": "api"})),
                Resource::from_value(json!({"id": "lb-3", "name": "web"})),
            ],
        })
    }

    /// An audit writer that records every call for later inspection.
    struct MockAudit {
        records: Arc<Mutex<Vec<RunRecord>>>,
        finalized: Arc<Mutex<Vec<RunId>>>,
        fail: bool,
    }

    impl MockAudit {
        fn new() -> Self {
            Self {
                records: Arc::new(Mutex::new(vec![])),
                finalized: Arc::new(Mutex::new(vec![])),
                fail: false,
            }
        }
    }

    impl AuditWriter for MockAudit {
        fn write(&self, record: &RunRecord) -> CirrusResult<()> {
            if self.fail {
                return Err(CirrusError::AuditWriteFailed {
                    reason: "disk full".to_string(),
                });
            }
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }

        fn finalize(&self, run_id: &RunId) -> CirrusResult<()> {
            self.finalized.lock().unwrap().push(*run_id);
            Ok(())
        }
    }

    /// Keeps resources whose `name` equals the configured value.
    struct NameFilter(&'static str);

    impl Filter for NameFilter {
        fn name(&self) -> &str {
            "name"
        }

        fn process(&self, _ctx: &RunContext<'_>, mut resources: Vec<Resource>) -> CirrusResult<Vec<Resource>> {
            resources.retain(|r| r.str_field("name") == Some(self.0));
            Ok(resources)
        }
    }

    /// An action that records the ids it was handed.
    struct RecordingAction {
        seen: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl Action for RecordingAction {
        fn name(&self) -> &str {
            "record"
        }

        fn process(&self, _ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
            if self.fail {
                return Err(CirrusError::service("mock", "record", "unavailable"));
            }
            let mut report = ActionReport::new("record");
            for r in resources {
                self.seen.lock().unwrap().push(r.id().to_string());
                report.success(r.id());
            }
            Ok(report)
        }
    }

    fn policy(mode: PolicyMode, seen: Arc<Mutex<Vec<String>>>, fail: bool) -> CompiledPolicy {
        CompiledPolicy {
            name: "web-lbs".to_string(),
            resource_type: ResourceType::ElbLoadbalancer,
            mode,
            filters: vec![Box::new(NameFilter("web"))],
            actions: vec![Box::new(RecordingAction { seen, fail })],
        }
    }

    fn event(ids: &[&str]) -> CloudEvent {
        CloudEvent {
            user: EventUser {
                user_type: "IAMUser".to_string(),
                name: Some("alice".to_string()),
                principal_id: None,
            },
            source_ip: None,
            event_name: Some("createLoadBalancer".to_string()),
            resource_ids: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    // ── Tests ────────────────────────────────────────────────────────────────

    #[test]
    fn pull_run_filters_then_acts_and_audits() {
        let audit = MockAudit::new();
        let records = audit.records.clone();
        let finalized = audit.finalized.clone();
        let runner = PolicyRunner::new(cloud(), Box::new(audit), RunnerSettings::default());

        let seen = Arc::new(Mutex::new(vec![]));
        let outcome = runner.run(&policy(PolicyMode::Pull, seen.clone(), false), None).unwrap();

        assert!(outcome.triggered);
        assert_eq!(*seen.lock().unwrap(), vec!["lb-1", "lb-3"]);
        assert_eq!(outcome.reports.len(), 1);

        let records = records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].run_id, outcome.run_id);
        assert_eq!(records[0].report.succeeded, vec!["lb-1", "lb-3"]);
        assert_eq!(*finalized.lock().unwrap(), vec![outcome.run_id]);
    }

    #[test]
    fn dry_run_skips_actions() {
        let audit = MockAudit::new();
        let records = audit.records.clone();
        let settings = RunnerSettings {
            dry_run: true,
            ..RunnerSettings::default()
        };
        let runner = PolicyRunner::new(cloud(), Box::new(audit), settings);

        let seen = Arc::new(Mutex::new(vec![]));
        let outcome = runner.run(&policy(PolicyMode::Pull, seen.clone(), false), None).unwrap();

        assert_eq!(outcome.matched.len(), 2);
        assert!(seen.lock().unwrap().is_empty());
        assert!(records.lock().unwrap().is_empty());
    }

    #[test]
    fn event_restricts_resources_to_implicated_ids() {
        let runner = PolicyRunner::new(cloud(), Box::new(MockAudit::new()), RunnerSettings::default());
        let mode = PolicyMode::Cloudtrace {
            events: vec!["createLoadBalancer".to_string()],
        };
        let seen = Arc::new(Mutex::new(vec![]));
        let outcome = runner
            .run(&policy(mode, seen.clone(), false), Some(&event(&["lb-3"])))
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["lb-3"]);
        assert_eq!(outcome.matched.len(), 1);
    }

    #[test]
    fn event_without_resource_ids_matches_nothing() {
        let audit = MockAudit::new();
        let records = audit.records.clone();
        let finalized = audit.finalized.clone();
        let runner = PolicyRunner::new(cloud(), Box::new(audit), RunnerSettings::default());
        let mode = PolicyMode::Cloudtrace {
            events: vec!["createLoadBalancer".to_string()],
        };
        let seen = Arc::new(Mutex::new(vec![]));
        let outcome = runner
            .run(&policy(mode, seen.clone(), false), Some(&event(&[])))
            .unwrap();

        assert!(outcome.matched.is_empty());
        assert!(outcome.reports.is_empty());
        assert!(seen.lock().unwrap().is_empty());
        assert!(records.lock().unwrap().is_empty());
        assert_eq!(*finalized.lock().unwrap(), vec![outcome.run_id]);
    }

    #[test]
    fn event_naming_unknown_resources_matches_nothing() {
        let runner = PolicyRunner::new(cloud(), Box::new(MockAudit::new()), RunnerSettings::default());
        let mode = PolicyMode::Cloudtrace {
            events: vec!["createLoadBalancer".to_string()],
        };
        let seen = Arc::new(Mutex::new(vec![]));
        let outcome = runner
            .run(&policy(mode, seen.clone(), false), Some(&event(&["lb-9", "lb-2"])))
            .unwrap();

        // lb-2 exists but the name filter drops it; lb-9 was never fetched.
        assert!(outcome.matched.is_empty());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn unsubscribed_event_does_not_trigger() {
        let runner = PolicyRunner::new(cloud(), Box::new(MockAudit::new()), RunnerSettings::default());
        let mode = PolicyMode::Cloudtrace {
            events: vec!["deleteLoadBalancer".to_string()],
        };
        let seen = Arc::new(Mutex::new(vec![]));
        let outcome = runner
            .run(&policy(mode, seen.clone(), false), Some(&event(&[])))
            .unwrap();

        assert!(!outcome.triggered);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn event_driven_policy_without_event_is_an_error() {
        let runner = PolicyRunner::new(cloud(), Box::new(MockAudit::new()), RunnerSettings::default());
        let mode = PolicyMode::Cloudtrace { events: vec![] };
        let err = runner
            .run(&policy(mode, Arc::new(Mutex::new(vec![])), false), None)
            .unwrap_err();
        assert!(matches!(err, CirrusError::Execution { .. }));
    }

    #[test]
    fn action_failure_propagates_without_audit_record() {
        let audit = MockAudit::new();
        let records = audit.records.clone();
        let runner = PolicyRunner::new(cloud(), Box::new(audit), RunnerSettings::default());

        let err = runner
            .run(&policy(PolicyMode::Pull, Arc::new(Mutex::new(vec![])), true), None)
            .unwrap_err();
        assert!(matches!(err, CirrusError::ServiceCall { .. }));
        assert!(records.lock().unwrap().is_empty());
    }

    #[test]
    fn audit_write_failure_is_fatal() {
        let mut audit = MockAudit::new();
        audit.fail = true;
        let runner = PolicyRunner::new(cloud(), Box::new(audit), RunnerSettings::default());

        let err = runner
            .run(&policy(PolicyMode::Pull, Arc::new(Mutex::new(vec![])), false), None)
            .unwrap_err();
        assert!(matches!(err, CirrusError::AuditWriteFailed { .. }));
    }
}
