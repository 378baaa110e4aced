//! Shared fixtures for unit tests.

use std::sync::Mutex;

use cirrus_contracts::{
    error::{CirrusError, CirrusResult},
    event::CloudEvent,
    policy::PolicyMode,
    report::FailedResource,
    resource::{Resource, ResourceType},
    settings::RunnerSettings,
    tags::TagSet,
};
use cirrus_core::{context::RunContext, services::*};
use serde_json::Value;

use crate::registry::BuildContext;

/// A cloud that only answers region queries. Enough for pure filters.
pub struct NoCloud;

fn unsupported<T>(operation: &str) -> CirrusResult<T> {
    Err(CirrusError::service("none", operation, "not supported"))
}

impl ResourceSource for NoCloud {
    fn list(&self, _: ResourceType) -> CirrusResult<Vec<Resource>> {
        unsupported("list")
    }
}

impl TagService for NoCloud {
    fn create_tags(&self, _: &str, _: &[String], _: &TagSet) -> CirrusResult<Vec<FailedResource>> {
        unsupported("create_tags")
    }
    fn delete_tags(&self, _: &str, _: &[String], _: &[String]) -> CirrusResult<Vec<FailedResource>> {
        unsupported("delete_tags")
    }
}

impl NetworkService for NoCloud {
    fn subnets(&self, _: &[String]) -> CirrusResult<Vec<Resource>> {
        unsupported("subnets")
    }
    fn security_groups(&self, _: &[String]) -> CirrusResult<Vec<Resource>> {
        unsupported("security_groups")
    }
}

impl LoadBalancerService for NoCloud {
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

impl LogService for NoCloud {
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

impl FunctionService for NoCloud {
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

impl NotificationService for NoCloud {
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

impl CloudServices for NoCloud {
    fn region(&self) -> &str {
        "cn-north-4"
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

pub fn settings() -> RunnerSettings {
    RunnerSettings::default()
}

pub fn build_context<'a>(
    resource_type: ResourceType,
    mode: &'a PolicyMode,
    settings: &'a RunnerSettings,
) -> BuildContext<'a> {
    BuildContext {
        policy: "unit",
        resource_type,
        mode,
        settings,
    }
}

pub fn run_context<'a>(
    services: &'a dyn CloudServices,
    settings: &'a RunnerSettings,
    resource_type: ResourceType,
    event: Option<&'a CloudEvent>,
) -> RunContext<'a> {
    RunContext {
        policy: "unit",
        resource_type,
        services,
        settings,
        event,
    }
}

/// One recorded tag service call.
#[derive(Debug, Clone, PartialEq)]
pub enum TagCall {
    Create {
        resource_type: String,
        ids: Vec<String>,
        tags: TagSet,
    },
    Delete {
        resource_type: String,
        ids: Vec<String>,
        keys: Vec<String>,
    },
}

/// Records tag writes and rejects the configured ids. Every other service
/// behaves like [`NoCloud`].
#[derive(Default)]
pub struct TagCloud {
    pub calls: Mutex<Vec<TagCall>>,
    pub rejected: Vec<String>,
    pub broken: bool,
}

impl TagCloud {
    pub fn rejecting(ids: &[&str]) -> Self {
        Self {
            rejected: ids.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<TagCall> {
        self.calls.lock().unwrap().clone()
    }

    fn outcome(&self, ids: &[String]) -> CirrusResult<Vec<FailedResource>> {
        if self.broken {
            return unsupported("tags");
        }
        Ok(ids
            .iter()
            .filter(|id| self.rejected.contains(id))
            .map(|id| FailedResource {
                id: id.clone(),
                reason: "quota exceeded".to_string(),
            })
            .collect())
    }
}

impl TagService for TagCloud {
    fn create_tags(&self, rt: &str, ids: &[String], tags: &TagSet) -> CirrusResult<Vec<FailedResource>> {
        self.calls.lock().unwrap().push(TagCall::Create {
            resource_type: rt.to_string(),
            ids: ids.to_vec(),
            tags: tags.clone(),
        });
        self.outcome(ids)
    }

    fn delete_tags(&self, rt: &str, ids: &[String], keys: &[String]) -> CirrusResult<Vec<FailedResource>> {
        self.calls.lock().unwrap().push(TagCall::Delete {
            resource_type: rt.to_string(),
            ids: ids.to_vec(),
            keys: keys.to_vec(),
        });
        self.outcome(ids)
    }
}

impl CloudServices for TagCloud {
    fn region(&self) -> &str {
        "cn-north-4"
    }
    fn resources(&self) -> &dyn ResourceSource {
        &NoCloud
    }
    fn tags(&self) -> &dyn TagService {
        self
    }
    fn network(&self) -> &dyn NetworkService {
        &NoCloud
    }
    fn load_balancers(&self) -> &dyn LoadBalancerService {
        &NoCloud
    }
    fn logs(&self) -> &dyn LogService {
        &NoCloud
    }
    fn functions(&self) -> &dyn FunctionService {
        &NoCloud
    }
    fn notifications(&self) -> &dyn NotificationService {
        &NoCloud
    }
}
