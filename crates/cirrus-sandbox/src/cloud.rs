//! An in-memory cloud implementing every service collaborator.
//!
//! State lives behind one `Mutex` so mutating calls (tag writes, deletes,
//! configuration updates) are visible to later reads within the same
//! session. Every call is recorded, and any operation can be made to fail
//! for one target or for all of them.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use cirrus_contracts::{
    error::{CirrusError, CirrusResult},
    report::FailedResource,
    resource::{Resource, ResourceType},
    tags::TagSet,
};
use cirrus_core::{services::*, tagging::resource_tags};

/// Matches every target in [`InMemoryCloud::fail_on`].
pub const ANY_TARGET: &str = "*";

/// One recorded collaborator call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCall {
    pub service: String,
    pub operation: String,
    pub target: String,
}

/// A message accepted by the notification service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedMessage {
    pub topic_urn: String,
    pub subject: Option<String>,
    /// The text, the structure document, or the template variables as JSON.
    pub message: String,
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
    #[serde(default)]
    pub structured: bool,
}

/// The serializable contents of a sandbox cloud.
///
/// ```json
/// {
///   "region": "cn-north-4",
///   "resources": {"functiongraph": [{"id": "f-1", "func_vpc": {"subnet_id": "sub-1"}}]},
///   "subnets": [{"id": "sub-1", "tags": {"Env": "prod"}}],
///   "members": {"lb-1": 2}
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Fixture {
    pub region: Option<String>,
    /// Records per resource type name.
    pub resources: BTreeMap<String, Vec<Value>>,
    pub subnets: Vec<Value>,
    pub security_groups: Vec<Value>,
    /// Backend member count per load balancer id.
    pub members: HashMap<String, usize>,
    /// Triggers per function URN. `null` models a missing trigger body.
    pub triggers: HashMap<String, Option<Vec<Value>>>,
    /// Full configuration per function URN.
    pub function_configs: HashMap<String, Value>,
    pub logtanks: HashMap<String, Vec<Value>>,
    /// Raw access policy JSON per topic URN.
    pub access_policies: HashMap<String, String>,
    pub log_groups: Vec<Value>,
    /// Log streams per log group id.
    pub log_streams: HashMap<String, Vec<Value>>,
    pub transfers: Vec<Value>,
    pub ip_groups: Vec<Value>,
    /// Forwarding policies per listener id.
    pub l7_policies: HashMap<String, Vec<Value>>,
    /// Reserved instance configurations, versions and aliases per
    /// unqualified function URN.
    pub reserved_instances: HashMap<String, Vec<Value>>,
    pub versions: HashMap<String, Vec<Value>>,
    pub aliases: HashMap<String, Vec<Value>>,
}

impl Fixture {
    pub fn from_json_str(s: &str) -> CirrusResult<Self> {
        serde_json::from_str(s).map_err(|e| CirrusError::ConfigError {
            reason: format!("failed to parse sandbox fixture: {e}"),
        })
    }
}

#[derive(Default)]
struct CloudState {
    resources: BTreeMap<ResourceType, Vec<Resource>>,
    subnets: Vec<Resource>,
    security_groups: Vec<Resource>,
    members: HashMap<String, usize>,
    triggers: HashMap<String, Option<Vec<Value>>>,
    function_configs: HashMap<String, Value>,
    logtanks: HashMap<String, Vec<Value>>,
    access_policies: HashMap<String, String>,
    log_groups: Vec<Value>,
    log_streams: HashMap<String, Vec<Value>>,
    transfers: Vec<Value>,
    ip_groups: Vec<Value>,
    l7_policies: HashMap<String, Vec<Value>>,
    reserved_instances: HashMap<String, Vec<Value>>,
    versions: HashMap<String, Vec<Value>>,
    aliases: HashMap<String, Vec<Value>>,
    invocations: Vec<(String, Value)>,
    published: Vec<PublishedMessage>,
    calls: Vec<ServiceCall>,
    failures: HashSet<(String, String)>,
    rejected_tag_targets: HashSet<String>,
}

/// The sandbox cloud. Construct from a [`Fixture`] or build up directly.
pub struct InMemoryCloud {
    region: String,
    state: Mutex<CloudState>,
}

fn records(values: Vec<Value>) -> Vec<Resource> {
    values.into_iter().map(Resource::from_value).collect()
}

/// The identifier a URN-addressed call may use for `resource`.
fn addressed_by(resource: &Resource, urn_field: &str, target: &str) -> bool {
    resource.id() == target || resource.str_field(urn_field) == Some(target)
}

impl InMemoryCloud {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            state: Mutex::new(CloudState::default()),
        }
    }

    /// Fails when the fixture names an unregistered resource type.
    pub fn from_fixture(fixture: Fixture) -> CirrusResult<Self> {
        let cloud = Self::new(fixture.region.unwrap_or_else(|| "cn-north-4".to_string()));
        {
            let mut state = cloud.lock();
            for (name, values) in fixture.resources {
                let resource_type: ResourceType = name.parse()?;
                state.resources.entry(resource_type).or_default().extend(records(values));
            }
            state.subnets = records(fixture.subnets);
            state.security_groups = records(fixture.security_groups);
            state.members = fixture.members;
            state.triggers = fixture.triggers;
            state.function_configs = fixture.function_configs;
            state.logtanks = fixture.logtanks;
            state.access_policies = fixture.access_policies;
            state.log_groups = fixture.log_groups;
            state.log_streams = fixture.log_streams;
            state.transfers = fixture.transfers;
            state.ip_groups = fixture.ip_groups;
            state.l7_policies = fixture.l7_policies;
            state.reserved_instances = fixture.reserved_instances;
            state.versions = fixture.versions;
            state.aliases = fixture.aliases;
        }
        Ok(cloud)
    }

    fn lock(&self) -> MutexGuard<'_, CloudState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ── Seeding ──────────────────────────────────────────────────────────────

    pub fn with_resources(self, resource_type: ResourceType, values: Vec<Value>) -> Self {
        self.lock()
            .resources
            .entry(resource_type)
            .or_default()
            .extend(records(values));
        self
    }

    pub fn with_subnets(self, values: Vec<Value>) -> Self {
        self.lock().subnets.extend(records(values));
        self
    }

    pub fn with_security_groups(self, values: Vec<Value>) -> Self {
        self.lock().security_groups.extend(records(values));
        self
    }

    pub fn with_members(self, loadbalancer_id: &str, count: usize) -> Self {
        self.lock().members.insert(loadbalancer_id.to_string(), count);
        self
    }

    pub fn with_triggers(self, func_urn: &str, triggers: Option<Vec<Value>>) -> Self {
        self.lock().triggers.insert(func_urn.to_string(), triggers);
        self
    }

    pub fn with_function_config(self, func_urn: &str, config: Value) -> Self {
        self.lock().function_configs.insert(func_urn.to_string(), config);
        self
    }

    pub fn with_logtanks(self, topic_urn: &str, logtanks: Vec<Value>) -> Self {
        self.lock().logtanks.insert(topic_urn.to_string(), logtanks);
        self
    }

    pub fn with_access_policy(self, topic_urn: &str, policy: &Value) -> Self {
        self.lock()
            .access_policies
            .insert(topic_urn.to_string(), policy.to_string());
        self
    }

    pub fn with_log_group(self, group: Value, streams: Vec<Value>) -> Self {
        {
            let mut state = self.lock();
            if let Some(id) = group.get("log_group_id").and_then(Value::as_str) {
                state.log_streams.insert(id.to_string(), streams);
            }
            state.log_groups.push(group);
        }
        self
    }

    pub fn with_transfers(self, transfers: Vec<Value>) -> Self {
        self.lock().transfers.extend(transfers);
        self
    }

    pub fn with_ip_groups(self, ip_groups: Vec<Value>) -> Self {
        self.lock().ip_groups.extend(ip_groups);
        self
    }

    pub fn with_l7_policies(self, listener_id: &str, policies: Vec<Value>) -> Self {
        self.lock().l7_policies.insert(listener_id.to_string(), policies);
        self
    }

    pub fn with_reserved_instances(self, func_urn: &str, configs: Vec<Value>) -> Self {
        self.lock().reserved_instances.insert(func_urn.to_string(), configs);
        self
    }

    pub fn with_versions(self, func_urn: &str, versions: Vec<Value>, aliases: Vec<Value>) -> Self {
        {
            let mut state = self.lock();
            state.versions.insert(func_urn.to_string(), versions);
            state.aliases.insert(func_urn.to_string(), aliases);
        }
        self
    }

    // ── Failure injection ────────────────────────────────────────────────────

    /// Make `operation` fail for `target`, or for every target with
    /// [`ANY_TARGET`].
    pub fn fail_on(&self, operation: &str, target: &str) {
        self.lock()
            .failures
            .insert((operation.to_string(), target.to_string()));
    }

    /// Have the tag service reject `resource_id` individually while the
    /// rest of its batch succeeds.
    pub fn reject_tags_for(&self, resource_id: &str) {
        self.lock().rejected_tag_targets.insert(resource_id.to_string());
    }

    // ── Inspection ───────────────────────────────────────────────────────────

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.lock().calls.clone()
    }

    /// Recorded calls of one operation.
    pub fn calls_to(&self, operation: &str) -> Vec<ServiceCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .cloned()
            .collect()
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.lock().published.clone()
    }

    /// The current record for `id`, if it still exists.
    pub fn resource(&self, resource_type: ResourceType, id: &str) -> Option<Resource> {
        self.lock()
            .resources
            .get(&resource_type)
            .and_then(|rs| rs.iter().find(|r| r.id() == id))
            .cloned()
    }

    pub fn tags_of(&self, resource_type: ResourceType, id: &str) -> Option<TagSet> {
        self.resource(resource_type, id).map(|r| resource_tags(&r))
    }

    pub fn function_config(&self, func_urn: &str) -> Option<Value> {
        self.lock().function_configs.get(func_urn).cloned()
    }

    /// Version URNs still present for an unqualified function URN.
    pub fn versions_of(&self, func_urn: &str) -> Vec<String> {
        self.lock()
            .versions
            .get(func_urn)
            .map(|vs| {
                vs.iter()
                    .filter_map(|v| v.get("func_urn").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Invoked function URNs with the request bodies they received.
    pub fn invocations(&self) -> Vec<(String, Value)> {
        self.lock().invocations.clone()
    }

    pub fn transfers(&self) -> Vec<Value> {
        self.lock().transfers.clone()
    }

    pub fn l7_policies_of(&self, listener_id: &str) -> Vec<Value> {
        self.lock().l7_policies.get(listener_id).cloned().unwrap_or_default()
    }

    pub fn logtanks_of(&self, topic_urn: &str) -> Vec<Value> {
        self.lock().logtanks.get(topic_urn).cloned().unwrap_or_default()
    }

    pub fn access_policy_of(&self, topic_urn: &str) -> Option<String> {
        self.lock().access_policies.get(topic_urn).cloned()
    }

    // ── Internals ────────────────────────────────────────────────────────────

    /// Record a call and apply any injected failure for it.
    fn enter(&self, service: &str, operation: &str, target: &str) -> CirrusResult<MutexGuard<'_, CloudState>> {
        let mut state = self.lock();
        state.calls.push(ServiceCall {
            service: service.to_string(),
            operation: operation.to_string(),
            target: target.to_string(),
        });
        debug!(service, operation, target, "sandbox call");

        let failing = [target, ANY_TARGET]
            .iter()
            .any(|t| state.failures.contains(&(operation.to_string(), t.to_string())));
        if failing {
            return Err(CirrusError::service(service, operation, format!("injected failure for '{target}'")));
        }
        Ok(state)
    }

    fn remove(
        &self,
        service: &str,
        operation: &str,
        resource_type: ResourceType,
        urn_field: &str,
        target: &str,
    ) -> CirrusResult<()> {
        let mut state = self.enter(service, operation, target)?;
        let stored = state.resources.entry(resource_type).or_default();
        let before = stored.len();
        stored.retain(|r| !addressed_by(r, urn_field, target));
        if stored.len() == before {
            return Err(CirrusError::service(service, operation, format!("'{target}' not found")));
        }
        Ok(())
    }

    /// Apply `update` to the stored record addressed by `target`.
    fn update_resource<F>(
        &self,
        service: &str,
        operation: &str,
        resource_type: ResourceType,
        target: &str,
        update: F,
    ) -> CirrusResult<()>
    where
        F: FnOnce(&mut Resource),
    {
        let mut state = self.enter(service, operation, target)?;
        let resource = state
            .resources
            .entry(resource_type)
            .or_default()
            .iter_mut()
            .find(|r| r.id() == target)
            .ok_or_else(|| CirrusError::service(service, operation, format!("'{target}' not found")))?;
        update(resource);
        Ok(())
    }

    fn tag_type(tag_resource_type: &str) -> CirrusResult<ResourceType> {
        ResourceType::ALL
            .into_iter()
            .find(|rt| rt.tag_resource_type() == Some(tag_resource_type))
            .ok_or_else(|| {
                CirrusError::service("tms", "tags", format!("unknown tag resource type '{tag_resource_type}'"))
            })
    }

    fn write_tags<F>(
        &self,
        operation: &str,
        tag_resource_type: &str,
        resource_ids: &[String],
        mut apply: F,
    ) -> CirrusResult<Vec<FailedResource>>
    where
        F: FnMut(&mut TagSet),
    {
        let resource_type = Self::tag_type(tag_resource_type)?;
        let mut state = self.enter("tms", operation, &resource_ids.join(","))?;
        let rejected = state.rejected_tag_targets.clone();
        let stored = state.resources.entry(resource_type).or_default();

        let mut failed = Vec::new();
        for id in resource_ids {
            if rejected.contains(id) {
                failed.push(FailedResource {
                    id: id.clone(),
                    reason: "tag quota exceeded".to_string(),
                });
                continue;
            }
            let Some(resource) = stored.iter_mut().find(|r| r.id() == id) else {
                failed.push(FailedResource {
                    id: id.clone(),
                    reason: "resource not found".to_string(),
                });
                continue;
            };
            let mut tags = resource_tags(resource);
            apply(&mut tags);
            resource.set("tags", tags.to_value());
        }
        Ok(failed)
    }
}

// ── Service implementations ──────────────────────────────────────────────────

impl ResourceSource for InMemoryCloud {
    fn list(&self, resource_type: ResourceType) -> CirrusResult<Vec<Resource>> {
        let state = self.enter("resources", "list", resource_type.name())?;
        Ok(state.resources.get(&resource_type).cloned().unwrap_or_default())
    }
}

impl TagService for InMemoryCloud {
    fn create_tags(
        &self,
        tag_resource_type: &str,
        resource_ids: &[String],
        tags: &TagSet,
    ) -> CirrusResult<Vec<FailedResource>> {
        self.write_tags("create_tags", tag_resource_type, resource_ids, |current| {
            for (key, value) in tags.iter() {
                current.insert(key, value);
            }
        })
    }

    fn delete_tags(
        &self,
        tag_resource_type: &str,
        resource_ids: &[String],
        keys: &[String],
    ) -> CirrusResult<Vec<FailedResource>> {
        self.write_tags("delete_tags", tag_resource_type, resource_ids, |current| {
            *current = current
                .iter()
                .filter(|(k, _)| !keys.iter().any(|key| key == k))
                .collect();
        })
    }
}

impl NetworkService for InMemoryCloud {
    fn subnets(&self, ids: &[String]) -> CirrusResult<Vec<Resource>> {
        let state = self.enter("vpc", "subnets", &ids.join(","))?;
        Ok(state
            .subnets
            .iter()
            .filter(|s| ids.iter().any(|id| id == s.id()))
            .cloned()
            .collect())
    }

    fn security_groups(&self, ids: &[String]) -> CirrusResult<Vec<Resource>> {
        let state = self.enter("vpc", "security_groups", &ids.join(","))?;
        Ok(state
            .security_groups
            .iter()
            .filter(|s| ids.iter().any(|id| id == s.id()))
            .cloned()
            .collect())
    }
}

impl LoadBalancerService for InMemoryCloud {
    fn member_count(&self, loadbalancer_id: &str) -> CirrusResult<usize> {
        let state = self.enter("elb", "member_count", loadbalancer_id)?;
        Ok(state.members.get(loadbalancer_id).copied().unwrap_or_default())
    }

    fn delete_loadbalancer_cascade(&self, loadbalancer_id: &str) -> CirrusResult<()> {
        self.remove("elb", "delete_loadbalancer_cascade", ResourceType::ElbLoadbalancer, "id", loadbalancer_id)
    }

    fn remove_ipv6_bandwidth(&self, loadbalancer_id: &str) -> CirrusResult<()> {
        self.enter("elb", "remove_ipv6_bandwidth", loadbalancer_id).map(drop)
    }

    fn disassociate_publicip(&self, publicip_id: &str) -> CirrusResult<()> {
        self.enter("eip", "disassociate_publicip", publicip_id).map(drop)
    }

    fn disassociate_global_eip(&self, global_eip_id: &str) -> CirrusResult<()> {
        self.enter("geip", "disassociate_global_eip", global_eip_id).map(drop)
    }

    fn delete_pool_cascade(&self, pool_id: &str) -> CirrusResult<()> {
        self.enter("elb", "delete_pool_cascade", pool_id).map(drop)
    }

    fn delete_listener_force(&self, listener_id: &str) -> CirrusResult<()> {
        self.remove("elb", "delete_listener_force", ResourceType::ElbListener, "id", listener_id)
    }

    fn create_logtank(&self, loadbalancer_id: &str, log_group_id: &str, log_topic_id: &str) -> CirrusResult<()> {
        self.update_resource("elb", "create_logtank", ResourceType::ElbLoadbalancer, loadbalancer_id, |lb| {
            lb.set("log_group_id", Value::from(log_group_id));
            lb.set("log_topic_id", Value::from(log_topic_id));
        })
    }

    fn list_ip_groups(&self) -> CirrusResult<Vec<Value>> {
        let state = self.enter("elb", "list_ip_groups", ANY_TARGET)?;
        Ok(state.ip_groups.clone())
    }

    fn update_listener_ipgroup(&self, listener_id: &str, ipgroup: &ListenerIpGroup) -> CirrusResult<()> {
        let binding = json!({
            "ipgroup_id": ipgroup.ipgroup_ids.join(","),
            "enable_ipgroup": ipgroup.enabled,
            "type": ipgroup.group_type.as_str(),
        });
        self.update_resource("elb", "update_listener_ipgroup", ResourceType::ElbListener, listener_id, |l| {
            l.set("ipgroup", binding)
        })
    }

    fn list_l7_policies(&self, listener_id: &str) -> CirrusResult<Vec<Value>> {
        let state = self.enter("elb", "list_l7_policies", listener_id)?;
        Ok(state.l7_policies.get(listener_id).cloned().unwrap_or_default())
    }

    fn create_redirect_policy(&self, listener_id: &str, redirect_listener_id: &str) -> CirrusResult<()> {
        let mut state = self.enter("elb", "create_redirect_policy", listener_id)?;
        let policies = state.l7_policies.entry(listener_id.to_string()).or_default();
        let id = format!("l7-{listener_id}-{}", policies.len() + 1);
        policies.push(json!({
            "id": id,
            "action": "REDIRECT_TO_LISTENER",
            "listener_id": listener_id,
            "redirect_listener_id": redirect_listener_id,
        }));
        Ok(())
    }
}

impl LogService for InMemoryCloud {
    fn list_log_groups(&self) -> CirrusResult<Vec<Value>> {
        let state = self.enter("lts", "list_log_groups", ANY_TARGET)?;
        Ok(state.log_groups.clone())
    }

    fn list_log_streams(&self, log_group_id: &str) -> CirrusResult<Vec<Value>> {
        let state = self.enter("lts", "list_log_streams", log_group_id)?;
        Ok(state.log_streams.get(log_group_id).cloned().unwrap_or_default())
    }

    fn list_transfers(&self) -> CirrusResult<Vec<Value>> {
        let state = self.enter("lts", "list_transfers", ANY_TARGET)?;
        Ok(state.transfers.clone())
    }

    fn create_transfer(&self, transfer: &Value) -> CirrusResult<()> {
        let target = transfer
            .get("log_group_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let mut state = self.enter("lts", "create_transfer", &target)?;
        state.transfers.push(transfer.clone());
        Ok(())
    }
}

impl FunctionService for InMemoryCloud {
    fn list_triggers(&self, func_urn: &str) -> CirrusResult<Option<Vec<Value>>> {
        let state = self.enter("functiongraph", "list_triggers", func_urn)?;
        Ok(state.triggers.get(func_urn).cloned().unwrap_or(Some(Vec::new())))
    }

    fn delete_function(&self, func_urn: &str) -> CirrusResult<()> {
        let mut state = self.enter("functiongraph", "delete_function", func_urn)?;
        let unqualified = |urn: &str| urn.strip_suffix(":latest").unwrap_or(urn).to_string();
        let stored = state.resources.entry(ResourceType::Functiongraph).or_default();
        stored.retain(|f| {
            f.id() != func_urn && f.str_field("func_urn").map(unqualified).as_deref() != Some(func_urn)
        });
        for versions in state.versions.values_mut() {
            versions.retain(|v| v.get("func_urn").and_then(Value::as_str) != Some(func_urn));
        }
        Ok(())
    }

    fn update_max_instances(&self, func_urn: &str, max_instances: i64) -> CirrusResult<()> {
        let mut state = self.enter("functiongraph", "update_max_instances", func_urn)?;
        if let Some(function) = state
            .resources
            .entry(ResourceType::Functiongraph)
            .or_default()
            .iter_mut()
            .find(|f| addressed_by(f, "func_urn", func_urn))
        {
            function.set("max_instance_num", Value::from(max_instances));
        }
        Ok(())
    }

    fn show_function_config(&self, func_urn: &str) -> CirrusResult<Value> {
        let state = self.enter("functiongraph", "show_function_config", func_urn)?;
        state.function_configs.get(func_urn).cloned().ok_or_else(|| {
            CirrusError::service("functiongraph", "show_function_config", format!("'{func_urn}' not found"))
        })
    }

    fn update_function_config(&self, func_urn: &str, config: &Value) -> CirrusResult<()> {
        let mut state = self.enter("functiongraph", "update_function_config", func_urn)?;
        let stored = state.function_configs.entry(func_urn.to_string()).or_insert(Value::Null);
        match (stored, config) {
            (Value::Object(current), Value::Object(update)) => {
                current.extend(update.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            (stored, update) => *stored = update.clone(),
        }
        Ok(())
    }

    fn list_reserved_instances(&self, func_urn: &str) -> CirrusResult<Vec<Value>> {
        let state = self.enter("functiongraph", "list_reserved_instances", func_urn)?;
        Ok(state.reserved_instances.get(func_urn).cloned().unwrap_or_default())
    }

    fn list_versions(&self, func_urn: &str) -> CirrusResult<Vec<Value>> {
        let state = self.enter("functiongraph", "list_versions", func_urn)?;
        Ok(state.versions.get(func_urn).cloned().unwrap_or_default())
    }

    fn list_aliases(&self, func_urn: &str) -> CirrusResult<Vec<Value>> {
        let state = self.enter("functiongraph", "list_aliases", func_urn)?;
        Ok(state.aliases.get(func_urn).cloned().unwrap_or_default())
    }

    fn invoke(&self, func_urn: &str, invocation: &Invocation) -> CirrusResult<Value> {
        let mut state = self.enter("functiongraph", "invoke", func_urn)?;
        state.invocations.push((func_urn.to_string(), invocation.body.clone()));
        let request_id = format!("req-{:04}", state.invocations.len());
        Ok(if invocation.asynchronous {
            json!({"request_id": request_id})
        } else {
            json!({"request_id": request_id, "status": 200, "result": "ok"})
        })
    }
}

impl NotificationService for InMemoryCloud {
    fn publish(&self, topic_urn: &str, subject: Option<&str>, body: MessageBody<'_>) -> CirrusResult<String> {
        let mut state = self.enter("smn", "publish", topic_urn)?;
        let message_id = format!("msg-{:04}", state.published.len() + 1);
        let (message, template_name, structured) = match body {
            MessageBody::Text(text) => (text.to_string(), None, false),
            MessageBody::Structure(document) => (document.to_string(), None, true),
            MessageBody::Template { name, variables } => {
                (Value::Object(variables.clone()).to_string(), Some(name.to_string()), false)
            }
        };
        state.published.push(PublishedMessage {
            topic_urn: topic_urn.to_string(),
            subject: subject.map(str::to_string),
            message,
            message_id: message_id.clone(),
            template_name,
            structured,
        });
        Ok(message_id)
    }

    fn delete_topic(&self, topic_urn: &str) -> CirrusResult<()> {
        self.remove("smn", "delete_topic", ResourceType::SmnTopic, "topic_urn", topic_urn)
    }

    fn list_logtanks(&self, topic_urn: &str) -> CirrusResult<Vec<Value>> {
        let state = self.enter("smn", "list_logtanks", topic_urn)?;
        Ok(state.logtanks.get(topic_urn).cloned().unwrap_or_default())
    }

    fn create_logtank(&self, topic_urn: &str, log_group_id: &str, log_stream_id: &str) -> CirrusResult<()> {
        let mut state = self.enter("smn", "create_logtank", topic_urn)?;
        let logtanks = state.logtanks.entry(topic_urn.to_string()).or_default();
        let id = format!("lts-{}", logtanks.len() + 1);
        logtanks.push(json!({"id": id, "log_group_id": log_group_id, "log_stream_id": log_stream_id}));
        Ok(())
    }

    fn delete_logtank(&self, topic_urn: &str, logtank_id: &str) -> CirrusResult<()> {
        let mut state = self.enter("smn", "delete_logtank", topic_urn)?;
        let logtanks = state.logtanks.entry(topic_urn.to_string()).or_default();
        let before = logtanks.len();
        logtanks.retain(|l| l.get("id").and_then(Value::as_str) != Some(logtank_id));
        if logtanks.len() == before {
            return Err(CirrusError::service("smn", "delete_logtank", format!("'{logtank_id}' not found")));
        }
        Ok(())
    }

    fn access_policy(&self, topic_urn: &str) -> CirrusResult<Option<String>> {
        let state = self.enter("smn", "access_policy", topic_urn)?;
        Ok(state.access_policies.get(topic_urn).cloned())
    }

    fn update_access_policy(&self, topic_urn: &str, policy: Option<&str>) -> CirrusResult<()> {
        let mut state = self.enter("smn", "update_access_policy", topic_urn)?;
        match policy {
            Some(policy) => state.access_policies.insert(topic_urn.to_string(), policy.to_string()),
            None => state.access_policies.remove(topic_urn),
        };
        Ok(())
    }

    fn delete_topic_attributes(&self, topic_urn: &str) -> CirrusResult<()> {
        let mut state = self.enter("smn", "delete_topic_attributes", topic_urn)?;
        state.access_policies.remove(topic_urn);
        Ok(())
    }
}

impl CloudServices for InMemoryCloud {
    fn region(&self) -> &str {
        &self.region
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

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud() -> InMemoryCloud {
        InMemoryCloud::new("cn-north-4").with_resources(
            ResourceType::SmnTopic,
            vec![
                json!({"id": "t-1", "topic_urn": "urn:smn:t-1", "tags": ["Env=prod"]}),
                json!({"id": "t-2", "topic_urn": "urn:smn:t-2"}),
            ],
        )
    }

    #[test]
    fn tag_writes_update_stored_resources() {
        let cloud = cloud();
        let tags: TagSet = [("Owner", "alice")].into_iter().collect();
        let ids = vec!["t-1".to_string(), "t-2".to_string()];
        let failed = cloud.create_tags("smn_topic", &ids, &tags).unwrap();
        assert!(failed.is_empty());

        let t1 = cloud.tags_of(ResourceType::SmnTopic, "t-1").unwrap();
        assert_eq!(t1.get("Owner"), Some("alice"));
        assert_eq!(t1.get("Env"), Some("prod"));

        cloud.delete_tags("smn_topic", &ids[..1], &["Env".to_string()]).unwrap();
        assert!(!cloud.tags_of(ResourceType::SmnTopic, "t-1").unwrap().contains_key("Env"));
    }

    #[test]
    fn rejected_and_unknown_ids_are_reported_per_resource() {
        let cloud = cloud();
        cloud.reject_tags_for("t-2");
        let tags: TagSet = [("Owner", "alice")].into_iter().collect();
        let ids = vec!["t-2".to_string(), "t-9".to_string(), "t-1".to_string()];
        let failed = cloud.create_tags("smn_topic", &ids, &tags).unwrap();
        let failed_ids: Vec<&str> = failed.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(failed_ids, ["t-2", "t-9"]);
    }

    #[test]
    fn injected_failures_are_scoped_by_target() {
        let cloud = cloud();
        cloud.fail_on("delete_topic", "urn:smn:t-1");
        assert!(cloud.delete_topic("urn:smn:t-1").is_err());
        cloud.delete_topic("urn:smn:t-2").unwrap();
        assert!(cloud.resource(ResourceType::SmnTopic, "t-2").is_none());

        cloud.fail_on("list", ANY_TARGET);
        assert!(cloud.list(ResourceType::SmnTopic).is_err());
        assert_eq!(cloud.calls_to("delete_topic").len(), 2);
    }

    #[test]
    fn fixture_parses_and_rejects_unknown_keys() {
        let fixture = Fixture::from_json_str(
            r#"{"resources": {"elb-loadbalancer": [{"id": "lb-1"}]}, "members": {"lb-1": 2}}"#,
        )
        .unwrap();
        let cloud = InMemoryCloud::from_fixture(fixture).unwrap();
        assert_eq!(cloud.list(ResourceType::ElbLoadbalancer).unwrap().len(), 1);
        assert_eq!(cloud.member_count("lb-1").unwrap(), 2);

        assert!(Fixture::from_json_str(r#"{"buckets": []}"#).is_err());
        let unknown = Fixture::from_json_str(r#"{"resources": {"ecs": []}}"#).unwrap();
        assert!(InMemoryCloud::from_fixture(unknown).is_err());
    }

    #[test]
    fn function_config_updates_merge() {
        let cloud = InMemoryCloud::new("cn-north-4")
            .with_function_config("urn:f", json!({"timeout": 3, "runtime": "Python3.9"}));
        cloud.update_function_config("urn:f", &json!({"timeout": 30})).unwrap();
        let config = cloud.function_config("urn:f").unwrap();
        assert_eq!(config["timeout"], 30);
        assert_eq!(config["runtime"], "Python3.9");
    }

    #[test]
    fn logtank_bindings_are_created_and_deleted() {
        let cloud = cloud();
        NotificationService::create_logtank(&cloud, "urn:smn:t-1", "lg-1", "ls-1").unwrap();
        assert_eq!(cloud.logtanks_of("urn:smn:t-1")[0]["id"], "lts-1");
        cloud.delete_logtank("urn:smn:t-1", "lts-1").unwrap();
        assert!(cloud.logtanks_of("urn:smn:t-1").is_empty());
        assert!(cloud.delete_logtank("urn:smn:t-1", "lts-1").is_err());
    }

    #[test]
    fn deleting_a_version_drops_only_that_version() {
        let cloud = InMemoryCloud::new("cn-north-4").with_versions(
            "urn:f",
            vec![json!({"func_urn": "urn:f:latest"}), json!({"func_urn": "urn:f:1"})],
            vec![],
        );
        cloud.delete_function("urn:f:1").unwrap();
        assert_eq!(cloud.versions_of("urn:f"), vec!["urn:f:latest"]);
    }

    #[test]
    fn template_messages_keep_their_variables() {
        let cloud = cloud();
        let variables = json!({"name": "orders"}).as_object().cloned().unwrap();
        cloud
            .publish("urn:smn:t-1", None, MessageBody::Template { name: "weekly", variables: &variables })
            .unwrap();
        let published = cloud.published();
        assert_eq!(published[0].template_name.as_deref(), Some("weekly"));
        assert_eq!(published[0].message, r#"{"name":"orders"}"#);
    }

    #[test]
    fn unknown_function_has_empty_triggers() {
        let cloud = InMemoryCloud::new("cn-north-4").with_triggers("urn:f-none", None);
        assert_eq!(cloud.list_triggers("urn:f-other").unwrap(), Some(vec![]));
        assert_eq!(cloud.list_triggers("urn:f-none").unwrap(), None);
    }
}
