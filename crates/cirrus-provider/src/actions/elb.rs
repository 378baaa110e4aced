//! Load balancer and listener actions.

use std::collections::HashSet;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use cirrus_contracts::{
    error::{CirrusError, CirrusResult},
    report::ActionReport,
    resource::{Resource, ResourceType},
};
use cirrus_core::{
    context::RunContext,
    schema::type_schema,
    services::{IpGroupType, ListenerIpGroup},
    traits::Action,
};

use super::{per_resource, Step};
use crate::filters::elb::{is_logging, RedirectTarget};
use crate::options::{opt_bool, opt_f64, opt_str, opt_strings};
use crate::registry::BuildContext;

// ── delete (load balancer) ───────────────────────────────────────────────────

pub fn delete_loadbalancer_schema() -> Value {
    type_schema("delete", json!({}), &[])
}

pub fn build_delete_loadbalancer(_options: &Value, _ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    Ok(Box::new(DeleteLoadbalancer))
}

struct DeleteLoadbalancer;

impl Action for DeleteLoadbalancer {
    fn name(&self) -> &str {
        "delete"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        let service = ctx.services.load_balancers();
        per_resource(ctx, self.name(), resources, |lb| {
            service.delete_loadbalancer_cascade(lb.id())?;
            Ok(Step::Done)
        })
    }
}

// ── unbind-publicips ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PublicIpKind {
    Eip,
    Ipv6Bandwidth,
    GlobalEip,
}

impl PublicIpKind {
    const ALL: [PublicIpKind; 3] = [Self::Eip, Self::Ipv6Bandwidth, Self::GlobalEip];

    fn parse(name: &str) -> Option<Self> {
        match name {
            "eip" => Some(Self::Eip),
            "ipv6_bandwidth" => Some(Self::Ipv6Bandwidth),
            "global_eip" => Some(Self::GlobalEip),
            _ => None,
        }
    }
}

pub fn unbind_publicips_schema() -> Value {
    type_schema(
        "unbind-publicips",
        json!({
            "publicip_types": {
                "type": "array",
                "items": {"enum": ["eip", "ipv6_bandwidth", "global_eip"]},
            },
        }),
        &[],
    )
}

pub fn build_unbind_publicips(options: &Value, _ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    let kinds: Vec<PublicIpKind> = opt_strings(options, "publicip_types")
        .unwrap_or_default()
        .iter()
        .filter_map(|k| PublicIpKind::parse(k))
        .collect();
    Ok(Box::new(UnbindPublicips {
        kinds: if kinds.is_empty() { PublicIpKind::ALL.to_vec() } else { kinds },
    }))
}

struct UnbindPublicips {
    kinds: Vec<PublicIpKind>,
}

fn array<'a>(resource: &'a Resource, field: &str) -> &'a [Value] {
    resource
        .get(field)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

impl UnbindPublicips {
    fn unbind(&self, ctx: &RunContext<'_>, lb: &Resource) -> CirrusResult<Step> {
        let service = ctx.services.load_balancers();
        let eips = array(lb, "eips");
        let ip_version = |eip: &Value| eip.get("ip_version").and_then(Value::as_i64);
        let mut unbound = 0usize;

        if self.kinds.contains(&PublicIpKind::Ipv6Bandwidth) {
            for _ in eips.iter().filter(|e| ip_version(e) == Some(6)) {
                service.remove_ipv6_bandwidth(lb.id())?;
                unbound += 1;
            }
        }
        if self.kinds.contains(&PublicIpKind::Eip) {
            for eip in eips.iter().filter(|e| ip_version(e) == Some(4)) {
                if let Some(id) = eip.get("eip_id").and_then(Value::as_str) {
                    service.disassociate_publicip(id)?;
                    unbound += 1;
                }
            }
        }
        if self.kinds.contains(&PublicIpKind::GlobalEip) {
            for geip in array(lb, "global_eips") {
                if let Some(id) = geip.get("global_eip_id").and_then(Value::as_str) {
                    service.disassociate_global_eip(id)?;
                    unbound += 1;
                }
            }
        }

        info!(resource_id = %lb.id(), unbound, "public IPs unbound");
        Ok(Step::Done)
    }
}

impl Action for UnbindPublicips {
    fn name(&self) -> &str {
        "unbind-publicips"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        per_resource(ctx, self.name(), resources, |lb| self.unbind(ctx, lb))
    }
}

// ── delete (listener) ────────────────────────────────────────────────────────

pub fn delete_listener_schema() -> Value {
    type_schema(
        "delete",
        json!({"loadbalancers": {"type": "array", "items": {"type": "string"}}}),
        &[],
    )
}

pub fn build_delete_listener(options: &Value, _ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    Ok(Box::new(DeleteListener {
        loadbalancers: opt_strings(options, "loadbalancers").unwrap_or_default(),
    }))
}

struct DeleteListener {
    /// When set, only listeners of these load balancers are deleted.
    loadbalancers: Vec<String>,
}

impl DeleteListener {
    fn in_scope(&self, listener: &Resource) -> bool {
        if self.loadbalancers.is_empty() {
            return true;
        }
        let owner = listener
            .get("loadbalancers")
            .and_then(|lbs| lbs.get(0))
            .and_then(|lb| lb.get("id"))
            .and_then(Value::as_str);
        owner.is_some_and(|id| self.loadbalancers.iter().any(|lb| lb == id))
    }
}

impl Action for DeleteListener {
    fn name(&self) -> &str {
        "delete"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        let service = ctx.services.load_balancers();
        per_resource(ctx, self.name(), resources, |listener| {
            if !self.in_scope(listener) {
                return Ok(Step::Skipped);
            }
            if let Some(pool) = listener.str_field("default_pool_id").filter(|p| !p.is_empty()) {
                match service.delete_pool_cascade(pool) {
                    Ok(()) => info!(resource_id = %listener.id(), pool_id = pool, "default pool deleted"),
                    Err(e) => warn!(
                        resource_id = %listener.id(),
                        pool_id = pool,
                        error = %e,
                        "failed to delete default pool"
                    ),
                }
            }
            service.delete_listener_force(listener.id())?;
            Ok(Step::Done)
        })
    }
}

// ── enable-logging ───────────────────────────────────────────────────────────

pub fn enable_logging_schema() -> Value {
    type_schema(
        "enable-logging",
        json!({
            "log_group_id": {"type": "string"},
            "log_group_name": {"type": "string"},
            "log_topic_id": {"type": "string"},
            "log_topic_name": {"type": "string"},
        }),
        &[],
    )
}

/// A log group or stream named by id, by name, or by both.
#[derive(Debug, Clone, PartialEq)]
struct LogRef {
    id: Option<String>,
    name: Option<String>,
}

impl LogRef {
    fn from_options(options: &Value, id_key: &str, name_key: &str) -> Option<Self> {
        let text = |key: &str| opt_str(options, key).filter(|v| !v.is_empty()).map(str::to_string);
        let (id, name) = (text(id_key), text(name_key));
        (id.is_some() || name.is_some()).then_some(Self { id, name })
    }

    /// The id of the single entry this reference names. An id wins over a
    /// name, but a name given alongside must agree with it.
    fn resolve(&self, kind: &str, entries: &[Value], id_field: &str, name_field: &str) -> CirrusResult<String> {
        let field = |entry: &Value, key: &str| entry.get(key).and_then(Value::as_str).map(str::to_string);
        let found = match (&self.id, &self.name) {
            (Some(id), name) => {
                let entry = entries.iter().find(|e| field(e, id_field).as_deref() == Some(id.as_str()));
                if let (Some(entry), Some(name)) = (entry, name) {
                    if field(entry, name_field).as_deref() != Some(name.as_str()) {
                        return Err(CirrusError::Execution {
                            reason: format!("{kind} '{id}' is not named '{name}'"),
                        });
                    }
                }
                entry
            }
            (None, Some(name)) => entries.iter().find(|e| field(e, name_field).as_deref() == Some(name.as_str())),
            (None, None) => None,
        };
        found.and_then(|e| field(e, id_field)).ok_or_else(|| CirrusError::Execution {
            reason: format!("{kind} {self:?} not found"),
        })
    }
}

pub fn build_enable_logging(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    let group = LogRef::from_options(options, "log_group_id", "log_group_name")
        .ok_or_else(|| ctx.reject("enable-logging requires 'log_group_id' or 'log_group_name'"))?;
    let topic = LogRef::from_options(options, "log_topic_id", "log_topic_name")
        .ok_or_else(|| ctx.reject("enable-logging requires 'log_topic_id' or 'log_topic_name'"))?;
    Ok(Box::new(EnableLogging { group, topic }))
}

struct EnableLogging {
    group: LogRef,
    topic: LogRef,
}

impl Action for EnableLogging {
    fn name(&self) -> &str {
        "enable-logging"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        if resources.is_empty() {
            return Ok(ActionReport::new(self.name()));
        }
        let logs = ctx.services.logs();
        let group_id = self
            .group
            .resolve("log group", &logs.list_log_groups()?, "log_group_id", "log_group_name")?;
        let topic_id = self.topic.resolve(
            "log stream",
            &logs.list_log_streams(&group_id)?,
            "log_stream_id",
            "log_stream_name",
        )?;
        debug!(log_group_id = %group_id, log_topic_id = %topic_id, "resolved access log target");

        let service = ctx.services.load_balancers();
        per_resource(ctx, self.name(), resources, |lb| {
            service.create_logtank(lb.id(), &group_id, &topic_id)?;
            Ok(Step::Done)
        })
    }
}

// ── create-lts-log-transfer ──────────────────────────────────────────────────

pub fn create_log_transfer_schema() -> Value {
    type_schema(
        "create-lts-log-transfer",
        json!({
            "log_transfer_type": {"type": "string"},
            "log_transfer_mode": {"enum": ["cycle", "realTime"]},
            "log_transfer_status": {"enum": ["ENABLE", "DISABLE"]},
            "log_storage_format": {"enum": ["JSON", "RAW"]},
            "obs_period": {"type": "integer", "minimum": 1},
            "obs_period_unit": {"enum": ["min", "hour"]},
            "obs_bucket_name": {"type": "string"},
        }),
        &["obs_bucket_name"],
    )
}

pub fn build_create_log_transfer(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    let bucket = opt_str(options, "obs_bucket_name")
        .filter(|b| !b.is_empty())
        .ok_or_else(|| ctx.reject("create-lts-log-transfer requires 'obs_bucket_name'"))?;
    let text = |key: &str, default: &str| {
        opt_str(options, key)
            .filter(|v| !v.is_empty())
            .unwrap_or(default)
            .to_string()
    };
    let period = opt_f64(options, "obs_period", 0.0) as i64;
    Ok(Box::new(CreateLogTransfer {
        info: json!({
            "log_transfer_type": text("log_transfer_type", "OBS"),
            "log_transfer_mode": text("log_transfer_mode", "cycle"),
            "log_transfer_status": text("log_transfer_status", "ENABLE"),
            "log_storage_format": text("log_storage_format", "JSON"),
            "log_transfer_detail": {
                "obs_period": if period > 0 { period } else { 2 },
                "obs_period_unit": text("obs_period_unit", "min"),
                "obs_bucket_name": bucket,
            },
        }),
    }))
}

/// One transfer job per distinct access log stream.
struct CreateLogTransfer {
    info: Value,
}

impl CreateLogTransfer {
    fn transfer(&self, log_group_id: &str, log_stream_id: &str) -> Value {
        json!({
            "log_group_id": log_group_id,
            "log_streams": [{"log_stream_id": log_stream_id}],
            "log_transfer_info": self.info,
        })
    }
}

impl Action for CreateLogTransfer {
    fn name(&self) -> &str {
        "create-lts-log-transfer"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        let logs = ctx.services.logs();
        let mut created: HashSet<String> = HashSet::new();
        per_resource(ctx, self.name(), resources, |lb| {
            if !is_logging(lb) {
                return Ok(Step::Refused("access logging is not enabled".to_string()));
            }
            let group = lb.str_field("log_group_id").unwrap_or_default();
            let stream = lb.str_field("log_topic_id").unwrap_or_default();
            if created.insert(stream.to_string()) {
                logs.create_transfer(&self.transfer(group, stream))?;
            } else {
                debug!(resource_id = %lb.id(), log_topic_id = stream, "log stream already transferred this run");
            }
            Ok(Step::Done)
        })
    }
}

// ── set-acl-ipgroup ──────────────────────────────────────────────────────────

pub fn set_acl_ipgroup_schema() -> Value {
    type_schema(
        "set-acl-ipgroup",
        json!({
            "ipgroup_id": {"type": "array", "items": {"type": "string"}},
            "ipgroup_name": {"type": "array", "items": {"type": "string"}},
            "enable": {"type": "boolean"},
            "ipgroup_type": {"enum": ["white", "black"]},
        }),
        &["ipgroup_type"],
    )
}

pub fn build_set_acl_ipgroup(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    let ids = opt_strings(options, "ipgroup_id").unwrap_or_default();
    let names = opt_strings(options, "ipgroup_name").unwrap_or_default();
    if ids.is_empty() && names.is_empty() {
        return Err(ctx.reject("set-acl-ipgroup requires 'ipgroup_id' or 'ipgroup_name'"));
    }
    let group_type = match opt_str(options, "ipgroup_type") {
        Some("white") => IpGroupType::White,
        Some("black") => IpGroupType::Black,
        _ => return Err(ctx.reject("set-acl-ipgroup requires 'ipgroup_type' of white or black")),
    };
    Ok(Box::new(SetAclIpgroup {
        ids,
        names,
        enabled: opt_bool(options, "enable", true),
        group_type,
    }))
}

struct SetAclIpgroup {
    ids: Vec<String>,
    names: Vec<String>,
    enabled: bool,
    group_type: IpGroupType,
}

impl SetAclIpgroup {
    /// Ids of the IP groups named by id or by name, in listing order.
    fn selected(&self, groups: &[Value]) -> Vec<String> {
        let field = |g: &Value, key: &str| g.get(key).and_then(Value::as_str).map(str::to_string);
        groups
            .iter()
            .filter(|g| {
                field(g, "id").is_some_and(|id| self.ids.contains(&id))
                    || field(g, "name").is_some_and(|name| self.names.contains(&name))
            })
            .filter_map(|g| field(g, "id"))
            .collect()
    }
}

impl Action for SetAclIpgroup {
    fn name(&self) -> &str {
        "set-acl-ipgroup"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        if resources.is_empty() {
            return Ok(ActionReport::new(self.name()));
        }
        let service = ctx.services.load_balancers();
        let ipgroup_ids = self.selected(&service.list_ip_groups()?);
        if ipgroup_ids.is_empty() {
            return Err(CirrusError::Execution {
                reason: format!(
                    "set-acl-ipgroup: no IP group matches ids {:?} or names {:?}",
                    self.ids, self.names
                ),
            });
        }
        let binding = ListenerIpGroup {
            ipgroup_ids,
            enabled: self.enabled,
            group_type: self.group_type,
        };
        per_resource(ctx, self.name(), resources, |listener| {
            service.update_listener_ipgroup(listener.id(), &binding)?;
            Ok(Step::Done)
        })
    }
}

// ── redirect-to-https-listener ───────────────────────────────────────────────

pub fn redirect_to_https_schema() -> Value {
    type_schema("redirect-to-https-listener", RedirectTarget::schema_properties(), &[])
}

pub fn build_redirect_to_https(options: &Value, _ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    Ok(Box::new(RedirectToHttps {
        target: RedirectTarget::from_options(options),
    }))
}

/// Adds a redirect policy from each HTTP listener to the first HTTPS
/// listener matching the target. Other protocols are skipped.
struct RedirectToHttps {
    target: RedirectTarget,
}

impl Action for RedirectToHttps {
    fn name(&self) -> &str {
        "redirect-to-https-listener"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        let service = ctx.services.load_balancers();
        let mut candidates: Option<Vec<Resource>> = None;
        per_resource(ctx, self.name(), resources, |listener| {
            if listener.str_field("protocol") != Some("HTTP") {
                return Ok(Step::Skipped);
            }
            if candidates.is_none() {
                candidates = Some(ctx.services.resources().list(ResourceType::ElbListener)?);
            }
            let redirect = candidates
                .as_deref()
                .unwrap_or_default()
                .iter()
                .find(|l| self.target.accepts(l));
            let Some(redirect) = redirect else {
                return Ok(Step::Refused(format!("no HTTPS listener matches {:?}", self.target)));
            };
            service.create_redirect_policy(listener.id(), redirect.id())?;
            info!(resource_id = %listener.id(), redirect_listener_id = %redirect.id(), "redirect policy created");
            Ok(Step::Done)
        })
    }
}
