//! Load balancer and listener filters: public IP and backend member counts,
//! access logging and its transfer jobs, HTTPS redirection.

use std::collections::HashSet;

use serde_json::{json, Value};
use tracing::debug;

use cirrus_contracts::{
    error::CirrusResult,
    resource::{Resource, ResourceType},
};
use cirrus_core::{
    context::RunContext,
    schema::{comparison_operators, type_schema},
    traits::Filter,
    value_filter::Op,
};

use super::{opt_f64, opt_str, predicate};
use crate::registry::BuildContext;

fn count_schema(name: &str) -> Value {
    type_schema(
        name,
        json!({
            "count": {"type": "integer", "minimum": 0},
            "op": comparison_operators(),
        }),
        &[],
    )
}

fn count_options(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<(Op, f64)> {
    let op = Op::from_options(options, Op::Gte).map_err(|e| ctx.reject(e.reason()))?;
    Ok((op, opt_f64(options, "count", 0.0)))
}

// ── publicip-count ───────────────────────────────────────────────────────────

pub fn publicip_count_schema() -> Value {
    count_schema("publicip-count")
}

pub fn build_publicip_count(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Filter>> {
    let (op, count) = count_options(options, ctx)?;
    Ok(predicate("publicip-count", move |r| {
        op.compare_numbers(publicip_count(r) as f64, count)
    }))
}

/// IPv4 EIPs, IPv6 bandwidth bindings and global EIPs bound to the load balancer.
pub(crate) fn publicip_count(resource: &Resource) -> usize {
    ["eips", "ipv6_bandwidth", "global_eips"]
        .iter()
        .map(|field| match resource.get(field) {
            Some(Value::Array(items)) => items.len(),
            Some(Value::Object(map)) if !map.is_empty() => 1,
            _ => 0,
        })
        .sum()
}

// ── backend-server-count ─────────────────────────────────────────────────────

pub fn backend_server_count_schema() -> Value {
    count_schema("backend-server-count")
}

pub fn build_backend_server_count(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Filter>> {
    let (op, count) = count_options(options, ctx)?;
    Ok(Box::new(BackendServerCount { op, count }))
}

struct BackendServerCount {
    op: Op,
    count: f64,
}

impl Filter for BackendServerCount {
    fn name(&self) -> &str {
        "backend-server-count"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: Vec<Resource>) -> CirrusResult<Vec<Resource>> {
        let mut kept = Vec::with_capacity(resources.len());
        for resource in resources {
            let members = ctx.services.load_balancers().member_count(resource.id())?;
            debug!(
                filter = self.name(),
                resource_id = %resource.id(),
                members,
                "queried load balancer members"
            );
            if self.op.compare_numbers(members as f64, self.count) {
                kept.push(resource);
            }
        }
        Ok(kept)
    }
}

// ── is-logging / is-not-logging ──────────────────────────────────────────────

pub fn is_logging_schema() -> Value {
    type_schema("is-logging", json!({}), &[])
}

pub fn build_is_logging(_options: &Value, _ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Filter>> {
    Ok(predicate("is-logging", is_logging))
}

pub fn is_not_logging_schema() -> Value {
    type_schema("is-not-logging", json!({}), &[])
}

pub fn build_is_not_logging(_options: &Value, _ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Filter>> {
    Ok(predicate("is-not-logging", |r| !is_logging(r)))
}

/// Access logging is on when both the log group and the log topic are set.
pub(crate) fn is_logging(resource: &Resource) -> bool {
    let set = |field| {
        resource
            .str_field(field)
            .is_some_and(|v| !v.trim().is_empty())
    };
    set("log_group_id") && set("log_topic_id")
}

// ── is-lts-log-transfer / is-not-lts-log-transfer ────────────────────────────

pub fn is_lts_log_transfer_schema() -> Value {
    type_schema("is-lts-log-transfer", json!({}), &[])
}

pub fn build_is_lts_log_transfer(_options: &Value, _ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Filter>> {
    Ok(Box::new(LogTransfer { transferred: true }))
}

pub fn is_not_lts_log_transfer_schema() -> Value {
    type_schema("is-not-lts-log-transfer", json!({}), &[])
}

pub fn build_is_not_lts_log_transfer(_options: &Value, _ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Filter>> {
    Ok(Box::new(LogTransfer { transferred: false }))
}

/// Logging load balancers whose log stream is (or is not) the source of a
/// log transfer job. The negated form keeps every load balancer the
/// positive form drops, non-logging ones included.
struct LogTransfer {
    transferred: bool,
}

/// Stream ids that feed at least one transfer job.
fn transferred_streams(transfers: &[Value]) -> HashSet<String> {
    transfers
        .iter()
        .filter_map(|t| t.get("log_streams").and_then(Value::as_array))
        .flatten()
        .filter_map(|s| s.get("log_stream_id").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

impl Filter for LogTransfer {
    fn name(&self) -> &str {
        if self.transferred {
            "is-lts-log-transfer"
        } else {
            "is-not-lts-log-transfer"
        }
    }

    fn process(&self, ctx: &RunContext<'_>, resources: Vec<Resource>) -> CirrusResult<Vec<Resource>> {
        let mut streams: Option<HashSet<String>> = None;
        let mut kept = Vec::with_capacity(resources.len());
        for resource in resources {
            let transferred = if is_logging(&resource) {
                if streams.is_none() {
                    let transfers = ctx.services.logs().list_transfers()?;
                    debug!(filter = self.name(), transfers = transfers.len(), "queried log transfers");
                    streams = Some(transferred_streams(&transfers));
                }
                let topic = resource.str_field("log_topic_id").unwrap_or_default();
                streams.as_ref().is_some_and(|s| s.contains(topic))
            } else {
                false
            };
            if transferred == self.transferred {
                kept.push(resource);
            }
        }
        Ok(kept)
    }
}

// ── is-redirect-to-https-listener ────────────────────────────────────────────

pub const REDIRECT_ACTION: &str = "REDIRECT_TO_LISTENER";

/// Which HTTPS listener a redirect must point at. Unset fields match any.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RedirectTarget {
    pub id: Option<String>,
    pub name: Option<String>,
    pub port: Option<f64>,
}

impl RedirectTarget {
    pub(crate) fn from_options(options: &Value) -> Self {
        let text = |key| opt_str(options, key).filter(|v| !v.is_empty()).map(str::to_string);
        Self {
            id: text("id"),
            name: text("name"),
            port: options.get("port").and_then(Value::as_f64),
        }
    }

    pub(crate) fn schema_properties() -> Value {
        json!({
            "id": {"type": "string"},
            "name": {"type": "string"},
            "port": {"type": "number", "minimum": 0},
        })
    }

    /// An HTTPS listener satisfying every set criterion.
    pub(crate) fn accepts(&self, listener: &Resource) -> bool {
        listener.str_field("protocol") == Some("HTTPS")
            && self.id.as_deref().map_or(true, |id| listener.id() == id)
            && self.name.as_deref().map_or(true, |name| listener.str_field("name") == Some(name))
            && self.port.map_or(true, |port| {
                listener.get("protocol_port").and_then(Value::as_f64) == Some(port)
            })
    }
}

pub fn is_redirect_to_https_schema() -> Value {
    type_schema("is-redirect-to-https-listener", RedirectTarget::schema_properties(), &[])
}

pub fn build_is_redirect_to_https(options: &Value, _ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Filter>> {
    Ok(Box::new(RedirectsToHttps {
        target: RedirectTarget::from_options(options),
    }))
}

/// HTTP listeners with a forwarding policy redirecting to a matching HTTPS
/// listener. Listeners of any other protocol never match.
struct RedirectsToHttps {
    target: RedirectTarget,
}

impl RedirectsToHttps {
    fn redirects(&self, policies: &[Value], listeners: &[Resource]) -> bool {
        policies
            .iter()
            .filter(|p| p.get("action").and_then(Value::as_str) == Some(REDIRECT_ACTION))
            .filter_map(|p| p.get("redirect_listener_id").and_then(Value::as_str))
            .filter_map(|id| listeners.iter().find(|l| l.id() == id))
            .any(|redirect| self.target.accepts(redirect))
    }
}

impl Filter for RedirectsToHttps {
    fn name(&self) -> &str {
        "is-redirect-to-https-listener"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: Vec<Resource>) -> CirrusResult<Vec<Resource>> {
        let mut listeners: Option<Vec<Resource>> = None;
        let mut kept = Vec::new();
        for listener in resources {
            if listener.str_field("protocol") != Some("HTTP") {
                continue;
            }
            let policies = ctx.services.load_balancers().list_l7_policies(listener.id())?;
            if policies.is_empty() {
                continue;
            }
            if listeners.is_none() {
                listeners = Some(ctx.services.resources().list(ResourceType::ElbListener)?);
            }
            if self.redirects(&policies, listeners.as_deref().unwrap_or_default()) {
                kept.push(listener);
            }
        }
        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn publicip_count_sums_every_binding_kind() {
        let r = Resource::from_value(json!({
            "id": "lb-1",
            "eips": [{"eip_id": "e-1", "ip_version": 4}, {"eip_id": "e-2", "ip_version": 6}],
            "ipv6_bandwidth": {"id": "bw-1"},
            "global_eips": [{"global_eip_id": "g-1"}]
        }));
        assert_eq!(publicip_count(&r), 4);
    }

    #[test]
    fn publicip_count_tolerates_missing_and_null_fields() {
        let r = Resource::from_value(json!({"id": "lb-1", "eips": null, "ipv6_bandwidth": {}}));
        assert_eq!(publicip_count(&r), 0);
    }

    #[test]
    fn logging_needs_group_and_topic() {
        let on = Resource::from_value(json!({"id": "a", "log_group_id": "g", "log_topic_id": "t"}));
        let half = Resource::from_value(json!({"id": "b", "log_group_id": "g", "log_topic_id": " "}));
        let off = Resource::from_value(json!({"id": "c"}));
        assert!(is_logging(&on));
        assert!(!is_logging(&half));
        assert!(!is_logging(&off));
    }

    #[test]
    fn transfer_streams_are_collected_across_jobs() {
        let transfers = vec![
            json!({"log_group_id": "lg-1", "log_streams": [{"log_stream_id": "lt-1"}, {"log_stream_id": "lt-2"}]}),
            json!({"log_group_id": "lg-2", "log_streams": []}),
            json!({"log_group_id": "lg-3"}),
        ];
        let streams = transferred_streams(&transfers);
        assert_eq!(streams.len(), 2);
        assert!(streams.contains("lt-2"));
    }

    fn listeners() -> Vec<Resource> {
        vec![
            Resource::from_value(json!({"id": "ls-443", "name": "secure", "protocol": "HTTPS", "protocol_port": 443})),
            Resource::from_value(json!({"id": "ls-8443", "name": "alt", "protocol": "HTTPS", "protocol_port": 8443})),
            Resource::from_value(json!({"id": "ls-81", "name": "plain", "protocol": "HTTP", "protocol_port": 81})),
        ]
    }

    fn redirect_to(id: &str) -> Vec<Value> {
        vec![json!({"id": "l7-1", "action": REDIRECT_ACTION, "redirect_listener_id": id})]
    }

    #[test]
    fn redirect_must_reach_an_https_listener() {
        let any = RedirectsToHttps {
            target: RedirectTarget::default(),
        };
        assert!(any.redirects(&redirect_to("ls-443"), &listeners()));
        assert!(!any.redirects(&redirect_to("ls-81"), &listeners()));
        assert!(!any.redirects(&redirect_to("ls-missing"), &listeners()));
    }

    #[test]
    fn redirect_target_criteria_narrow_the_match() {
        let by_port = RedirectsToHttps {
            target: RedirectTarget::from_options(&json!({"port": 8443})),
        };
        assert!(!by_port.redirects(&redirect_to("ls-443"), &listeners()));
        assert!(by_port.redirects(&redirect_to("ls-8443"), &listeners()));

        let forwarding = vec![json!({"action": "REDIRECT_TO_POOL", "redirect_listener_id": "ls-443"})];
        assert!(!by_port.redirects(&forwarding, &listeners()));
    }
}
