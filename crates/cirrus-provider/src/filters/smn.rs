//! Notification topic filters: logtank bindings and access policy grants.
//!
//! Both filters cache what they fetch on the resource (`lts`,
//! `access_policy`) so a later filter or a second pass does not call the
//! service again. A topic whose lookup fails is logged and dropped; the
//! remaining topics are still evaluated.

use serde_json::{json, Value};
use tracing::{debug, warn};

use cirrus_contracts::{
    error::{CirrusError, CirrusResult},
    resource::Resource,
};
use cirrus_core::{context::RunContext, schema::type_schema, traits::Filter};

use super::{opt_bool, opt_str};
use crate::registry::BuildContext;

const LTS_FIELD: &str = "lts";
const ACCESS_POLICY_FIELD: &str = "access_policy";

fn topic_urn(topic: &Resource) -> &str {
    topic.str_field("topic_urn").unwrap_or_else(|| topic.id())
}

/// Run `check` on every topic, dropping topics whose check failed.
fn keep_checked<F>(filter: &str, resources: Vec<Resource>, mut check: F) -> Vec<Resource>
where
    F: FnMut(&mut Resource) -> CirrusResult<bool>,
{
    let mut kept = Vec::new();
    for mut topic in resources {
        match check(&mut topic) {
            Ok(true) => kept.push(topic),
            Ok(false) => {}
            Err(e) => warn!(
                filter,
                resource_id = %topic.id(),
                error = %e,
                "topic lookup failed, skipping resource"
            ),
        }
    }
    kept
}

// ── topic-lts ────────────────────────────────────────────────────────────────

pub fn topic_lts_schema() -> Value {
    type_schema("topic-lts", json!({"enabled": {"type": "boolean"}}), &[])
}

pub fn build_topic_lts(options: &Value, _ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Filter>> {
    Ok(Box::new(TopicLts {
        enabled: opt_bool(options, "enabled", true),
    }))
}

struct TopicLts {
    enabled: bool,
}

impl Filter for TopicLts {
    fn name(&self) -> &str {
        "topic-lts"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: Vec<Resource>) -> CirrusResult<Vec<Resource>> {
        Ok(keep_checked(self.name(), resources, |topic| {
            let bound = match topic.get(LTS_FIELD).and_then(Value::as_array) {
                Some(logtanks) => !logtanks.is_empty(),
                None => {
                    let logtanks = ctx.services.notifications().list_logtanks(topic_urn(topic))?;
                    debug!(resource_id = %topic.id(), count = logtanks.len(), "queried topic logtanks");
                    let bound = !logtanks.is_empty();
                    topic.set(LTS_FIELD, Value::Array(logtanks));
                    bound
                }
            };
            Ok(bound == self.enabled)
        }))
    }
}

// ── topic-access ─────────────────────────────────────────────────────────────

pub fn topic_access_schema() -> Value {
    type_schema(
        "topic-access",
        json!({
            "effect": {"enum": ["Allow", "Deny"]},
            "user": {"type": "string"},
            "organization": {"type": "string"},
            "service": {"type": "string"},
        }),
        &[],
    )
}

pub fn build_topic_access(options: &Value, _ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Filter>> {
    let non_empty = |key| opt_str(options, key).filter(|s| !s.is_empty()).map(str::to_string);
    Ok(Box::new(TopicAccess {
        effect: opt_str(options, "effect").unwrap_or("Allow").to_string(),
        user: non_empty("user"),
        organization: non_empty("organization"),
        service: non_empty("service"),
    }))
}

/// Every configured criterion must be granted by some statement with the
/// configured effect. Unset criteria always pass.
#[derive(Debug)]
struct TopicAccess {
    effect: String,
    user: Option<String>,
    organization: Option<String>,
    service: Option<String>,
}

impl TopicAccess {
    fn grants(&self, policy: Option<&str>) -> CirrusResult<bool> {
        if self.user.is_none() && self.organization.is_none() && self.service.is_none() {
            return Ok(true);
        }
        let Some(raw) = policy.filter(|p| !p.is_empty()) else {
            return Ok(false);
        };
        let document: Value = serde_json::from_str(raw).map_err(|e| CirrusError::Execution {
            reason: format!("access policy is not valid JSON: {e}"),
        })?;
        let statements: Vec<&Value> = document
            .get("Statement")
            .and_then(Value::as_array)
            .map(|all| {
                all.iter()
                    .filter(|st| st.get("Effect").and_then(Value::as_str) == Some(self.effect.as_str()))
                    .collect()
            })
            .unwrap_or_default();

        let granted = |field: &str, needle: &str| {
            statements
                .iter()
                .any(|st| principal_contains(st.get("Principal").and_then(|p| p.get(field)), needle))
        };

        let user_ok = self.user.as_deref().map_or(true, |user| {
            if user == "*" {
                granted("CSP", "*")
            } else {
                granted("CSP", &format!("urn:csp:iam::{user}:root"))
            }
        });
        let org_ok = self
            .organization
            .as_deref()
            .map_or(true, |org| granted("OrgPath", org));
        let service_ok = self
            .service
            .as_deref()
            .map_or(true, |service| granted("Service", service));
        Ok(user_ok && org_ok && service_ok)
    }
}

/// Principal entries may be a single string or a list of strings.
fn principal_contains(entry: Option<&Value>, needle: &str) -> bool {
    match entry {
        Some(Value::String(s)) => s.contains(needle),
        Some(Value::Array(items)) => items.iter().any(|i| i.as_str() == Some(needle)),
        _ => false,
    }
}

impl Filter for TopicAccess {
    fn name(&self) -> &str {
        "topic-access"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: Vec<Resource>) -> CirrusResult<Vec<Resource>> {
        Ok(keep_checked(self.name(), resources, |topic| {
            let policy = match topic.str_field(ACCESS_POLICY_FIELD) {
                Some(cached) => Some(cached.to_string()),
                None => {
                    let fetched = ctx.services.notifications().access_policy(topic_urn(topic))?;
                    debug!(resource_id = %topic.id(), "queried topic access policy");
                    if let Some(p) = &fetched {
                        topic.set(ACCESS_POLICY_FIELD, Value::String(p.clone()));
                    }
                    fetched
                }
            };
            self.grants(policy.as_deref())
        }))
    }
}
