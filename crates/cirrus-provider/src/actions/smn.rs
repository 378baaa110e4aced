//! Notification topic actions: deletion, logtank bindings and access
//! policy remediation.

use serde_json::{json, Value};
use tracing::{debug, info};

use cirrus_contracts::{
    error::{CirrusError, CirrusResult},
    report::ActionReport,
    resource::Resource,
};
use cirrus_core::{context::RunContext, schema::type_schema, traits::Action};

use super::{per_resource, Step};
use crate::options::opt_str;
use crate::registry::BuildContext;

fn topic_urn(topic: &Resource) -> &str {
    topic.str_field("topic_urn").unwrap_or_else(|| topic.id())
}

fn required<'a>(options: &'a Value, key: &str, action: &str, ctx: &BuildContext<'_>) -> CirrusResult<&'a str> {
    opt_str(options, key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ctx.reject(format!("{action} requires '{key}'")))
}

// ── delete ───────────────────────────────────────────────────────────────────

pub fn delete_topic_schema() -> Value {
    type_schema("delete", json!({}), &[])
}

pub fn build_delete_topic(_options: &Value, _ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    Ok(Box::new(DeleteTopic))
}

struct DeleteTopic;

impl Action for DeleteTopic {
    fn name(&self) -> &str {
        "delete"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        let service = ctx.services.notifications();
        per_resource(ctx, self.name(), resources, |topic| {
            service.delete_topic(topic_urn(topic))?;
            Ok(Step::Done)
        })
    }
}

// ── create-lts / delete-lts ──────────────────────────────────────────────────

pub fn create_lts_schema() -> Value {
    type_schema(
        "create-lts",
        json!({
            "log_group_id": {"type": "string"},
            "log_stream_id": {"type": "string"},
        }),
        &["log_group_id", "log_stream_id"],
    )
}

pub fn build_create_lts(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    Ok(Box::new(CreateLts {
        log_group_id: required(options, "log_group_id", "create-lts", ctx)?.to_string(),
        log_stream_id: required(options, "log_stream_id", "create-lts", ctx)?.to_string(),
    }))
}

struct CreateLts {
    log_group_id: String,
    log_stream_id: String,
}

impl Action for CreateLts {
    fn name(&self) -> &str {
        "create-lts"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        let service = ctx.services.notifications();
        per_resource(ctx, self.name(), resources, |topic| {
            service.create_logtank(topic_urn(topic), &self.log_group_id, &self.log_stream_id)?;
            Ok(Step::Done)
        })
    }
}

pub fn delete_lts_schema() -> Value {
    type_schema("delete-lts", json!({}), &[])
}

pub fn build_delete_lts(_options: &Value, _ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    Ok(Box::new(DeleteLts))
}

/// Unbinds every logtank. Uses the bindings `topic-lts` cached on the
/// record when present.
struct DeleteLts;

impl Action for DeleteLts {
    fn name(&self) -> &str {
        "delete-lts"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        let service = ctx.services.notifications();
        per_resource(ctx, self.name(), resources, |topic| {
            let urn = topic_urn(topic);
            let logtanks = match topic.get("lts").and_then(Value::as_array) {
                Some(cached) => cached.clone(),
                None => service.list_logtanks(urn)?,
            };
            if logtanks.is_empty() {
                return Ok(Step::Skipped);
            }
            for id in logtanks.iter().filter_map(|l| l.get("id").and_then(Value::as_str)) {
                service.delete_logtank(urn, id)?;
                debug!(resource_id = %topic.id(), logtank_id = id, "logtank deleted");
            }
            Ok(Step::Done)
        })
    }
}

// ── update-access / delete-access ────────────────────────────────────────────

pub fn update_access_schema() -> Value {
    type_schema("update-access", json!({"value": {"type": "string"}}), &["value"])
}

pub fn build_update_access(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    let policy = required(options, "value", "update-access", ctx)?;
    serde_json::from_str::<Value>(policy)
        .map_err(|e| ctx.reject(format!("update-access 'value' is not a JSON document: {e}")))?;
    Ok(Box::new(UpdateAccess {
        policy: policy.to_string(),
    }))
}

struct UpdateAccess {
    policy: String,
}

impl Action for UpdateAccess {
    fn name(&self) -> &str {
        "update-access"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        let service = ctx.services.notifications();
        per_resource(ctx, self.name(), resources, |topic| {
            service.update_access_policy(topic_urn(topic), Some(&self.policy))?;
            Ok(Step::Done)
        })
    }
}

pub fn delete_access_schema() -> Value {
    type_schema("delete-access", json!({}), &[])
}

pub fn build_delete_access(_options: &Value, _ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    Ok(Box::new(DeleteAccess))
}

struct DeleteAccess;

impl Action for DeleteAccess {
    fn name(&self) -> &str {
        "delete-access"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        let service = ctx.services.notifications();
        per_resource(ctx, self.name(), resources, |topic| {
            service.delete_topic_attributes(topic_urn(topic))?;
            Ok(Step::Done)
        })
    }
}

// ── delete-allow-all-user-access ─────────────────────────────────────────────

pub fn delete_allow_all_schema() -> Value {
    type_schema("delete-allow-all-user-access", json!({}), &[])
}

pub fn build_delete_allow_all(_options: &Value, _ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    Ok(Box::new(DeleteAllowAll))
}

/// Removes the `*` account from every Allow statement. A statement left
/// with no accounts is dropped; a policy left with no statements is cleared.
struct DeleteAllowAll;

/// What stripping the wildcard did to one policy document.
#[derive(Debug, PartialEq)]
enum Stripped {
    Unchanged,
    Rewritten(String),
    Cleared,
}

fn strip_allow_all(raw: &str) -> CirrusResult<Stripped> {
    let mut document: Value = serde_json::from_str(raw).map_err(|e| CirrusError::Execution {
        reason: format!("access policy is not valid JSON: {e}"),
    })?;
    let Some(statements) = document.get_mut("Statement").and_then(Value::as_array_mut) else {
        return Ok(Stripped::Unchanged);
    };

    let before = statements.clone();
    statements.retain_mut(|statement| {
        if statement.get("Effect").and_then(Value::as_str) != Some("Allow") {
            return true;
        }
        let Some(accounts) = statement.pointer_mut("/Principal/CSP") else {
            return true;
        };
        match accounts {
            Value::Array(list) => {
                list.retain(|a| a.as_str() != Some("*"));
                !list.is_empty()
            }
            Value::String(account) => account.as_str() != "*",
            _ => true,
        }
    });

    if *statements == before {
        Ok(Stripped::Unchanged)
    } else if statements.is_empty() {
        Ok(Stripped::Cleared)
    } else {
        Ok(Stripped::Rewritten(document.to_string()))
    }
}

impl Action for DeleteAllowAll {
    fn name(&self) -> &str {
        "delete-allow-all-user-access"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        let service = ctx.services.notifications();
        per_resource(ctx, self.name(), resources, |topic| {
            let urn = topic_urn(topic);
            let raw = match topic.str_field("access_policy") {
                Some(cached) => Some(cached.to_string()),
                None => service.access_policy(urn)?,
            };
            let Some(raw) = raw.filter(|p| !p.is_empty()) else {
                return Ok(Step::Skipped);
            };
            match strip_allow_all(&raw)? {
                Stripped::Unchanged => Ok(Step::Skipped),
                Stripped::Rewritten(policy) => {
                    service.update_access_policy(urn, Some(&policy))?;
                    Ok(Step::Done)
                }
                Stripped::Cleared => {
                    info!(resource_id = %topic.id(), "no statements left, clearing access policy");
                    service.update_access_policy(urn, None)?;
                    Ok(Step::Done)
                }
            }
        })
    }
}
