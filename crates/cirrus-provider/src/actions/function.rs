//! Serverless function actions.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use cirrus_contracts::{error::CirrusResult, report::ActionReport, resource::Resource};
use cirrus_core::{
    context::RunContext,
    schema::type_schema,
    services::{FunctionService, Invocation},
    traits::Action,
};

use super::{per_resource, Step};
use crate::filters::age::parse_date;
use crate::options::{opt_bool, opt_str, opt_strings};
use crate::registry::BuildContext;

/// Configuration fields carried over from the current configuration when
/// a function is updated.
const UPDATABLE_FIELDS: &[&str] = &[
    "timeout", "handler", "memory_size", "gpu_memory", "gpu_type", "user_data",
    "encrypted_user_data", "xrole", "app_xrole", "description", "func_vpc", "peering_cidr",
    "mount_config", "strategy_config", "custom_image", "extend_config", "initializer_handler",
    "initializer_timeout", "pre_stop_handler", "pre_stop_timeout", "ephemeral_storage",
    "enterprise_project_id", "log_config", "network_controller", "is_stateful_function",
    "enable_dynamic_memory", "enable_auth_in_header", "domain_names", "restore_hook_handler",
    "restore_hook_timeout", "heartbeat_handler", "enable_class_isolation", "lts_custom_tag",
];

const LATEST: &str = "latest";

/// The function's URN, falling back to its id.
pub(crate) fn urn_of(function: &Resource) -> &str {
    function
        .str_field("func_urn")
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| function.id())
}

/// Deletion targets the whole function, not its `latest` alias.
pub(crate) fn unqualified(urn: &str) -> &str {
    urn.strip_suffix(":latest").unwrap_or(urn)
}

// ── delete-function ──────────────────────────────────────────────────────────

pub fn delete_function_schema() -> Value {
    type_schema("delete-function", json!({}), &[])
}

pub fn build_delete_function(_options: &Value, _ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    Ok(Box::new(DeleteFunction))
}

struct DeleteFunction;

impl Action for DeleteFunction {
    fn name(&self) -> &str {
        "delete-function"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        let service = ctx.services.functions();
        per_resource(ctx, self.name(), resources, |function| {
            service.delete_function(unqualified(urn_of(function)))?;
            Ok(Step::Done)
        })
    }
}

// ── show-function-config / update-function-config ────────────────────────────

pub fn show_config_schema() -> Value {
    type_schema("show-function-config", json!({}), &[])
}

pub fn build_show_config(_options: &Value, _ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    Ok(Box::new(ShowConfig))
}

/// Logs each function's current configuration.
struct ShowConfig;

impl Action for ShowConfig {
    fn name(&self) -> &str {
        "show-function-config"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        let service = ctx.services.functions();
        per_resource(ctx, self.name(), resources, |function| {
            let config = service.show_function_config(urn_of(function))?;
            info!(resource_id = %function.id(), config = %config, "function configuration");
            Ok(Step::Done)
        })
    }
}

/// The update body: name and runtime from the record, the updatable part
/// of the current configuration, then `properties` on top.
fn update_body(function: &Resource, current: &Value, properties: &Value) -> Value {
    let mut body = Map::new();
    for key in ["func_name", "runtime"] {
        if let Some(value) = function.get(key) {
            body.insert(key.to_string(), value.clone());
        }
    }
    if let Some(current) = current.as_object() {
        body.extend(
            current
                .iter()
                .filter(|(key, _)| UPDATABLE_FIELDS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone())),
        );
    }
    if let Some(properties) = properties.as_object() {
        body.extend(properties.iter().map(|(key, value)| (key.clone(), value.clone())));
    }
    Value::Object(body)
}

fn apply_config(service: &dyn FunctionService, function: &Resource, properties: &Value) -> CirrusResult<()> {
    let urn = urn_of(function);
    let current = service.show_function_config(urn)?;
    service.update_function_config(urn, &update_body(function, &current, properties))
}

pub fn update_config_schema() -> Value {
    type_schema(
        "update-function-config",
        json!({
            "properties": {"type": "object", "required": ["timeout", "handler", "memory_size"]},
        }),
        &["properties"],
    )
}

pub fn build_update_config(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    let properties = options
        .get("properties")
        .filter(|p| p.is_object())
        .ok_or_else(|| ctx.reject("update-function-config requires a 'properties' table"))?;
    if let Some(missing) = ["timeout", "handler", "memory_size"]
        .into_iter()
        .find(|key| properties.get(key).is_none())
    {
        return Err(ctx.reject(format!("update-function-config 'properties' requires '{missing}'")));
    }
    Ok(Box::new(UpdateConfig {
        properties: properties.clone(),
    }))
}

struct UpdateConfig {
    properties: Value,
}

impl Action for UpdateConfig {
    fn name(&self) -> &str {
        "update-function-config"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        let service = ctx.services.functions();
        per_resource(ctx, self.name(), resources, |function| {
            apply_config(service, function, &self.properties)?;
            Ok(Step::Done)
        })
    }
}

// ── update-function-concurrency ──────────────────────────────────────────────

pub fn update_concurrency_schema() -> Value {
    type_schema(
        "update-function-concurrency",
        json!({"value": {"type": "integer", "minimum": 0}}),
        &["value"],
    )
}

pub fn build_update_concurrency(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    let max_instances = options
        .get("value")
        .and_then(Value::as_i64)
        .ok_or_else(|| ctx.reject("update-function-concurrency requires an integer 'value'"))?;
    Ok(Box::new(UpdateConcurrency { max_instances }))
}

struct UpdateConcurrency {
    max_instances: i64,
}

impl Action for UpdateConcurrency {
    fn name(&self) -> &str {
        "update-function-concurrency"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        let service = ctx.services.functions();
        per_resource(ctx, self.name(), resources, |function| {
            service.update_max_instances(urn_of(function), self.max_instances)?;
            Ok(Step::Done)
        })
    }
}

// ── modify-security-groups ───────────────────────────────────────────────────

pub fn modify_security_groups_schema() -> Value {
    type_schema(
        "modify-security-groups",
        json!({
            "security_groups": {"type": "array", "items": {"type": "string"}},
            "xrole": {"type": "string"},
        }),
        &["security_groups", "xrole"],
    )
}

pub fn build_modify_security_groups(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    let security_groups = opt_strings(options, "security_groups")
        .ok_or_else(|| ctx.reject("modify-security-groups requires 'security_groups'"))?;
    let xrole = opt_str(options, "xrole")
        .ok_or_else(|| ctx.reject("modify-security-groups requires 'xrole'"))?
        .to_string();
    Ok(Box::new(ModifySecurityGroups { security_groups, xrole }))
}

struct ModifySecurityGroups {
    security_groups: Vec<String>,
    xrole: String,
}

impl ModifySecurityGroups {
    /// The update payload for a function's current configuration, or `None`
    /// when the function is not attached to a VPC.
    fn updated_config(&self, current: &Value) -> Option<Value> {
        let mut vpc: Map<String, Value> = current.get("func_vpc")?.as_object()?.clone();
        vpc.insert("security_groups".to_string(), json!(self.security_groups));

        let field = |key: &str| current.get(key).cloned().unwrap_or(Value::Null);
        Some(json!({
            "timeout": field("timeout"),
            "handler": field("handler"),
            "memory_size": field("memory_size"),
            "func_vpc": vpc,
            "xrole": self.xrole,
        }))
    }
}

impl Action for ModifySecurityGroups {
    fn name(&self) -> &str {
        "modify-security-groups"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        let service = ctx.services.functions();
        per_resource(ctx, self.name(), resources, |function| {
            let urn = urn_of(function);
            let current = service.show_function_config(urn)?;
            let Some(config) = self.updated_config(&current) else {
                return Ok(Step::Refused("function has no VPC configuration".to_string()));
            };
            debug!(resource_id = %function.id(), security_groups = ?self.security_groups, "replacing security groups");
            service.update_function_config(urn, &update_body(function, &current, &config))?;
            Ok(Step::Done)
        })
    }
}

// ── trim-versions ────────────────────────────────────────────────────────────

pub fn trim_versions_schema() -> Value {
    type_schema(
        "trim-versions",
        json!({
            "exclude-aliases": {"type": "boolean", "default": true},
            "retain-latest": {"type": "boolean", "default": true},
            "older-than": {"type": "number", "minimum": 0},
        }),
        &[],
    )
}

pub fn build_trim_versions(options: &Value, _ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    Ok(Box::new(TrimVersions {
        exclude_aliases: opt_bool(options, "exclude-aliases", true),
        older_than_days: options.get("older-than").and_then(Value::as_f64).filter(|d| *d > 0.0),
    }))
}

/// Deletes published versions. `latest` is never deleted, so
/// `retain-latest` is accepted and always holds.
struct TrimVersions {
    exclude_aliases: bool,
    older_than_days: Option<f64>,
}

impl TrimVersions {
    /// Why `version` stays, or `None` when it may be deleted.
    fn retained(&self, version: &Value, aliased: &HashMap<&str, &str>) -> Option<String> {
        let name = version.get("version").and_then(Value::as_str).unwrap_or_default();
        if name == LATEST {
            return Some("latest cannot be deleted".to_string());
        }
        if self.exclude_aliases {
            if let Some(alias) = aliased.get(name) {
                return Some(format!("bound by alias '{alias}'"));
            }
        }
        let days = self.older_than_days?;
        let threshold = Utc::now() - Duration::seconds((days * 86_400.0) as i64);
        match version.get("last_modified").and_then(Value::as_str).and_then(parse_date) {
            Some(modified) if modified <= threshold => None,
            Some(_) => Some(format!("modified within {days} days")),
            None => Some("no readable last_modified".to_string()),
        }
    }
}

impl Action for TrimVersions {
    fn name(&self) -> &str {
        "trim-versions"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        let service = ctx.services.functions();
        per_resource(ctx, self.name(), resources, |function| {
            let urn = unqualified(urn_of(function));
            let versions = service.list_versions(urn)?;
            let aliases = service.list_aliases(urn)?;
            if let [only] = versions.as_slice() {
                if only.get("version").and_then(Value::as_str) == Some(LATEST) {
                    warn!(resource_id = %function.id(), "only the latest version exists, nothing to trim");
                    return Ok(Step::Skipped);
                }
            }

            let aliased: HashMap<&str, &str> = aliases
                .iter()
                .filter_map(|a| {
                    let version = a.get("version").and_then(Value::as_str)?;
                    Some((version, a.get("name").and_then(Value::as_str).unwrap_or_default()))
                })
                .collect();

            let mut deleted = Vec::new();
            for version in &versions {
                let name = version.get("version").and_then(Value::as_str).unwrap_or_default();
                if let Some(reason) = self.retained(version, &aliased) {
                    debug!(resource_id = %function.id(), version = name, reason = %reason, "version kept");
                    continue;
                }
                let Some(version_urn) = version.get("func_urn").and_then(Value::as_str) else {
                    continue;
                };
                warn!(resource_id = %function.id(), func_urn = version_urn, "deleting function version");
                service.delete_function(version_urn)?;
                deleted.push(name.to_string());
            }
            info!(resource_id = %function.id(), deleted = ?deleted, "function versions trimmed");
            Ok(if deleted.is_empty() { Step::Skipped } else { Step::Done })
        })
    }
}

// ── invoke-function ──────────────────────────────────────────────────────────

pub fn invoke_schema() -> Value {
    type_schema(
        "invoke-function",
        json!({
            "body": {"type": "object"},
            "X-Cff-Log-Type": {"enum": ["tail", null]},
            "X-Cff-Request-Version": {"enum": ["v1", "v2"]},
            "async-invoke": {"type": "boolean", "default": false},
        }),
        &["body"],
    )
}

pub fn build_invoke(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    let body = options
        .get("body")
        .filter(|b| b.is_object())
        .ok_or_else(|| ctx.reject("invoke-function requires a 'body' table"))?;
    let request_version = opt_str(options, "X-Cff-Request-Version").unwrap_or("v1");
    if !matches!(request_version, "v1" | "v2") {
        return Err(ctx.reject(format!("invoke-function: unknown request version '{request_version}'")));
    }
    Ok(Box::new(Invoke {
        invocation: Invocation {
            body: body.clone(),
            asynchronous: opt_bool(options, "async-invoke", false),
            log_type: opt_str(options, "X-Cff-Log-Type").map(str::to_string),
            request_version: request_version.to_string(),
        },
    }))
}

struct Invoke {
    invocation: Invocation,
}

impl Action for Invoke {
    fn name(&self) -> &str {
        "invoke-function"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        let service = ctx.services.functions();
        per_resource(ctx, self.name(), resources, |function| {
            let response = service.invoke(urn_of(function), &self.invocation)?;
            let request_id = response.get("request_id").and_then(Value::as_str).unwrap_or_default();
            if self.invocation.asynchronous {
                info!(resource_id = %function.id(), request_id, "function invoked asynchronously");
            } else {
                info!(
                    resource_id = %function.id(),
                    request_id,
                    result = %response.get("result").unwrap_or(&serde_json::Value::Null),
                    "function invoked"
                );
            }
            Ok(Step::Done)
        })
    }
}
