//! Function filters backed by per-function service lookups.
//!
//! `trigger-type` tests the triggers attached to a function and
//! `reserved-concurrency` its reserved instance configuration. Lookups run
//! on a bounded worker pool, then go through an embedded value predicate.
//! The shorthand form names a field directly:
//!
//! ```toml
//! [[policies.filters]]
//! type = "trigger-type"
//! trigger_type_code = "TIMER"
//! ```

use serde_json::{json, Value};
use tracing::debug;

use cirrus_contracts::{error::CirrusResult, resource::Resource};
use cirrus_core::{
    context::RunContext,
    pool::fan_out,
    schema::{type_schema, value_properties},
    traits::Filter,
    value_filter::ValueFilter,
};

use crate::actions::function::{unqualified, urn_of};
use crate::registry::BuildContext;

pub const TRIGGERS_ANNOTATION: &str = "triggers";
pub const RESERVED_ANNOTATION: &str = "reserved_concurrency";

const TRIGGER_TYPES: [&str; 13] = [
    "TIMER", "APIG", "APIC", "CTS", "DDS", "DIS", "LTS", "KAFKA", "OBS", "SMN",
    "OPENSOURCEKAFKA", "RABBITMQ", "IoTDA",
];

pub fn trigger_type_schema() -> Value {
    let mut properties = value_properties();
    properties["trigger_id"] = json!({"type": "string"});
    properties["trigger_type_code"] = json!({"enum": TRIGGER_TYPES});
    properties["trigger_status"] = json!({"enum": ["ACTIVE", "DISABLED"]});
    type_schema("trigger-type", properties, &[])
}

pub fn build_trigger_type(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Filter>> {
    let predicate = ValueFilter::from_options(options).map_err(|e| ctx.reject(e.reason()))?;
    Ok(Box::new(TriggerType { predicate }))
}

struct TriggerType {
    predicate: ValueFilter,
}

impl TriggerType {
    fn any_trigger_matches(&self, triggers: &[Value]) -> bool {
        triggers
            .iter()
            .any(|t| self.predicate.matches(&Resource::from_value(t.clone())))
    }
}

impl Filter for TriggerType {
    fn name(&self) -> &str {
        "trigger-type"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: Vec<Resource>) -> CirrusResult<Vec<Resource>> {
        let mut slots: Vec<(Resource, Option<Vec<Value>>)> =
            resources.into_iter().map(|r| (r, None)).collect();

        fan_out(&mut slots, ctx.settings.max_workers, |slot| {
            let (function, triggers) = slot;
            let urn = function.str_field("func_urn").unwrap_or_else(|| function.id());
            *triggers = ctx.services.functions().list_triggers(urn)?;
            debug!(
                filter = "trigger-type",
                resource_id = %function.id(),
                triggers = triggers.as_ref().map_or(0, Vec::len),
                "queried function triggers"
            );
            Ok(())
        })?;

        Ok(slots
            .into_iter()
            .filter_map(|(mut function, triggers)| {
                let triggers = triggers?;
                let hit = self.any_trigger_matches(&triggers);
                function.annotate(TRIGGERS_ANNOTATION, Value::Array(triggers));
                hit.then_some(function)
            })
            .collect())
    }
}

// ── reserved-concurrency ─────────────────────────────────────────────────────

pub fn reserved_concurrency_schema() -> Value {
    let mut properties = value_properties();
    properties["min_count"] = json!({"type": "number"});
    properties["qualifier_type"] = json!({"enum": ["version", "alias"]});
    properties["qualifier_name"] = json!({"type": "string"});
    properties["idle_mode"] = json!({"type": "boolean"});
    type_schema("reserved-concurrency", properties, &[])
}

pub fn build_reserved_concurrency(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Filter>> {
    let predicate = ValueFilter::from_options(options).map_err(|e| ctx.reject(e.reason()))?;
    Ok(Box::new(ReservedConcurrency { predicate }))
}

/// Matches the reserved instance configuration of the function's own
/// version. A function without one is tested against an empty record.
struct ReservedConcurrency {
    predicate: ValueFilter,
}

/// `<unqualified urn>:<version>`, the key reserved configurations use.
fn qualified_urn(function: &Resource) -> String {
    let version = function.str_field("version").filter(|v| !v.is_empty()).unwrap_or("latest");
    format!("{}:{version}", unqualified(urn_of(function)))
}

fn own_config(function: &Resource, configs: &[Value]) -> Option<Value> {
    let urn = qualified_urn(function);
    configs
        .iter()
        .find(|c| c.get("function_urn").and_then(Value::as_str) == Some(urn.as_str()))
        .cloned()
}

impl Filter for ReservedConcurrency {
    fn name(&self) -> &str {
        "reserved-concurrency"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: Vec<Resource>) -> CirrusResult<Vec<Resource>> {
        let mut slots: Vec<(Resource, Vec<Value>)> = resources.into_iter().map(|r| (r, Vec::new())).collect();

        fan_out(&mut slots, ctx.settings.max_workers, |slot| {
            let (function, configs) = slot;
            *configs = ctx
                .services
                .functions()
                .list_reserved_instances(unqualified(urn_of(function)))?;
            debug!(
                filter = "reserved-concurrency",
                resource_id = %function.id(),
                configs = configs.len(),
                "queried reserved instances"
            );
            Ok(())
        })?;

        Ok(slots
            .into_iter()
            .filter_map(|(mut function, configs)| {
                let config = own_config(&function, &configs);
                let hit = match &config {
                    Some(c) => self.predicate.matches(&Resource::from_value(c.clone())),
                    None => self.predicate.matches(&Resource::default()),
                };
                if let Some(config) = config {
                    function.annotate(RESERVED_ANNOTATION, config);
                }
                hit.then_some(function)
            })
            .collect())
    }
}
