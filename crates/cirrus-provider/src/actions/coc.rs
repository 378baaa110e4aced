//! Operations center alarms: publish a non-compliance summary of the
//! matched records to notification topics.

use serde_json::{json, Value};

use cirrus_contracts::{error::CirrusResult, report::ActionReport, resource::Resource};
use cirrus_core::{
    context::RunContext,
    schema::type_schema,
    services::MessageBody,
    traits::Action,
    value::resolve_string,
};

use super::notify::{publish_all, topic_list_property};
use crate::options::{opt_str, opt_strings};
use crate::registry::BuildContext;

const PATCH_SUBJECT: &str = "Patch Security Non-Compliance Alert";
const PATCH_MESSAGE: &str =
    "Incompliant patches are detected on the following hosts, Repair the patches in time.";
const SCRIPT_SUBJECT: &str = "Script Security Non-Compliance Alert";
const SCRIPT_MESSAGE: &str = "The following script has been found to lack an assigned reviewer, \
     which constitutes a security non-compliance. Please promptly assign a reviewer.";

/// One summary line per record.
type LineFn = fn(&Resource) -> String;

fn field(resource: &Resource, key: &str) -> String {
    resolve_string(resource, key).unwrap_or_default()
}

fn patch_line(instance: &Resource) -> String {
    format!(
        "ecs_name: {}, ecs_instance_id: {}, region: {}, non_compliant_count: {}",
        field(instance, "name"),
        field(instance, "instance_id"),
        field(instance, "region"),
        field(instance, "non_compliant_summary.non_compliant_count"),
    )
}

fn script_line(script: &Resource) -> String {
    format!(
        "script_id: {}, script_name: {}, operator: {}, risk_level: {}",
        field(script, "script_uuid"),
        field(script, "name"),
        field(script, "operator"),
        field(script, "properties.risk_level"),
    )
}

fn alarm_schema(name: &str) -> Value {
    type_schema(
        name,
        json!({
            "topic_urn_list": topic_list_property(),
            "subject": {"type": "string"},
            "message": {"type": "string"},
        }),
        &["topic_urn_list"],
    )
}

fn build_alarm(
    name: &'static str,
    default_subject: &str,
    default_message: &str,
    line: LineFn,
    options: &Value,
    ctx: &BuildContext<'_>,
) -> CirrusResult<Box<dyn Action>> {
    let topics = opt_strings(options, "topic_urn_list").unwrap_or_default();
    if topics.is_empty() {
        return Err(ctx.reject(format!("{name} requires at least one topic URN")));
    }
    Ok(Box::new(Alarm {
        name,
        topics,
        subject: opt_str(options, "subject").unwrap_or(default_subject).to_string(),
        message: opt_str(options, "message").unwrap_or(default_message).to_string(),
        line,
    }))
}

pub fn patch_non_compliant_alarm_schema() -> Value {
    alarm_schema("patch-non-compliant-alarm")
}

pub fn build_patch_non_compliant_alarm(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    build_alarm("patch-non-compliant-alarm", PATCH_SUBJECT, PATCH_MESSAGE, patch_line, options, ctx)
}

pub fn script_non_reviewer_alarm_schema() -> Value {
    alarm_schema("script-non-reviewer-alarm")
}

pub fn build_script_non_reviewer_alarm(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    build_alarm("script-non-reviewer-alarm", SCRIPT_SUBJECT, SCRIPT_MESSAGE, script_line, options, ctx)
}

// Existing policies spell these with underscores.

pub fn patch_non_compliant_alarm_legacy_schema() -> Value {
    alarm_schema("patch_non_compliant_alarm")
}

pub fn build_patch_non_compliant_alarm_legacy(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    build_alarm("patch_non_compliant_alarm", PATCH_SUBJECT, PATCH_MESSAGE, patch_line, options, ctx)
}

pub fn script_non_reviewer_alarm_legacy_schema() -> Value {
    alarm_schema("script_non_reviewer_alarm")
}

pub fn build_script_non_reviewer_alarm_legacy(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    build_alarm("script_non_reviewer_alarm", SCRIPT_SUBJECT, SCRIPT_MESSAGE, script_line, options, ctx)
}

struct Alarm {
    name: &'static str,
    topics: Vec<String>,
    subject: String,
    message: String,
    line: LineFn,
}

impl Alarm {
    fn body(&self, resources: &[Resource]) -> String {
        let mut body = self.message.clone();
        for r in resources {
            body.push('\n');
            body.push_str(&(self.line)(r));
        }
        body
    }
}

impl Action for Alarm {
    fn name(&self) -> &str {
        self.name
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        let mut report = ActionReport::new(self.name);
        if resources.is_empty() {
            return Ok(report);
        }
        let body = self.body(resources);
        publish_all(ctx, self.name, &self.topics, Some(&self.subject), MessageBody::Text(&body))?;
        for r in resources {
            report.success(r.id());
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alarm(line: LineFn) -> Alarm {
        Alarm {
            name: "alarm",
            topics: vec!["urn:smn:cn-north-4:p:sec".to_string()],
            subject: "s".to_string(),
            message: "Header".to_string(),
            line,
        }
    }

    #[test]
    fn patch_body_lists_every_host() {
        let hosts = vec![
            Resource::from_value(json!({
                "id": "i-1", "name": "web-1", "instance_id": "i-1", "region": "cn-north-4",
                "non_compliant_summary": {"non_compliant_count": 3}
            })),
            Resource::from_value(json!({
                "id": "i-2", "name": "web-2", "instance_id": "i-2", "region": "cn-north-4",
                "non_compliant_summary": {"non_compliant_count": 1}
            })),
        ];
        let body = alarm(patch_line).body(&hosts);
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Header");
        assert_eq!(
            lines[1],
            "ecs_name: web-1, ecs_instance_id: i-1, region: cn-north-4, non_compliant_count: 3"
        );
    }

    #[test]
    fn script_line_reads_nested_risk_level() {
        let script = Resource::from_value(json!({
            "id": "s-1", "script_uuid": "s-1", "name": "cleanup", "operator": "ops",
            "properties": {"risk_level": "HIGH", "reviewers": []}
        }));
        assert_eq!(
            script_line(&script),
            "script_id: s-1, script_name: cleanup, operator: ops, risk_level: HIGH"
        );
    }

    #[test]
    fn defaults_fill_subject_and_message() {
        let settings = crate::testing::settings();
        let mode = cirrus_contracts::policy::PolicyMode::Pull;
        let ctx = crate::testing::build_context(
            cirrus_contracts::resource::ResourceType::CocScript,
            &mode,
            &settings,
        );
        let action = build_script_non_reviewer_alarm(
            &json!({"type": "script-non-reviewer-alarm", "topic_urn_list": ["urn:t"]}),
            &ctx,
        )
        .unwrap();
        assert_eq!(action.name(), "script-non-reviewer-alarm");
    }

    #[test]
    fn underscore_spelling_builds_the_same_alarm() {
        let settings = crate::testing::settings();
        let mode = cirrus_contracts::policy::PolicyMode::Pull;
        let ctx = crate::testing::build_context(
            cirrus_contracts::resource::ResourceType::CocPatch,
            &mode,
            &settings,
        );
        let action = build_patch_non_compliant_alarm_legacy(
            &json!({"type": "patch_non_compliant_alarm", "topic_urn_list": ["urn:t"]}),
            &ctx,
        )
        .unwrap();
        assert_eq!(action.name(), "patch_non_compliant_alarm");
        assert_eq!(
            patch_non_compliant_alarm_legacy_schema()["properties"]["type"]["enum"][0],
            "patch_non_compliant_alarm"
        );
    }
}
