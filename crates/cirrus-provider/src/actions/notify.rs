//! `notify-message` and its structured and templated variants: publish a
//! message about the matched resources to one or more notification topics.
//!
//! Every variant expands `{resource_details}` to the resource type and the
//! matched ids before publishing.

use serde_json::{json, Map, Value};
use tracing::{info, warn};

use cirrus_contracts::{
    error::CirrusResult,
    report::ActionReport,
    resource::{Resource, ResourceType},
};
use cirrus_core::{
    context::RunContext,
    schema::type_schema,
    services::MessageBody,
    traits::Action,
};

use crate::options::{opt_str, opt_strings};
use crate::registry::BuildContext;

const DETAILS_PLACEHOLDER: &str = "{resource_details}";

/// Publish `message` to every topic in turn. The first failed publish is
/// returned; topics after it are not attempted.
pub(crate) fn publish_all(
    ctx: &RunContext<'_>,
    action: &str,
    topics: &[String],
    subject: Option<&str>,
    body: MessageBody<'_>,
) -> CirrusResult<()> {
    let service = ctx.services.notifications();
    for topic in topics {
        let message_id = service.publish(topic, subject, body).inspect_err(|e| {
            warn!(policy = ctx.policy, action, topic_urn = %topic, error = %e, "publish failed");
        })?;
        info!(
            policy = ctx.policy,
            action,
            topic_urn = %topic,
            message_id = %message_id,
            "message published"
        );
    }
    Ok(())
}

/// `"<type>:<id>,<id>"` for the matched resources.
pub(crate) fn resource_details(resource_type: ResourceType, resources: &[Resource]) -> String {
    let ids: Vec<&str> = resources.iter().map(Resource::id).collect();
    format!("{}:{}", resource_type.name(), ids.join(","))
}

pub(crate) fn topic_list_property() -> Value {
    json!({"type": "array", "items": {"type": "string"}, "minItems": 1})
}

fn expand(text: &str, resource_type: ResourceType, resources: &[Resource]) -> String {
    if !text.contains(DETAILS_PLACEHOLDER) {
        return text.to_string();
    }
    text.replace(DETAILS_PLACEHOLDER, &resource_details(resource_type, resources))
}

fn topics_of(name: &str, options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Vec<String>> {
    let topics = opt_strings(options, "topic_urn_list").unwrap_or_default();
    if topics.is_empty() {
        return Err(ctx.reject(format!("{name} requires at least one topic URN")));
    }
    Ok(topics)
}

/// Publish once for the whole batch and record every resource as notified.
fn notify_batch(
    ctx: &RunContext<'_>,
    action: &str,
    topics: &[String],
    subject: Option<&str>,
    resources: &[Resource],
    body: MessageBody<'_>,
) -> CirrusResult<ActionReport> {
    let mut report = ActionReport::new(action);
    if resources.is_empty() {
        return Ok(report);
    }
    publish_all(ctx, action, topics, subject, body)?;
    for r in resources {
        report.success(r.id());
    }
    Ok(report)
}

// ── notify-message ───────────────────────────────────────────────────────────

pub fn schema() -> Value {
    type_schema(
        "notify-message",
        json!({
            "topic_urn_list": topic_list_property(),
            "subject": {"type": "string"},
            "message": {"type": "string"},
        }),
        &["topic_urn_list", "message"],
    )
}

pub fn build(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    let topics = topics_of("notify-message", options, ctx)?;
    let message = opt_str(options, "message")
        .ok_or_else(|| ctx.reject("notify-message requires 'message'"))?;
    Ok(Box::new(NotifyMessage {
        topics,
        subject: opt_str(options, "subject").map(str::to_string),
        message: message.to_string(),
    }))
}

struct NotifyMessage {
    topics: Vec<String>,
    subject: Option<String>,
    message: String,
}

impl NotifyMessage {
    fn render(&self, resource_type: ResourceType, resources: &[Resource]) -> String {
        expand(&self.message, resource_type, resources)
    }
}

impl Action for NotifyMessage {
    fn name(&self) -> &str {
        "notify-message"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        let message = self.render(ctx.resource_type, resources);
        let body = MessageBody::Text(&message);
        notify_batch(ctx, self.name(), &self.topics, self.subject.as_deref(), resources, body)
    }
}

// ── notify-message-structure ─────────────────────────────────────────────────

pub fn structure_schema() -> Value {
    type_schema(
        "notify-message-structure",
        json!({
            "topic_urn_list": topic_list_property(),
            "subject": {"type": "string"},
            "message_structure": {"type": "string"},
        }),
        &["topic_urn_list", "message_structure"],
    )
}

pub fn build_structure(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    let topics = topics_of("notify-message-structure", options, ctx)?;
    let structure = opt_str(options, "message_structure")
        .ok_or_else(|| ctx.reject("notify-message-structure requires 'message_structure'"))?;
    Ok(Box::new(NotifyStructure {
        topics,
        subject: opt_str(options, "subject").map(str::to_string),
        structure: structure.to_string(),
    }))
}

/// One message per delivery protocol, as a JSON document.
struct NotifyStructure {
    topics: Vec<String>,
    subject: Option<String>,
    structure: String,
}

impl Action for NotifyStructure {
    fn name(&self) -> &str {
        "notify-message-structure"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        let structure = expand(&self.structure, ctx.resource_type, resources);
        let body = MessageBody::Structure(&structure);
        notify_batch(ctx, self.name(), &self.topics, self.subject.as_deref(), resources, body)
    }
}

// ── notify-message-template ──────────────────────────────────────────────────

pub fn template_schema() -> Value {
    type_schema(
        "notify-message-template",
        json!({
            "topic_urn_list": topic_list_property(),
            "subject": {"type": "string"},
            "message_template_name": {"type": "string"},
            "message_template_variables": {"type": "object"},
        }),
        &["topic_urn_list", "message_template_name"],
    )
}

pub fn build_template(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    let topics = topics_of("notify-message-template", options, ctx)?;
    let template = opt_str(options, "message_template_name")
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ctx.reject("notify-message-template requires 'message_template_name'"))?;
    Ok(Box::new(NotifyTemplate {
        topics,
        subject: opt_str(options, "subject").map(str::to_string),
        template: template.to_string(),
        variables: options
            .get("message_template_variables")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default(),
    }))
}

struct NotifyTemplate {
    topics: Vec<String>,
    subject: Option<String>,
    template: String,
    variables: Map<String, Value>,
}

impl NotifyTemplate {
    /// String variables get the placeholder expanded; others pass through.
    fn render(&self, resource_type: ResourceType, resources: &[Resource]) -> Map<String, Value> {
        self.variables
            .iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::String(text) => Value::String(expand(text, resource_type, resources)),
                    other => other.clone(),
                };
                (k.clone(), v)
            })
            .collect()
    }
}

impl Action for NotifyTemplate {
    fn name(&self) -> &str {
        "notify-message-template"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        let variables = self.render(ctx.resource_type, resources);
        let body = MessageBody::Template {
            name: &self.template,
            variables: &variables,
        };
        notify_batch(ctx, self.name(), &self.topics, self.subject.as_deref(), resources, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notify(message: &str) -> NotifyMessage {
        NotifyMessage {
            topics: vec!["urn:smn:cn-north-4:p:alerts".to_string()],
            subject: None,
            message: message.to_string(),
        }
    }

    fn topics() -> Vec<Resource> {
        vec![
            Resource::from_value(json!({"id": "t-1"})),
            Resource::from_value(json!({"id": "t-2"})),
        ]
    }

    #[test]
    fn placeholder_expands_to_type_and_ids() {
        let rendered = notify("Open topics: {resource_details}").render(ResourceType::SmnTopic, &topics());
        assert_eq!(rendered, "Open topics: smn-topic:t-1,t-2");
    }

    #[test]
    fn message_without_placeholder_is_sent_verbatim() {
        assert_eq!(notify("hello").render(ResourceType::SmnTopic, &topics()), "hello");
    }

    #[test]
    fn schema_requires_topics_and_message() {
        assert_eq!(schema()["required"], json!(["type", "topic_urn_list", "message"]));
    }

    #[test]
    fn template_variables_expand_only_strings() {
        let action = NotifyTemplate {
            topics: vec!["urn:t".to_string()],
            subject: None,
            template: "weekly".to_string(),
            variables: json!({"details": "open: {resource_details}", "count": 2})
                .as_object()
                .cloned()
                .unwrap(),
        };
        let rendered = action.render(ResourceType::SmnTopic, &topics());
        assert_eq!(rendered["details"], "open: smn-topic:t-1,t-2");
        assert_eq!(rendered["count"], 2);
    }

    #[test]
    fn template_name_is_required() {
        let settings = crate::testing::settings();
        let mode = cirrus_contracts::policy::PolicyMode::Pull;
        let ctx = crate::testing::build_context(ResourceType::SmnTopic, &mode, &settings);
        let options = json!({"type": "notify-message-template", "topic_urn_list": ["urn:t"], "message_template_name": ""});
        assert!(build_template(&options, &ctx).is_err());
        assert_eq!(structure_schema()["required"], json!(["type", "topic_urn_list", "message_structure"]));
    }
}
