//! `tag` and `remove-tag` with their `mark`, `unmark` and `untag`
//! spellings, plus the batched tag writer the other tag actions share.
//!
//! ```toml
//! [[policies.actions]]
//! type = "tag"
//! key = "Owner"
//! value = "platform"
//! ```

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use cirrus_contracts::{
    error::{CirrusError, CirrusResult},
    report::ActionReport,
    resource::Resource,
    tags::TagSet,
};
use cirrus_core::{context::RunContext, schema::type_schema, traits::Action};

use crate::options::{opt_str, opt_strings};
use crate::registry::BuildContext;

/// One batched tag service operation.
#[derive(Debug, Clone, Copy)]
pub enum TagWrite<'a> {
    Create(&'a TagSet),
    Delete(&'a [String]),
}

impl TagWrite<'_> {
    fn len(&self) -> usize {
        match self {
            Self::Create(tags) => tags.len(),
            Self::Delete(keys) => keys.len(),
        }
    }
}

/// Apply `write` to `ids`, `tag_batch_size` resources per call.
///
/// Resource types without a tag service mapping are skipped with an empty
/// report. Resources the service rejects individually land in the report's
/// failures; a failed batch call is returned as the error.
pub fn write_tags(
    ctx: &RunContext<'_>,
    action: &str,
    ids: &[String],
    write: TagWrite<'_>,
) -> CirrusResult<ActionReport> {
    let mut report = ActionReport::new(action);
    if write.len() > ctx.settings.max_tags_per_call {
        return Err(CirrusError::Execution {
            reason: format!(
                "{action}: {} tags exceed the limit of {} per call",
                write.len(),
                ctx.settings.max_tags_per_call
            ),
        });
    }
    let Some(tag_resource_type) = ctx.resource_type.tag_resource_type() else {
        debug!(resource_type = %ctx.resource_type, action, "resource type is not taggable, skipping");
        return Ok(report);
    };
    if ids.is_empty() || write.len() == 0 {
        return Ok(report);
    }

    let service = ctx.services.tags();
    for batch in ids.chunks(ctx.settings.tag_batch_size.max(1)) {
        let failed = match write {
            TagWrite::Create(tags) => service.create_tags(tag_resource_type, batch, tags)?,
            TagWrite::Delete(keys) => service.delete_tags(tag_resource_type, batch, keys)?,
        };
        debug!(action, batch = batch.len(), failed = failed.len(), "tag batch written");
        for id in batch {
            match failed.iter().find(|f| &f.id == id) {
                Some(f) => {
                    warn!(
                        policy = ctx.policy,
                        action,
                        resource_id = %id,
                        reason = %f.reason,
                        "tag service rejected resource"
                    );
                    report.failure(id.clone(), f.reason.clone());
                }
                None => {
                    info!(policy = ctx.policy, action, resource_id = %id, "tags updated");
                    report.success(id.clone());
                }
            }
        }
    }
    if let TagWrite::Create(tags) = write {
        if !report.succeeded.is_empty() {
            report.tags = tags.clone();
        }
    }
    Ok(report)
}

pub(crate) fn ids_of(resources: &[Resource]) -> Vec<String> {
    resources.iter().map(|r| r.id().to_string()).collect()
}

// ── tag ──────────────────────────────────────────────────────────────────────

fn tag_properties() -> Value {
    json!({
        "key": {"type": "string"},
        "tag": {"type": "string"},
        "value": {"type": "string"},
        "tags": {"type": "object", "additionalProperties": {"type": "string"}},
    })
}

pub fn tag_schema() -> Value {
    type_schema("tag", tag_properties(), &[])
}

pub fn mark_schema() -> Value {
    type_schema("mark", tag_properties(), &[])
}

pub fn build_tag(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    tag_action("tag", options, ctx)
}

pub fn build_mark(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    tag_action("mark", options, ctx)
}

fn tag_action(name: &'static str, options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    let tags = tags_from_options(options);
    if tags.is_empty() {
        return Err(ctx.reject(format!("{name} requires 'tags' or a 'key' with a non-empty 'value'")));
    }
    if tags.len() > ctx.settings.max_tags_per_call {
        return Err(ctx.reject(format!(
            "{name} sets {} tags, at most {} are allowed",
            tags.len(),
            ctx.settings.max_tags_per_call
        )));
    }
    Ok(Box::new(TagAction { name, tags }))
}

/// The `tags` map plus the `key`/`tag` + `value` pair, when the value is set.
fn tags_from_options(options: &Value) -> TagSet {
    let mut tags = TagSet::new();
    if let Some(map) = options.get("tags").and_then(Value::as_object) {
        for (k, v) in map {
            if let Some(v) = v.as_str() {
                tags.insert(k.clone(), v);
            }
        }
    }
    let key = opt_str(options, "key").or_else(|| opt_str(options, "tag"));
    if let (Some(key), Some(value)) = (key, opt_str(options, "value").filter(|v| !v.is_empty())) {
        tags.insert(key, value);
    }
    tags
}

struct TagAction {
    name: &'static str,
    tags: TagSet,
}

impl Action for TagAction {
    fn name(&self) -> &str {
        self.name
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        write_tags(ctx, self.name(), &ids_of(resources), TagWrite::Create(&self.tags))
    }
}

// ── remove-tag ───────────────────────────────────────────────────────────────

fn remove_tag_properties() -> Value {
    json!({"tags": {"type": "array", "items": {"type": "string"}, "minItems": 1}})
}

pub fn remove_tag_schema() -> Value {
    type_schema("remove-tag", remove_tag_properties(), &["tags"])
}

pub fn unmark_schema() -> Value {
    type_schema("unmark", remove_tag_properties(), &["tags"])
}

pub fn untag_schema() -> Value {
    type_schema("untag", remove_tag_properties(), &["tags"])
}

pub fn build_remove_tag(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    remove_tag_action("remove-tag", options, ctx)
}

pub fn build_unmark(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    remove_tag_action("unmark", options, ctx)
}

pub fn build_untag(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    remove_tag_action("untag", options, ctx)
}

fn remove_tag_action(name: &'static str, options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    let keys = opt_strings(options, "tags").unwrap_or_default();
    if keys.is_empty() {
        return Err(ctx.reject(format!("{name} requires at least one key in 'tags'")));
    }
    if keys.len() > ctx.settings.max_tags_per_call {
        return Err(ctx.reject(format!(
            "{name} removes {} tags, at most {} are allowed",
            keys.len(),
            ctx.settings.max_tags_per_call
        )));
    }
    Ok(Box::new(RemoveTag { name, keys }))
}

struct RemoveTag {
    name: &'static str,
    keys: Vec<String>,
}

impl Action for RemoveTag {
    fn name(&self) -> &str {
        self.name
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        write_tags(ctx, self.name(), &ids_of(resources), TagWrite::Delete(&self.keys))
    }
}
