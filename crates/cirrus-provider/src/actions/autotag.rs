//! `auto-tag-user`: tag the resources an event touched with the actor
//! behind it.
//!
//! Only meaningful for event-driven policies; the builder rejects it
//! elsewhere.
//!
//! ```toml
//! [[policies]]
//! name = "function-owner"
//! resource = "functiongraph"
//! mode = { type = "cloudtrace", events = ["CreateFunction"] }
//!
//! [[policies.actions]]
//! type = "auto-tag-user"
//! tag = "Creator"
//! principal_id_tag = "CreatorId"
//! ```

use std::collections::HashSet;

use serde_json::{json, Value};
use tracing::{debug, warn};

use cirrus_contracts::{
    error::CirrusResult,
    event::{CloudEvent, UserType},
    report::ActionReport,
    resource::Resource,
    tags::TagSet,
};
use cirrus_core::{context::RunContext, schema::type_schema, tagging::resource_tags, traits::Action};

use super::tag::{ids_of, write_tags, TagWrite};
use crate::options::{opt_bool, opt_str, opt_strings};
use crate::registry::BuildContext;

const NAME: &str = "auto-tag-user";

/// Which event field supplies the tag value instead of the actor name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSelector {
    UserName,
    SourceIpAddress,
    PrincipalId,
}

impl ValueSelector {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "userName" => Some(Self::UserName),
            "sourceIPAddress" => Some(Self::SourceIpAddress),
            "principalId" => Some(Self::PrincipalId),
            _ => None,
        }
    }
}

/// Which resources receive the principal id tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrincipalIdTarget {
    /// The same resources as the primary tag.
    Untagged,
    /// Every resource, even those that already carry the primary tag.
    All,
}

/// What an event says about its actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribution {
    pub actor: Option<String>,
    pub principal_id: Option<String>,
    pub selected: Option<String>,
}

impl Attribution {
    /// The selected value if non-empty, otherwise the actor name.
    pub fn tag_value(&self) -> Option<&str> {
        [self.selected.as_deref(), self.actor.as_deref()]
            .into_iter()
            .flatten()
            .find(|v| !v.is_empty())
    }
}

/// Extract the attribution from `event`, or `None` when its actor type is
/// not one of `user_types`.
pub fn compute_tag(
    event: &CloudEvent,
    user_types: &[UserType],
    selector: Option<ValueSelector>,
) -> Option<Attribution> {
    let user_type = event.user.known_type()?;
    if !user_types.contains(&user_type) {
        return None;
    }
    let selected = selector.and_then(|s| match s {
        ValueSelector::UserName => event.user.name.clone(),
        ValueSelector::SourceIpAddress => event.source_ip.clone(),
        ValueSelector::PrincipalId => event.user.principal_id.clone(),
    });
    Some(Attribution {
        actor: event.user.name.clone(),
        principal_id: event.user.principal_id.clone(),
        selected,
    })
}

pub fn schema() -> Value {
    type_schema(
        NAME,
        json!({
            "tag": {"type": "string"},
            "user-type": {
                "type": "array",
                "items": {"enum": ["IAMUser", "AssumedRole", "FederatedUser"]},
            },
            "update": {"type": "boolean"},
            "value": {"enum": ["userName", "sourceIPAddress", "principalId"]},
            "principal_id_tag": {"type": "string"},
            "principal-id-target": {"enum": ["untagged", "all"]},
        }),
        &["tag"],
    )
}

pub fn build(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    if !ctx.mode.is_event_driven() {
        return Err(ctx.reject("auto-tag-user requires an event-driven (cloudtrace) mode"));
    }
    if !ctx.capabilities().has_action("tag") {
        return Err(ctx.reject("resource does not support tagging"));
    }
    let tag = opt_str(options, "tag")
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ctx.reject("auto-tag-user requires 'tag'"))?;

    let user_types = match opt_strings(options, "user-type") {
        Some(names) => names
            .iter()
            .filter_map(|n| UserType::ALL.into_iter().find(|t| t.as_str() == n.as_str()))
            .collect(),
        None => UserType::ALL.to_vec(),
    };

    Ok(Box::new(AutoTagUser {
        tag: tag.to_string(),
        user_types,
        update: opt_bool(options, "update", false),
        selector: opt_str(options, "value").and_then(ValueSelector::parse),
        principal_id_tag: opt_str(options, "principal_id_tag")
            .filter(|t| !t.is_empty())
            .map(str::to_string),
        principal_id_target: match opt_str(options, "principal-id-target") {
            Some("all") => PrincipalIdTarget::All,
            _ => PrincipalIdTarget::Untagged,
        },
    }))
}

#[derive(Debug)]
pub struct AutoTagUser {
    tag: String,
    user_types: Vec<UserType>,
    update: bool,
    selector: Option<ValueSelector>,
    principal_id_tag: Option<String>,
    principal_id_target: PrincipalIdTarget,
}

/// Resources whose tags lack `tag_key`, or all of them when `overwrite`.
fn primary_targets(resources: &[Resource], tag_key: &str, overwrite: bool) -> Vec<String> {
    if overwrite {
        return ids_of(resources);
    }
    resources
        .iter()
        .filter(|r| !resource_tags(r).contains_key(tag_key))
        .map(|r| r.id().to_string())
        .collect()
}

fn write_one(
    ctx: &RunContext<'_>,
    ids: &[String],
    key: &str,
    value: &str,
) -> CirrusResult<ActionReport> {
    let tags: TagSet = [(key, value)].into_iter().collect();
    write_tags(ctx, NAME, ids, TagWrite::Create(&tags))
}

/// Write the attribution tags and return the tag set that was applied.
///
/// The primary tag goes to the resources lacking `tag_key` (all of them when
/// `overwrite`), valued with the selected value or else the actor. The
/// principal id tag, when configured and known, goes to the set
/// `principal_id_target` picks. Each key is one batched tag write. The
/// returned report lists every resource once; a failure on either write
/// wins.
pub fn apply(
    ctx: &RunContext<'_>,
    resources: &[Resource],
    tag_key: &str,
    attribution: &Attribution,
    principal_id_tag: Option<&str>,
    principal_id_target: PrincipalIdTarget,
    overwrite: bool,
) -> CirrusResult<(TagSet, ActionReport)> {
    let mut applied = TagSet::new();
    let mut report = ActionReport::new(NAME);

    let untagged = primary_targets(resources, tag_key, overwrite);
    if let Some(value) = attribution.tag_value() {
        report.merge(write_one(ctx, &untagged, tag_key, value)?);
        applied.insert(tag_key, value);
    }

    let principal = attribution.principal_id.as_deref().filter(|p| !p.is_empty());
    if let (Some(key), Some(principal)) = (principal_id_tag, principal) {
        let ids = match principal_id_target {
            PrincipalIdTarget::Untagged => untagged,
            PrincipalIdTarget::All => ids_of(resources),
        };
        report.merge(write_one(ctx, &ids, key, principal)?);
        applied.insert(key, principal);
    }

    let failed: HashSet<&str> = report.failed.iter().map(|f| f.id.as_str()).collect();
    let mut seen = HashSet::new();
    let succeeded: Vec<String> = report
        .succeeded
        .iter()
        .filter(|id| !failed.contains(id.as_str()) && seen.insert(id.as_str()))
        .cloned()
        .collect();
    report.succeeded = succeeded;
    report.tags = applied.clone();
    Ok((applied, report))
}

impl Action for AutoTagUser {
    fn name(&self) -> &str {
        NAME
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        let Some(event) = ctx.event else {
            debug!(policy = ctx.policy, "no event, nothing to attribute");
            return Ok(ActionReport::new(NAME));
        };
        let Some(attribution) = compute_tag(event, &self.user_types, self.selector) else {
            warn!(
                policy = ctx.policy,
                user_type = %event.user.user_type,
                "actor type not accepted, skipping attribution"
            );
            return Ok(ActionReport::new(NAME));
        };

        let (applied, report) = apply(
            ctx,
            resources,
            &self.tag,
            &attribution,
            self.principal_id_tag.as_deref(),
            self.principal_id_target,
            self.update,
        )?;
        debug!(policy = ctx.policy, tags = ?applied, "attribution tags applied");
        Ok(report)
    }
}
