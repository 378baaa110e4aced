//! Tag maintenance actions: `rename-tag`, `normalize-tag`, `tag-trim` and
//! `mark-for-op`.
//!
//! Rename and normalize compute a different value per resource, so they
//! write one resource at a time. `mark-for-op` writes the same tag to every
//! resource and goes through the batched writer.
//!
//! ```toml
//! [[policies.actions]]
//! type = "mark-for-op"
//! op = "delete-function"
//! days = 7
//! ```

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, TimeZone, Utc};
use serde_json::{json, Value};
use tracing::{debug, info};

use cirrus_contracts::{
    error::{CirrusError, CirrusResult},
    report::ActionReport,
    resource::Resource,
    tags::TagSet,
};
use cirrus_core::{context::RunContext, schema::type_schema, tagging::resource_tags, traits::Action};

use super::tag::{ids_of, write_tags, TagWrite};
use super::{per_resource, Step};
use crate::options::{opt_f64, opt_str, opt_strings};
use crate::registry::BuildContext;

/// Tags a single resource may carry.
pub const MAX_RESOURCE_TAGS: usize = 20;

pub const DEFAULT_MARK_TAG: &str = "mark-for-op-cirrus";
const DEFAULT_MARK_MESSAGE: &str = "{op}_{action_date}";
const DEFAULT_MARK_DAYS: f64 = 4.0;

/// Delete `delete`, then create `create`, on one resource.
fn rewrite_one(
    ctx: &RunContext<'_>,
    tag_resource_type: &str,
    id: &str,
    delete: &[String],
    create: &TagSet,
) -> CirrusResult<Step> {
    let service = ctx.services.tags();
    let ids = [id.to_string()];
    if !delete.is_empty() {
        if let Some(failed) = service.delete_tags(tag_resource_type, &ids, delete)?.into_iter().next() {
            return Ok(Step::Refused(failed.reason));
        }
    }
    if !create.is_empty() {
        if let Some(failed) = service.create_tags(tag_resource_type, &ids, create)?.into_iter().next() {
            return Ok(Step::Refused(failed.reason));
        }
    }
    Ok(Step::Done)
}

/// Run `plan` per resource and apply the rewrite it returns. `None` from the
/// plan means the resource needs no change.
fn rewrite_each<F>(ctx: &RunContext<'_>, action: &str, resources: &[Resource], plan: F) -> CirrusResult<ActionReport>
where
    F: Fn(&Resource) -> Result<Option<(Vec<String>, TagSet)>, String>,
{
    let Some(tag_resource_type) = ctx.resource_type.tag_resource_type() else {
        debug!(resource_type = %ctx.resource_type, action, "resource type is not taggable, skipping");
        return Ok(ActionReport::new(action));
    };
    per_resource(ctx, action, resources, |resource| match plan(resource) {
        Ok(Some((delete, create))) => rewrite_one(ctx, tag_resource_type, resource.id(), &delete, &create),
        Ok(None) => Ok(Step::Skipped),
        Err(reason) => Ok(Step::Refused(reason)),
    })
}

// ── rename-tag ───────────────────────────────────────────────────────────────

pub fn rename_schema() -> Value {
    type_schema(
        "rename-tag",
        json!({
            "old_key": {"type": "string"},
            "new_key": {"type": "string"},
            "value": {"type": "string"},
        }),
        &["old_key", "new_key"],
    )
}

pub fn build_rename(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    let key = |name: &str| {
        opt_str(options, name)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ctx.reject(format!("rename-tag requires '{name}'")))
    };
    let (old_key, new_key) = (key("old_key")?, key("new_key")?);
    if old_key == new_key {
        return Err(ctx.reject("rename-tag 'old_key' and 'new_key' are the same"));
    }
    Ok(Box::new(RenameTag {
        old_key,
        new_key,
        value: opt_str(options, "value").map(str::to_string),
    }))
}

/// Moves `old_key` to `new_key`, keeping its value unless `value` is set.
struct RenameTag {
    old_key: String,
    new_key: String,
    value: Option<String>,
}

impl RenameTag {
    fn plan(&self, resource: &Resource) -> Result<Option<(Vec<String>, TagSet)>, String> {
        let tags = resource_tags(resource);
        let current = tags.get(&self.old_key);
        let Some(value) = self.value.as_deref().or(current) else {
            return Err(format!("no tag '{}' to rename and no 'value' given", self.old_key));
        };
        let delete = current.map(|_| vec![self.old_key.clone()]).unwrap_or_default();
        let create: TagSet = [(self.new_key.as_str(), value)].into_iter().collect();
        Ok(Some((delete, create)))
    }
}

impl Action for RenameTag {
    fn name(&self) -> &str {
        "rename-tag"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        rewrite_each(ctx, self.name(), resources, |r| self.plan(r))
    }
}

// ── normalize-tag ────────────────────────────────────────────────────────────

pub fn normalize_schema() -> Value {
    type_schema(
        "normalize-tag",
        json!({
            "key": {"type": "string"},
            "value": {"type": "string"},
            "action": {"enum": ["upper", "lower", "title", "strip", "replace"]},
            "old_sub_str": {"type": "string"},
            "new_sub_str": {"type": "string"},
        }),
        &["key", "action"],
    )
}

#[derive(Debug, Clone, PartialEq)]
enum Normalize {
    Upper,
    Lower,
    Title,
    /// Trim any of these characters from both ends.
    Strip(String),
    Replace { from: String, to: String },
}

impl Normalize {
    /// The rewritten value, or `None` when the value is already normal.
    fn apply(&self, value: &str) -> Option<String> {
        let rewritten = match self {
            Self::Upper => value.to_uppercase(),
            Self::Lower => value.to_lowercase(),
            Self::Title => title_case(value),
            Self::Strip(chars) => {
                if !value.contains(chars.as_str()) {
                    return None;
                }
                value.trim_matches(|c| chars.contains(c)).to_string()
            }
            Self::Replace { from, to } => {
                if !value.contains(from.as_str()) {
                    return None;
                }
                value.replace(from.as_str(), to)
            }
        };
        (rewritten != value).then_some(rewritten)
    }
}

/// Upper-case the first letter of each alphabetic run, lower-case the rest.
fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_word = false;
    for c in value.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

pub fn build_normalize(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    let key = opt_str(options, "key")
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ctx.reject("normalize-tag requires 'key'"))?;
    let sub = |name: &str| opt_str(options, name).map(str::to_string);
    let rule = match opt_str(options, "action") {
        Some("upper") => Normalize::Upper,
        Some("lower") => Normalize::Lower,
        Some("title") => Normalize::Title,
        Some("strip") => Normalize::Strip(
            sub("old_sub_str")
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ctx.reject("normalize-tag strip requires 'old_sub_str'"))?,
        ),
        Some("replace") => match (sub("old_sub_str").filter(|s| !s.is_empty()), sub("new_sub_str")) {
            (Some(from), Some(to)) => Normalize::Replace { from, to },
            _ => return Err(ctx.reject("normalize-tag replace requires 'old_sub_str' and 'new_sub_str'")),
        },
        other => return Err(ctx.reject(format!("normalize-tag: unknown action {other:?}"))),
    };
    Ok(Box::new(NormalizeTag {
        key: key.to_string(),
        value: sub("value"),
        rule,
    }))
}

/// Rewrites the value of `key`. With `value` set, only resources whose tag
/// holds exactly that value are touched.
struct NormalizeTag {
    key: String,
    value: Option<String>,
    rule: Normalize,
}

impl NormalizeTag {
    fn plan(&self, resource: &Resource) -> Result<Option<(Vec<String>, TagSet)>, String> {
        let tags = resource_tags(resource);
        let Some(current) = tags.get(&self.key) else {
            return Err(format!("no tag '{}' to normalize", self.key));
        };
        if self.value.as_deref().is_some_and(|v| v != current) {
            return Ok(None);
        }
        let Some(normal) = self.rule.apply(current) else {
            return Err(format!("tag '{}' value '{current}' is not changed by {:?}", self.key, self.rule));
        };
        let create: TagSet = [(self.key.as_str(), normal)].into_iter().collect();
        Ok(Some((vec![self.key.clone()], create)))
    }
}

impl Action for NormalizeTag {
    fn name(&self) -> &str {
        "normalize-tag"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        rewrite_each(ctx, self.name(), resources, |r| self.plan(r))
    }
}

// ── tag-trim ─────────────────────────────────────────────────────────────────

pub fn trim_schema() -> Value {
    type_schema(
        "tag-trim",
        json!({
            "space": {"type": "integer", "minimum": 0, "maximum": MAX_RESOURCE_TAGS},
            "preserve": {"type": "array", "items": {"type": "string"}},
        }),
        &["space"],
    )
}

pub fn build_trim(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    let space = options
        .get("space")
        .and_then(Value::as_u64)
        .and_then(|s| usize::try_from(s).ok())
        .filter(|s| *s <= MAX_RESOURCE_TAGS)
        .ok_or_else(|| ctx.reject(format!("tag-trim requires an integer 'space' up to {MAX_RESOURCE_TAGS}")))?;
    Ok(Box::new(TrimTags {
        space,
        preserve: opt_strings(options, "preserve").unwrap_or_default(),
    }))
}

/// Frees `space` tag slots per resource, deleting unpreserved keys in key
/// order.
struct TrimTags {
    space: usize,
    preserve: Vec<String>,
}

impl TrimTags {
    fn plan(&self, resource: &Resource) -> Result<Option<(Vec<String>, TagSet)>, String> {
        let tags = resource_tags(resource);
        if tags.len() > MAX_RESOURCE_TAGS {
            return Err(format!("{} tags exceed the limit of {MAX_RESOURCE_TAGS}", tags.len()));
        }
        if MAX_RESOURCE_TAGS - tags.len() >= self.space {
            return Ok(None);
        }
        let needed = tags.len() - (MAX_RESOURCE_TAGS - self.space);
        let candidates: Vec<String> = tags
            .keys()
            .filter(|k| !self.preserve.iter().any(|p| p == k))
            .take(needed)
            .map(str::to_string)
            .collect();
        if candidates.len() < needed {
            return Err(format!(
                "only {} unpreserved tags, {needed} must go to free {} slots",
                candidates.len(),
                self.space
            ));
        }
        Ok(Some((candidates, TagSet::new())))
    }
}

impl Action for TrimTags {
    fn name(&self) -> &str {
        "tag-trim"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        rewrite_each(ctx, self.name(), resources, |r| self.plan(r))
    }
}

// ── mark-for-op ──────────────────────────────────────────────────────────────

/// The zone action dates are written in: `utc` or a fixed `+HH:MM` offset.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MarkZone {
    label: String,
    offset: FixedOffset,
}

impl MarkZone {
    pub(crate) fn utc() -> Self {
        Self {
            label: "utc".to_string(),
            offset: Utc.fix(),
        }
    }

    pub(crate) fn parse(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("utc") || raw.eq_ignore_ascii_case("z") {
            return Some(Self::utc());
        }
        let offset: FixedOffset = raw.parse().ok()?;
        Some(Self {
            label: raw.to_string(),
            offset,
        })
    }

    pub(crate) fn from_options(options: &Value) -> Result<Self, String> {
        match opt_str(options, "tz") {
            None => Ok(Self::utc()),
            Some(raw) => Self::parse(raw).ok_or_else(|| format!("unknown 'tz' '{raw}', expected utc or +HH:MM")),
        }
    }
}

/// `%Y-%m-%d` for whole days, `%Y-%m-%d-%H-%M-<zone>` otherwise.
pub(crate) fn format_action_date(at: DateTime<Utc>, with_time: bool, zone: &MarkZone) -> String {
    let local = at.with_timezone(&zone.offset);
    if with_time {
        format!("{}-{}", local.format("%Y-%m-%d-%H-%M"), zone.label)
    } else {
        local.format("%Y-%m-%d").to_string()
    }
}

/// Inverse of [`format_action_date`]. Date-only values are midnight in
/// `zone`.
pub(crate) fn parse_action_date(raw: &str, zone: &MarkZone) -> Option<DateTime<Utc>> {
    let parts: Vec<&str> = raw.splitn(6, '-').collect();
    let number = |s: &str| s.parse::<u32>().ok();
    let (date, hour, minute, zone) = match parts.as_slice() {
        [y, m, d] => (ymd(y, m, d)?, 0, 0, zone.clone()),
        [y, m, d, h, mi, tz] => (ymd(y, m, d)?, number(h)?, number(mi)?, MarkZone::parse(tz)?),
        _ => return None,
    };
    let naive = date.and_hms_opt(hour, minute, 0)?;
    zone.offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn ymd(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

/// The required `op`, which must be an action the resource type registers.
pub(crate) fn marked_op(options: &Value, ctx: &BuildContext<'_>, kind: &str) -> CirrusResult<String> {
    let op = opt_str(options, "op")
        .filter(|op| !op.is_empty())
        .ok_or_else(|| ctx.reject(format!("{kind} requires 'op'")))?;
    if !ctx.capabilities().has_action(op) {
        return Err(ctx.reject(format!(
            "{kind} 'op' '{op}' is not an action of {}",
            ctx.resource_type
        )));
    }
    Ok(op.to_string())
}

pub fn mark_for_op_schema() -> Value {
    type_schema(
        "mark-for-op",
        json!({
            "tag": {"type": "string"},
            "msg": {"type": "string"},
            "op": {"type": "string"},
            "days": {"type": "number", "minimum": 0},
            "hours": {"type": "number", "minimum": 0},
            "tz": {"type": "string"},
        }),
        &["op"],
    )
}

pub fn build_mark_for_op(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Action>> {
    let op = marked_op(options, ctx, "mark-for-op")?;
    let zone = MarkZone::from_options(options).map_err(|e| ctx.reject(format!("mark-for-op: {e}")))?;
    let (days, hours) = match (options.get("days"), options.get("hours")) {
        (None, None) => (DEFAULT_MARK_DAYS, 0.0),
        _ => (opt_f64(options, "days", 0.0), opt_f64(options, "hours", 0.0)),
    };
    if days < 0.0 || hours < 0.0 {
        return Err(ctx.reject("mark-for-op 'days' and 'hours' must not be negative"));
    }
    Ok(Box::new(MarkForOp {
        tag: opt_str(options, "tag").unwrap_or(DEFAULT_MARK_TAG).to_string(),
        message: opt_str(options, "msg").unwrap_or(DEFAULT_MARK_MESSAGE).to_string(),
        op,
        days,
        hours,
        zone,
    }))
}

/// Tags resources with the op to run and the date it becomes due.
struct MarkForOp {
    tag: String,
    message: String,
    op: String,
    days: f64,
    hours: f64,
    zone: MarkZone,
}

impl MarkForOp {
    fn action_date(&self, now: DateTime<Utc>) -> String {
        let seconds = self.days * 86_400.0 + self.hours * 3_600.0;
        let due = now + Duration::seconds(seconds as i64);
        format_action_date(due, self.hours > 0.0, &self.zone)
    }

    fn tag_value(&self, now: DateTime<Utc>) -> String {
        self.message
            .replace("{op}", &self.op)
            .replace("{action_date}", &self.action_date(now))
    }
}

impl Action for MarkForOp {
    fn name(&self) -> &str {
        "mark-for-op"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: &[Resource]) -> CirrusResult<ActionReport> {
        let value = self.tag_value(Utc::now());
        if value.is_empty() {
            return Err(CirrusError::Execution {
                reason: "mark-for-op message renders empty".to_string(),
            });
        }
        info!(policy = ctx.policy, tag = %self.tag, value = %value, resources = resources.len(), "marking resources");
        let tags: TagSet = [(self.tag.as_str(), value.as_str())].into_iter().collect();
        write_tags(ctx, self.name(), &ids_of(resources), TagWrite::Create(&tags))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Timelike;
    use serde_json::json;

    use cirrus_contracts::{policy::PolicyMode, resource::ResourceType};

    use super::*;
    use crate::testing::{build_context, run_context, settings, TagCall, TagCloud};

    fn tagged(id: &str, tags: Value) -> Resource {
        Resource::from_value(json!({"id": id, "tags": tags}))
    }

    fn at(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    // ── rename-tag ─────────────────────────────────────────────────────────

    #[test]
    fn rename_keeps_the_current_value() {
        let rename = RenameTag {
            old_key: "env".to_string(),
            new_key: "Env".to_string(),
            value: None,
        };
        let (delete, create) = rename.plan(&tagged("f-1", json!({"env": "prod"}))).unwrap().unwrap();
        assert_eq!(delete, vec!["env"]);
        assert_eq!(create.get("Env"), Some("prod"));
        assert!(rename.plan(&tagged("f-2", json!({"Owner": "ops"}))).is_err());
    }

    #[test]
    fn rename_with_value_creates_even_without_the_old_key() {
        let rename = RenameTag {
            old_key: "env".to_string(),
            new_key: "Env".to_string(),
            value: Some("dev".to_string()),
        };
        let (delete, create) = rename.plan(&tagged("f-1", json!({}))).unwrap().unwrap();
        assert!(delete.is_empty());
        assert_eq!(create.get("Env"), Some("dev"));
    }

    #[test]
    fn rename_writes_one_resource_at_a_time() {
        let cloud = TagCloud::default();
        let settings = settings();
        let mode = PolicyMode::Pull;
        let action = build_rename(
            &json!({"old_key": "env", "new_key": "Env"}),
            &build_context(ResourceType::SmnTopic, &mode, &settings),
        )
        .unwrap();
        let ctx = run_context(&cloud, &settings, ResourceType::SmnTopic, None);
        let report = action
            .process(&ctx, &[tagged("t-1", json!({"env": "prod"})), tagged("t-2", json!({"env": "dev"}))])
            .unwrap();
        assert_eq!(report.succeeded, vec!["t-1", "t-2"]);
        let calls = cloud.calls();
        assert_eq!(calls.len(), 4);
        assert!(matches!(&calls[0], TagCall::Delete { ids, .. } if ids == &["t-1"]));
        assert!(matches!(&calls[3], TagCall::Create { tags, .. } if tags.get("Env") == Some("dev")));
    }

    // ── normalize-tag ──────────────────────────────────────────────────────

    #[test]
    fn normalize_rules_rewrite_values() {
        assert_eq!(Normalize::Upper.apply("prod"), Some("PROD".to_string()));
        assert_eq!(Normalize::Lower.apply("prod"), None);
        assert_eq!(Normalize::Title.apply("team alpha-one"), Some("Team Alpha-One".to_string()));
        assert_eq!(Normalize::Strip("*".to_string()).apply("**prod*"), Some("prod".to_string()));
        assert_eq!(Normalize::Strip("*".to_string()).apply("prod"), None);
        let replace = Normalize::Replace {
            from: "_".to_string(),
            to: "-".to_string(),
        };
        assert_eq!(replace.apply("team_a_b"), Some("team-a-b".to_string()));
    }

    #[test]
    fn normalize_only_touches_the_named_value() {
        let normalize = NormalizeTag {
            key: "Env".to_string(),
            value: Some("prod".to_string()),
            rule: Normalize::Upper,
        };
        assert!(normalize.plan(&tagged("a", json!({"Env": "dev"}))).unwrap().is_none());
        let (delete, create) = normalize.plan(&tagged("b", json!({"Env": "prod"}))).unwrap().unwrap();
        assert_eq!(delete, vec!["Env"]);
        assert_eq!(create.get("Env"), Some("PROD"));
        assert!(normalize.plan(&tagged("c", json!({}))).is_err());
    }

    #[test]
    fn normalize_options_are_checked() {
        let settings = settings();
        let mode = PolicyMode::Pull;
        let ctx = build_context(ResourceType::ElbListener, &mode, &settings);
        assert!(build_normalize(&json!({"key": "Env", "action": "strip"}), &ctx).is_err());
        assert!(build_normalize(&json!({"key": "Env", "action": "replace", "old_sub_str": "_"}), &ctx).is_err());
        assert!(build_normalize(&json!({"key": "Env", "action": "reverse"}), &ctx).is_err());
        assert!(build_normalize(&json!({"key": "Env", "action": "lower"}), &ctx).is_ok());
    }

    // ── tag-trim ───────────────────────────────────────────────────────────

    fn many_tags(n: usize) -> Value {
        let map: serde_json::Map<String, Value> = (0..n).map(|i| (format!("k{i:02}"), json!("v"))).collect();
        Value::Object(map)
    }

    #[test]
    fn trim_frees_the_requested_space() {
        let trim = TrimTags {
            space: 3,
            preserve: vec!["k00".to_string()],
        };
        let (delete, _) = trim.plan(&tagged("a", many_tags(19))).unwrap().unwrap();
        assert_eq!(delete, vec!["k01", "k02"]);
        assert!(trim.plan(&tagged("b", many_tags(17))).unwrap().is_none());
    }

    #[test]
    fn trim_fails_when_preserved_keys_leave_too_little() {
        let trim = TrimTags {
            space: 20,
            preserve: vec!["k00".to_string()],
        };
        assert!(trim.plan(&tagged("a", many_tags(1))).is_err());
    }

    // ── mark-for-op ────────────────────────────────────────────────────────

    #[test]
    fn action_dates_round_trip_through_zones() {
        let zone = MarkZone::parse("+08:00").unwrap();
        let due = at("2025-03-01T20:30:00Z");
        let written = format_action_date(due, true, &zone);
        assert_eq!(written, "2025-03-02-04-30-+08:00");
        assert_eq!(parse_action_date(&written, &MarkZone::utc()), Some(due));

        let day = format_action_date(due, false, &MarkZone::utc());
        assert_eq!(day, "2025-03-01");
        assert_eq!(parse_action_date(&day, &MarkZone::utc()).unwrap().hour(), 0);
        assert!(parse_action_date("soon", &MarkZone::utc()).is_none());
    }

    #[test]
    fn negative_offsets_survive_the_dash_split() {
        let zone = MarkZone::parse("-05:00").unwrap();
        let due = at("2025-03-01T12:00:00Z");
        let written = format_action_date(due, true, &zone);
        assert_eq!(written, "2025-03-01-07-00--05:00");
        assert_eq!(parse_action_date(&written, &MarkZone::utc()), Some(due));
    }

    #[test]
    fn mark_message_names_the_op_and_date() {
        let settings = settings();
        let mode = PolicyMode::Pull;
        let ctx = build_context(ResourceType::Functiongraph, &mode, &settings);
        assert!(build_mark_for_op(&json!({"op": "reboot"}), &ctx).is_err());
        assert!(build_mark_for_op(&json!({"days": 2}), &ctx).is_err());
        assert!(build_mark_for_op(&json!({"op": "delete-function", "tz": "mars"}), &ctx).is_err());

        let mark = MarkForOp {
            tag: DEFAULT_MARK_TAG.to_string(),
            message: DEFAULT_MARK_MESSAGE.to_string(),
            op: "delete-function".to_string(),
            days: DEFAULT_MARK_DAYS,
            hours: 0.0,
            zone: MarkZone::utc(),
        };
        assert_eq!(mark.tag_value(at("2025-03-01T10:00:00Z")), "delete-function_2025-03-05");
    }

    #[test]
    fn mark_for_op_writes_one_batched_tag() {
        let cloud = TagCloud::default();
        let settings = settings();
        let mode = PolicyMode::Pull;
        let action = build_mark_for_op(
            &json!({"op": "delete-function", "days": 1}),
            &build_context(ResourceType::Functiongraph, &mode, &settings),
        )
        .unwrap();
        let ctx = run_context(&cloud, &settings, ResourceType::Functiongraph, None);
        let report = action
            .process(&ctx, &[tagged("f-1", json!({})), tagged("f-2", json!({}))])
            .unwrap();
        assert_eq!(report.succeeded.len(), 2);
        let value = report.tags.get(DEFAULT_MARK_TAG).unwrap();
        assert!(value.starts_with("delete-function_"));
        assert_eq!(cloud.calls().len(), 1);
    }
}
