//! `marked-for-op`: resources whose `mark-for-op` tag has come due.
//!
//! The tag value is `<op>_<action date>`. A resource matches when the op is
//! the one the filter names and the date, less any skew, has passed.

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use tracing::warn;

use cirrus_contracts::{error::CirrusResult, resource::Resource};
use cirrus_core::{schema::type_schema, tagging::resource_tags, traits::Filter};

use super::{opt_f64, opt_str, predicate};
use crate::actions::tms::{marked_op, parse_action_date, MarkZone, DEFAULT_MARK_TAG};
use crate::registry::BuildContext;

pub fn schema() -> Value {
    type_schema(
        "marked-for-op",
        json!({
            "tag": {"type": "string"},
            "op": {"type": "string"},
            "skew": {"type": "number", "minimum": 0},
            "skew_hours": {"type": "number", "minimum": 0},
            "tz": {"type": "string"},
        }),
        &["op"],
    )
}

pub fn build(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Filter>> {
    let op = marked_op(options, ctx, "marked-for-op")?;
    let zone = MarkZone::from_options(options).map_err(|e| ctx.reject(format!("marked-for-op: {e}")))?;
    let (skew, skew_hours) = (opt_f64(options, "skew", 0.0), opt_f64(options, "skew_hours", 0.0));
    if skew < 0.0 || skew_hours < 0.0 {
        return Err(ctx.reject("marked-for-op 'skew' and 'skew_hours' must not be negative"));
    }
    let due = Due {
        tag: opt_str(options, "tag").unwrap_or(DEFAULT_MARK_TAG).to_string(),
        op,
        skew: Duration::seconds((skew * 86_400.0 + skew_hours * 3_600.0) as i64),
        zone,
    };
    Ok(predicate("marked-for-op", move |r| due.matches(r, Utc::now())))
}

struct Due {
    tag: String,
    op: String,
    skew: Duration,
    zone: MarkZone,
}

impl Due {
    fn matches(&self, resource: &Resource, now: DateTime<Utc>) -> bool {
        let tags = resource_tags(resource);
        let Some(value) = tags.get(&self.tag) else {
            return false;
        };
        let Some((op, date)) = value.split_once('_') else {
            return false;
        };
        if op != self.op {
            return false;
        }
        match parse_action_date(date, &self.zone) {
            Some(action_date) => now >= action_date - self.skew,
            None => {
                warn!(
                    resource_id = %resource.id(),
                    tag = %self.tag,
                    value,
                    "unreadable action date on mark-for-op tag"
                );
                false
            }
        }
    }
}
