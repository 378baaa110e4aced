//! `age`: compare how long ago a resource was created.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{json, Value};

use cirrus_contracts::{error::CirrusResult, resource::Resource};
use cirrus_core::{
    schema::{comparison_operators, type_schema},
    traits::Filter,
    value_filter::Op,
};

use super::{opt_f64, predicate};
use crate::registry::BuildContext;

const DATE_FIELD: &str = "created_at";

pub fn schema() -> Value {
    type_schema(
        "age",
        json!({
            "op": comparison_operators(),
            "days": {"type": "number"},
            "hours": {"type": "number"},
            "minutes": {"type": "number"},
        }),
        &[],
    )
}

pub fn build(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Filter>> {
    let op = Op::from_options(options, Op::Gte).map_err(|e| ctx.reject(e.reason()))?;
    let seconds = opt_f64(options, "days", 0.0) * 86_400.0
        + opt_f64(options, "hours", 0.0) * 3_600.0
        + opt_f64(options, "minutes", 0.0) * 60.0;
    Ok(predicate("age", move |r| {
        let age = Utc::now() - created_at(r);
        op.compare_numbers(age.num_seconds() as f64, seconds)
    }))
}

/// The resource's creation time. Missing or unparseable dates fall back to
/// the start of 2000, so such resources always count as old.
pub(crate) fn created_at(resource: &Resource) -> DateTime<Utc> {
    resource
        .str_field(DATE_FIELD)
        .and_then(parse_date)
        .unwrap_or_else(fallback_date)
}

pub(crate) fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn fallback_date() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|d| d.and_hms_opt(1, 1, 1))
        .map(|naive| naive.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
