//! `tag-count`: compare the number of user tags on a resource.

use serde_json::{json, Value};

use cirrus_contracts::error::CirrusResult;
use cirrus_core::{
    schema::{comparison_operators, type_schema},
    tagging::resource_tags,
    traits::Filter,
    value_filter::Op,
};

use super::{opt_f64, predicate};
use crate::registry::BuildContext;

/// Keys with this prefix are managed by the cloud and never counted.
const SYSTEM_TAG_PREFIX: &str = "_sys";

pub fn schema() -> Value {
    type_schema(
        "tag-count",
        json!({
            "count": {"type": "integer", "minimum": 0},
            "op": comparison_operators(),
        }),
        &[],
    )
}

pub fn build(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Filter>> {
    let op = Op::from_options(options, Op::Gte).map_err(|e| ctx.reject(e.reason()))?;
    let count = opt_f64(options, "count", 5.0);
    Ok(predicate("tag-count", move |r| {
        let user_tags = resource_tags(r)
            .keys()
            .filter(|k| !k.starts_with(SYSTEM_TAG_PREFIX))
            .count();
        op.compare_numbers(user_tags as f64, count)
    }))
}
