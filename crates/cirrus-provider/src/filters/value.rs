//! The generic `value` filter and its load-balancer alias `attributes`.

use serde_json::Value;

use cirrus_contracts::error::CirrusResult;
use cirrus_core::{
    schema::{type_schema, value_properties},
    traits::Filter,
    value_filter::ValueFilter,
};

use super::predicate;
use crate::registry::BuildContext;

pub fn value_schema() -> Value {
    type_schema("value", value_properties(), &[])
}

pub fn build_value(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Filter>> {
    build_named("value", options, ctx)
}

pub fn attributes_schema() -> Value {
    type_schema("attributes", value_properties(), &["key"])
}

pub fn build_attributes(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Filter>> {
    build_named("attributes", options, ctx)
}

fn build_named(
    name: &'static str,
    options: &Value,
    ctx: &BuildContext<'_>,
) -> CirrusResult<Box<dyn Filter>> {
    let value_filter = ValueFilter::from_options(options).map_err(|e| ctx.reject(e.reason()))?;
    Ok(predicate(name, move |r| value_filter.matches(r)))
}
