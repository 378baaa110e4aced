//! Filter implementations.

pub mod age;
pub mod coc;
pub mod elb;
pub mod function;
pub mod marked_for_op;
pub mod network_location;
pub mod related;
pub mod smn;
pub mod tag_count;
pub mod value;

use cirrus_contracts::{error::CirrusResult, resource::Resource};
use cirrus_core::{context::RunContext, traits::Filter};

pub(crate) use crate::options::{opt_bool, opt_f64, opt_str, opt_strings};

/// A filter that keeps every resource satisfying a pure predicate.
pub(crate) struct Predicate<F> {
    name: &'static str,
    test: F,
}

pub(crate) fn predicate<F>(name: &'static str, test: F) -> Box<dyn Filter>
where
    F: Fn(&Resource) -> bool + Send + Sync + 'static,
{
    Box::new(Predicate { name, test })
}

impl<F> Filter for Predicate<F>
where
    F: Fn(&Resource) -> bool + Send + Sync,
{
    fn name(&self) -> &str {
        self.name
    }

    fn process(&self, _ctx: &RunContext<'_>, resources: Vec<Resource>) -> CirrusResult<Vec<Resource>> {
        Ok(resources.into_iter().filter(|r| (self.test)(r)).collect())
    }
}
