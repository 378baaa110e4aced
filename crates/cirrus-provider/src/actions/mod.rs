//! Action implementations.

pub mod autotag;
pub mod coc;
pub mod elb;
pub mod function;
pub mod notify;
pub mod smn;
pub mod tag;
pub mod tms;

use tracing::{debug, info, warn};

use cirrus_contracts::{
    error::CirrusResult,
    report::ActionReport,
    resource::Resource,
};
use cirrus_core::context::RunContext;

/// What a per-resource step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    Done,
    Skipped,
    /// The resource cannot be acted on; recorded as a failure.
    Refused(String),
}

/// Run one step per resource.
///
/// Completed resources are logged and recorded as succeeded, refused ones as
/// failed. The first step that errors ends the action and its error is
/// returned.
pub(crate) fn per_resource<F>(
    ctx: &RunContext<'_>,
    action: &str,
    resources: &[Resource],
    mut call: F,
) -> CirrusResult<ActionReport>
where
    F: FnMut(&Resource) -> CirrusResult<Step>,
{
    let mut report = ActionReport::new(action);
    for resource in resources {
        let step = match call(resource) {
            Ok(step) => step,
            Err(e) => {
                warn!(
                    policy = ctx.policy,
                    action,
                    resource_id = %resource.id(),
                    error = %e,
                    "action failed"
                );
                return Err(e);
            }
        };
        match step {
            Step::Done => {
                info!(
                    policy = ctx.policy,
                    action,
                    resource_type = %ctx.resource_type,
                    resource_id = %resource.id(),
                    "action succeeded"
                );
                report.success(resource.id());
            }
            Step::Skipped => {
                debug!(policy = ctx.policy, action, resource_id = %resource.id(), "resource skipped");
            }
            Step::Refused(reason) => {
                warn!(policy = ctx.policy, action, resource_id = %resource.id(), %reason, "resource refused");
                report.failure(resource.id(), reason);
            }
        }
    }
    Ok(report)
}
