//! The per-run context handed to every filter and action.

use cirrus_contracts::{event::CloudEvent, resource::ResourceType, settings::RunnerSettings};

use crate::services::CloudServices;

/// Everything a filter or action may read while a policy runs.
///
/// Built fresh for every run; nothing in it outlives the run.
#[derive(Clone, Copy)]
pub struct RunContext<'a> {
    pub policy: &'a str,
    pub resource_type: ResourceType,
    pub services: &'a dyn CloudServices,
    pub settings: &'a RunnerSettings,
    /// The triggering event, for event-driven policies.
    pub event: Option<&'a CloudEvent>,
}
