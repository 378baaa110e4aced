//! The static capability registry.
//!
//! Every resource type maps to an ordered set of filter and action specs.
//! A spec pairs a name with its option schema and a builder; the policy
//! loader validates each block against the schema, then calls the builder.
//! Nothing is registered at run time.

use serde_json::Value;

use cirrus_contracts::{
    error::{CirrusError, CirrusResult},
    policy::PolicyMode,
    resource::ResourceType,
    settings::RunnerSettings,
};
use cirrus_core::traits::{Action, Filter};

use crate::{actions, filters};

/// What a builder may consult while compiling one block.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    pub policy: &'a str,
    pub resource_type: ResourceType,
    pub mode: &'a PolicyMode,
    pub settings: &'a RunnerSettings,
}

impl BuildContext<'_> {
    pub fn capabilities(&self) -> Capabilities {
        capabilities(self.resource_type)
    }

    /// A `PolicyValidation` error naming this policy.
    pub fn reject(&self, reason: impl std::fmt::Display) -> CirrusError {
        CirrusError::validation(format!(
            "policy '{}' ({}): {reason}",
            self.policy, self.resource_type
        ))
    }
}

pub type FilterBuilder = fn(&Value, &BuildContext<'_>) -> CirrusResult<Box<dyn Filter>>;
pub type ActionBuilder = fn(&Value, &BuildContext<'_>) -> CirrusResult<Box<dyn Action>>;

pub struct FilterSpec {
    pub name: &'static str,
    pub schema: fn() -> Value,
    pub build: FilterBuilder,
}

pub struct ActionSpec {
    pub name: &'static str,
    pub schema: fn() -> Value,
    pub build: ActionBuilder,
}

/// The filters and actions one resource type supports.
#[derive(Clone, Copy)]
pub struct Capabilities {
    pub filters: &'static [FilterSpec],
    pub actions: &'static [ActionSpec],
}

impl Capabilities {
    pub fn filter(&self, name: &str) -> Option<&'static FilterSpec> {
        self.filters.iter().find(|f| f.name == name)
    }

    pub fn action(&self, name: &str) -> Option<&'static ActionSpec> {
        self.actions.iter().find(|a| a.name == name)
    }

    pub fn has_filter(&self, name: &str) -> bool {
        self.filter(name).is_some()
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.action(name).is_some()
    }

    pub fn filter_names(&self) -> impl Iterator<Item = &'static str> {
        self.filters.iter().map(|f| f.name)
    }

    pub fn action_names(&self) -> impl Iterator<Item = &'static str> {
        self.actions.iter().map(|a| a.name)
    }
}

const fn filter(name: &'static str, schema: fn() -> Value, build: FilterBuilder) -> FilterSpec {
    FilterSpec { name, schema, build }
}

const fn action(name: &'static str, schema: fn() -> Value, build: ActionBuilder) -> ActionSpec {
    ActionSpec { name, schema, build }
}

// ── Load balancers ───────────────────────────────────────────────────────────

static LOADBALANCER_FILTERS: &[FilterSpec] = &[
    filter("value", filters::value::value_schema, filters::value::build_value),
    filter("attributes", filters::value::attributes_schema, filters::value::build_attributes),
    filter("age", filters::age::schema, filters::age::build),
    filter("tag-count", filters::tag_count::schema, filters::tag_count::build),
    filter("marked-for-op", filters::marked_for_op::schema, filters::marked_for_op::build),
    filter("publicip-count", filters::elb::publicip_count_schema, filters::elb::build_publicip_count),
    filter("backend-server-count", filters::elb::backend_server_count_schema, filters::elb::build_backend_server_count),
    filter("is-logging", filters::elb::is_logging_schema, filters::elb::build_is_logging),
    filter("is-not-logging", filters::elb::is_not_logging_schema, filters::elb::build_is_not_logging),
    filter("is-lts-log-transfer", filters::elb::is_lts_log_transfer_schema, filters::elb::build_is_lts_log_transfer),
    filter("is-not-lts-log-transfer", filters::elb::is_not_lts_log_transfer_schema, filters::elb::build_is_not_lts_log_transfer),
    filter("subnet", filters::related::subnet_schema, filters::related::build_subnet),
];

static LOADBALANCER_ACTIONS: &[ActionSpec] = &[
    action("tag", actions::tag::tag_schema, actions::tag::build_tag),
    action("mark", actions::tag::mark_schema, actions::tag::build_mark),
    action("remove-tag", actions::tag::remove_tag_schema, actions::tag::build_remove_tag),
    action("unmark", actions::tag::unmark_schema, actions::tag::build_unmark),
    action("untag", actions::tag::untag_schema, actions::tag::build_untag),
    action("rename-tag", actions::tms::rename_schema, actions::tms::build_rename),
    action("normalize-tag", actions::tms::normalize_schema, actions::tms::build_normalize),
    action("tag-trim", actions::tms::trim_schema, actions::tms::build_trim),
    action("mark-for-op", actions::tms::mark_for_op_schema, actions::tms::build_mark_for_op),
    action("auto-tag-user", actions::autotag::schema, actions::autotag::build),
    action("delete", actions::elb::delete_loadbalancer_schema, actions::elb::build_delete_loadbalancer),
    action("unbind-publicips", actions::elb::unbind_publicips_schema, actions::elb::build_unbind_publicips),
    action("enable-logging", actions::elb::enable_logging_schema, actions::elb::build_enable_logging),
    action("create-lts-log-transfer", actions::elb::create_log_transfer_schema, actions::elb::build_create_log_transfer),
    action("notify-message", actions::notify::schema, actions::notify::build),
    action("notify-message-structure", actions::notify::structure_schema, actions::notify::build_structure),
    action("notify-message-template", actions::notify::template_schema, actions::notify::build_template),
];

// ── Listeners ────────────────────────────────────────────────────────────────

static LISTENER_FILTERS: &[FilterSpec] = &[
    filter("value", filters::value::value_schema, filters::value::build_value),
    filter("attributes", filters::value::attributes_schema, filters::value::build_attributes),
    filter("age", filters::age::schema, filters::age::build),
    filter("tag-count", filters::tag_count::schema, filters::tag_count::build),
    filter("marked-for-op", filters::marked_for_op::schema, filters::marked_for_op::build),
    filter("is-redirect-to-https-listener", filters::elb::is_redirect_to_https_schema, filters::elb::build_is_redirect_to_https),
];

static LISTENER_ACTIONS: &[ActionSpec] = &[
    action("tag", actions::tag::tag_schema, actions::tag::build_tag),
    action("mark", actions::tag::mark_schema, actions::tag::build_mark),
    action("remove-tag", actions::tag::remove_tag_schema, actions::tag::build_remove_tag),
    action("unmark", actions::tag::unmark_schema, actions::tag::build_unmark),
    action("untag", actions::tag::untag_schema, actions::tag::build_untag),
    action("rename-tag", actions::tms::rename_schema, actions::tms::build_rename),
    action("normalize-tag", actions::tms::normalize_schema, actions::tms::build_normalize),
    action("tag-trim", actions::tms::trim_schema, actions::tms::build_trim),
    action("mark-for-op", actions::tms::mark_for_op_schema, actions::tms::build_mark_for_op),
    action("auto-tag-user", actions::autotag::schema, actions::autotag::build),
    action("delete", actions::elb::delete_listener_schema, actions::elb::build_delete_listener),
    action("set-acl-ipgroup", actions::elb::set_acl_ipgroup_schema, actions::elb::build_set_acl_ipgroup),
    action("redirect-to-https-listener", actions::elb::redirect_to_https_schema, actions::elb::build_redirect_to_https),
    action("notify-message", actions::notify::schema, actions::notify::build),
    action("notify-message-structure", actions::notify::structure_schema, actions::notify::build_structure),
    action("notify-message-template", actions::notify::template_schema, actions::notify::build_template),
];

// ── Functions ────────────────────────────────────────────────────────────────

static FUNCTION_FILTERS: &[FilterSpec] = &[
    filter("value", filters::value::value_schema, filters::value::build_value),
    filter("tag-count", filters::tag_count::schema, filters::tag_count::build),
    filter("marked-for-op", filters::marked_for_op::schema, filters::marked_for_op::build),
    filter("trigger-type", filters::function::trigger_type_schema, filters::function::build_trigger_type),
    filter("reserved-concurrency", filters::function::reserved_concurrency_schema, filters::function::build_reserved_concurrency),
    filter("subnet", filters::related::subnet_schema, filters::related::build_subnet),
    filter("security-group", filters::related::security_group_schema, filters::related::build_security_group),
    filter("network-location", filters::network_location::schema, filters::network_location::build),
];

static FUNCTION_ACTIONS: &[ActionSpec] = &[
    action("tag", actions::tag::tag_schema, actions::tag::build_tag),
    action("mark", actions::tag::mark_schema, actions::tag::build_mark),
    action("remove-tag", actions::tag::remove_tag_schema, actions::tag::build_remove_tag),
    action("unmark", actions::tag::unmark_schema, actions::tag::build_unmark),
    action("untag", actions::tag::untag_schema, actions::tag::build_untag),
    action("rename-tag", actions::tms::rename_schema, actions::tms::build_rename),
    action("normalize-tag", actions::tms::normalize_schema, actions::tms::build_normalize),
    action("tag-trim", actions::tms::trim_schema, actions::tms::build_trim),
    action("mark-for-op", actions::tms::mark_for_op_schema, actions::tms::build_mark_for_op),
    action("auto-tag-user", actions::autotag::schema, actions::autotag::build),
    action("delete-function", actions::function::delete_function_schema, actions::function::build_delete_function),
    action("update-function-concurrency", actions::function::update_concurrency_schema, actions::function::build_update_concurrency),
    action("modify-security-groups", actions::function::modify_security_groups_schema, actions::function::build_modify_security_groups),
    action("show-function-config", actions::function::show_config_schema, actions::function::build_show_config),
    action("update-function-config", actions::function::update_config_schema, actions::function::build_update_config),
    action("trim-versions", actions::function::trim_versions_schema, actions::function::build_trim_versions),
    action("invoke-function", actions::function::invoke_schema, actions::function::build_invoke),
    action("notify-message", actions::notify::schema, actions::notify::build),
    action("notify-message-structure", actions::notify::structure_schema, actions::notify::build_structure),
    action("notify-message-template", actions::notify::template_schema, actions::notify::build_template),
];

// ── Operations center ────────────────────────────────────────────────────────

static PATCH_FILTERS: &[FilterSpec] = &[filter("value", filters::value::value_schema, filters::value::build_value)];

static PATCH_ACTIONS: &[ActionSpec] = &[
    action("patch-non-compliant-alarm", actions::coc::patch_non_compliant_alarm_schema, actions::coc::build_patch_non_compliant_alarm),
    action("patch_non_compliant_alarm", actions::coc::patch_non_compliant_alarm_legacy_schema, actions::coc::build_patch_non_compliant_alarm_legacy),
];

static SCRIPT_FILTERS: &[FilterSpec] = &[
    filter("value", filters::value::value_schema, filters::value::build_value),
    filter("script-non-reviewer", filters::coc::script_non_reviewer_schema, filters::coc::build_script_non_reviewer),
    filter("script_non_reviewer", filters::coc::script_non_reviewer_legacy_schema, filters::coc::build_script_non_reviewer_legacy),
];

static SCRIPT_ACTIONS: &[ActionSpec] = &[
    action("script-non-reviewer-alarm", actions::coc::script_non_reviewer_alarm_schema, actions::coc::build_script_non_reviewer_alarm),
    action("script_non_reviewer_alarm", actions::coc::script_non_reviewer_alarm_legacy_schema, actions::coc::build_script_non_reviewer_alarm_legacy),
];

// ── Topics ───────────────────────────────────────────────────────────────────

static TOPIC_FILTERS: &[FilterSpec] = &[
    filter("value", filters::value::value_schema, filters::value::build_value),
    filter("tag-count", filters::tag_count::schema, filters::tag_count::build),
    filter("marked-for-op", filters::marked_for_op::schema, filters::marked_for_op::build),
    filter("topic-lts", filters::smn::topic_lts_schema, filters::smn::build_topic_lts),
    filter("topic-access", filters::smn::topic_access_schema, filters::smn::build_topic_access),
];

static TOPIC_ACTIONS: &[ActionSpec] = &[
    action("tag", actions::tag::tag_schema, actions::tag::build_tag),
    action("mark", actions::tag::mark_schema, actions::tag::build_mark),
    action("remove-tag", actions::tag::remove_tag_schema, actions::tag::build_remove_tag),
    action("unmark", actions::tag::unmark_schema, actions::tag::build_unmark),
    action("untag", actions::tag::untag_schema, actions::tag::build_untag),
    action("rename-tag", actions::tms::rename_schema, actions::tms::build_rename),
    action("normalize-tag", actions::tms::normalize_schema, actions::tms::build_normalize),
    action("tag-trim", actions::tms::trim_schema, actions::tms::build_trim),
    action("mark-for-op", actions::tms::mark_for_op_schema, actions::tms::build_mark_for_op),
    action("auto-tag-user", actions::autotag::schema, actions::autotag::build),
    action("delete", actions::smn::delete_topic_schema, actions::smn::build_delete_topic),
    action("create-lts", actions::smn::create_lts_schema, actions::smn::build_create_lts),
    action("delete-lts", actions::smn::delete_lts_schema, actions::smn::build_delete_lts),
    action("update-access", actions::smn::update_access_schema, actions::smn::build_update_access),
    action("delete-access", actions::smn::delete_access_schema, actions::smn::build_delete_access),
    action("delete-allow-all-user-access", actions::smn::delete_allow_all_schema, actions::smn::build_delete_allow_all),
    action("notify-message", actions::notify::schema, actions::notify::build),
    action("notify-message-structure", actions::notify::structure_schema, actions::notify::build_structure),
    action("notify-message-template", actions::notify::template_schema, actions::notify::build_template),
];

/// The capability set registered for `resource_type`.
pub fn capabilities(resource_type: ResourceType) -> Capabilities {
    let (filters, actions) = match resource_type {
        ResourceType::ElbLoadbalancer => (LOADBALANCER_FILTERS, LOADBALANCER_ACTIONS),
        ResourceType::ElbListener => (LISTENER_FILTERS, LISTENER_ACTIONS),
        ResourceType::Functiongraph => (FUNCTION_FILTERS, FUNCTION_ACTIONS),
        ResourceType::CocPatch => (PATCH_FILTERS, PATCH_ACTIONS),
        ResourceType::CocScript => (SCRIPT_FILTERS, SCRIPT_ACTIONS),
        ResourceType::SmnTopic => (TOPIC_FILTERS, TOPIC_ACTIONS),
    };
    Capabilities { filters, actions }
}
