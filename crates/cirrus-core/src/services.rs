//! Service collaborators.
//!
//! Filters and actions never build clients. A session owns one
//! `CloudServices` provider and passes it explicitly to every run; each
//! accessor returns the collaborator for one vendor service. Calls are
//! made once: retry and backoff belong to the collaborator, not here.

use serde_json::{Map, Value};

use cirrus_contracts::{
    error::CirrusResult,
    report::FailedResource,
    resource::{Resource, ResourceType},
    tags::TagSet,
};

/// Fetches already-normalized records per resource type.
pub trait ResourceSource: Send + Sync {
    fn list(&self, resource_type: ResourceType) -> CirrusResult<Vec<Resource>>;
}

/// The tag management service.
///
/// Both calls act on a whole batch and report the resources the service
/// rejected individually. An `Err` means the batch call itself failed.
pub trait TagService: Send + Sync {
    fn create_tags(
        &self,
        tag_resource_type: &str,
        resource_ids: &[String],
        tags: &TagSet,
    ) -> CirrusResult<Vec<FailedResource>>;

    fn delete_tags(
        &self,
        tag_resource_type: &str,
        resource_ids: &[String],
        keys: &[String],
    ) -> CirrusResult<Vec<FailedResource>>;
}

/// Subnet and security group lookups.
///
/// Unknown ids are omitted from the result rather than reported as errors.
pub trait NetworkService: Send + Sync {
    fn subnets(&self, ids: &[String]) -> CirrusResult<Vec<Resource>>;
    fn security_groups(&self, ids: &[String]) -> CirrusResult<Vec<Resource>>;
}

/// Whether a listener ACL allows or blocks its IP groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpGroupType {
    White,
    Black,
}

impl IpGroupType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Black => "black",
        }
    }
}

/// Access control binding for one listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerIpGroup {
    pub ipgroup_ids: Vec<String>,
    pub enabled: bool,
    pub group_type: IpGroupType,
}

/// Load balancers, listeners, pools and their public IP bindings.
pub trait LoadBalancerService: Send + Sync {
    fn member_count(&self, loadbalancer_id: &str) -> CirrusResult<usize>;
    fn delete_loadbalancer_cascade(&self, loadbalancer_id: &str) -> CirrusResult<()>;
    fn remove_ipv6_bandwidth(&self, loadbalancer_id: &str) -> CirrusResult<()>;
    fn disassociate_publicip(&self, publicip_id: &str) -> CirrusResult<()>;
    fn disassociate_global_eip(&self, global_eip_id: &str) -> CirrusResult<()>;
    fn delete_pool_cascade(&self, pool_id: &str) -> CirrusResult<()>;
    fn delete_listener_force(&self, listener_id: &str) -> CirrusResult<()>;
    /// Bind access logging of a load balancer to a log group and stream.
    fn create_logtank(&self, loadbalancer_id: &str, log_group_id: &str, log_topic_id: &str)
        -> CirrusResult<()>;
    fn list_ip_groups(&self) -> CirrusResult<Vec<Value>>;
    fn update_listener_ipgroup(&self, listener_id: &str, ipgroup: &ListenerIpGroup) -> CirrusResult<()>;
    /// Forwarding policies attached to a listener.
    fn list_l7_policies(&self, listener_id: &str) -> CirrusResult<Vec<Value>>;
    fn create_redirect_policy(&self, listener_id: &str, redirect_listener_id: &str) -> CirrusResult<()>;
}

/// The log service: log groups, streams and their transfer jobs.
pub trait LogService: Send + Sync {
    fn list_log_groups(&self) -> CirrusResult<Vec<Value>>;
    fn list_log_streams(&self, log_group_id: &str) -> CirrusResult<Vec<Value>>;
    fn list_transfers(&self) -> CirrusResult<Vec<Value>>;
    fn create_transfer(&self, transfer: &Value) -> CirrusResult<()>;
}

/// One function invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub body: Value,
    pub asynchronous: bool,
    /// `tail` returns the invocation log with the result.
    pub log_type: Option<String>,
    pub request_version: String,
}

/// Serverless functions.
pub trait FunctionService: Send + Sync {
    /// `None` when the service returned no trigger body at all.
    fn list_triggers(&self, func_urn: &str) -> CirrusResult<Option<Vec<Value>>>;
    fn delete_function(&self, func_urn: &str) -> CirrusResult<()>;
    fn update_max_instances(&self, func_urn: &str, max_instances: i64) -> CirrusResult<()>;
    fn show_function_config(&self, func_urn: &str) -> CirrusResult<Value>;
    fn update_function_config(&self, func_urn: &str, config: &Value) -> CirrusResult<()>;
    /// Reserved instance configurations, one per qualified function URN.
    fn list_reserved_instances(&self, func_urn: &str) -> CirrusResult<Vec<Value>>;
    fn list_versions(&self, func_urn: &str) -> CirrusResult<Vec<Value>>;
    fn list_aliases(&self, func_urn: &str) -> CirrusResult<Vec<Value>>;
    /// Returns the service's response body.
    fn invoke(&self, func_urn: &str, invocation: &Invocation) -> CirrusResult<Value>;
}

/// How a published message is rendered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MessageBody<'a> {
    Text(&'a str),
    /// A JSON document with one message per protocol.
    Structure(&'a str),
    /// A stored template and the variables it is rendered with.
    Template {
        name: &'a str,
        variables: &'a Map<String, Value>,
    },
}

/// The notification service: topics, logtank bindings, publishing.
pub trait NotificationService: Send + Sync {
    /// Publish to one topic; returns the message id.
    fn publish(&self, topic_urn: &str, subject: Option<&str>, body: MessageBody<'_>)
        -> CirrusResult<String>;
    fn delete_topic(&self, topic_urn: &str) -> CirrusResult<()>;
    fn list_logtanks(&self, topic_urn: &str) -> CirrusResult<Vec<Value>>;
    fn create_logtank(&self, topic_urn: &str, log_group_id: &str, log_stream_id: &str)
        -> CirrusResult<()>;
    fn delete_logtank(&self, topic_urn: &str, logtank_id: &str) -> CirrusResult<()>;
    /// The topic's access policy document, as the raw JSON string.
    fn access_policy(&self, topic_urn: &str) -> CirrusResult<Option<String>>;
    /// Replace the access policy. `None` clears it.
    fn update_access_policy(&self, topic_urn: &str, policy: Option<&str>) -> CirrusResult<()>;
    /// Drop every attribute of the topic, the access policy included.
    fn delete_topic_attributes(&self, topic_urn: &str) -> CirrusResult<()>;
}

/// One accessor per vendor service.
pub trait CloudServices: Send + Sync {
    fn region(&self) -> &str;
    fn resources(&self) -> &dyn ResourceSource;
    fn tags(&self) -> &dyn TagService;
    fn network(&self) -> &dyn NetworkService;
    fn load_balancers(&self) -> &dyn LoadBalancerService;
    fn logs(&self) -> &dyn LogService;
    fn functions(&self) -> &dyn FunctionService;
    fn notifications(&self) -> &dyn NotificationService;
}
