//! Canned sandbox clouds and events.
//!
//! All data is fictional. Ids are short and readable so scenario output
//! and test assertions can name them directly.

use serde_json::json;

use cirrus_contracts::{
    event::{CloudEvent, EventUser},
    resource::ResourceType,
};

use crate::cloud::InMemoryCloud;

pub const REGION: &str = "cn-north-4";

pub fn function_urn(name: &str) -> String {
    format!("urn:fss:{REGION}:0a1b2c:function:default:{name}:latest")
}

pub fn topic_urn(name: &str) -> String {
    format!("urn:smn:{REGION}:0a1b2c:{name}")
}

// ── Functions and their network ─────────────────────────────────────────────

/// Three VPC functions over one subnet and three security groups.
///
/// - `fn-billing`: subnet, group and function all tagged `Env=prod`.
/// - `fn-reports`: prod subnet and function, but a `dev` security group.
/// - `fn-ingest`:  prod subnet and function, plus the shared infra group
///   tagged `Team=Infra`.
///
/// `fn-fresh` has no owner tag and no VPC; it is what event scenarios create.
pub fn network_cloud() -> InMemoryCloud {
    let function = |name: &str, sgs: &[&str]| {
        json!({
            "id": name,
            "func_name": name,
            "func_urn": function_urn(name),
            "created_at": "2026-03-02T08:15:00Z",
            "tags": {"Env": "prod"},
            "func_vpc": {"vpc_id": "vpc-core", "subnet_id": "sub-prod", "security_groups": sgs},
        })
    };

    InMemoryCloud::new(REGION)
        .with_resources(
            ResourceType::Functiongraph,
            vec![
                function("fn-billing", &["sg-prod"]),
                function("fn-reports", &["sg-dev"]),
                function("fn-ingest", &["sg-prod", "sg-infra"]),
                json!({
                    "id": "fn-fresh",
                    "func_name": "fn-fresh",
                    "func_urn": function_urn("fn-fresh"),
                    "created_at": "2026-10-14T09:00:00Z",
                }),
            ],
        )
        .with_subnets(vec![json!({"id": "sub-prod", "name": "prod-a", "tags": {"Env": "prod"}})])
        .with_security_groups(vec![
            json!({"id": "sg-prod", "name": "prod-web", "tags": [{"key": "Env", "value": "prod"}]}),
            json!({"id": "sg-dev", "name": "dev-web", "tags": [{"key": "Env", "value": "dev"}]}),
            json!({"id": "sg-infra", "name": "shared-infra", "tags": {"Env": "shared", "Team": "Infra"}}),
        ])
        .with_function_config(
            &function_urn("fn-reports"),
            json!({
                "timeout": 30,
                "handler": "index.handler",
                "memory_size": 256,
                "func_vpc": {"vpc_id": "vpc-core", "subnet_id": "sub-prod", "security_groups": ["sg-dev"]},
            }),
        )
        .with_triggers(
            &function_urn("fn-billing"),
            Some(vec![json!({"trigger_id": "tr-1", "trigger_type_code": "TIMER", "trigger_status": "ACTIVE"})]),
        )
}

// ── Load balancers ───────────────────────────────────────────────────────────

/// Two load balancers and their listeners.
///
/// `lb-edge` has no access logging, an IPv4 EIP and a global EIP. `lb-core`
/// logs to a log group and has no public address. The `elb-access` log
/// group is where unlogged load balancers are pointed.
pub fn elb_cloud() -> InMemoryCloud {
    InMemoryCloud::new(REGION)
        .with_resources(
            ResourceType::ElbLoadbalancer,
            vec![
                json!({
                    "id": "lb-edge",
                    "name": "edge",
                    "created_at": "2025-01-20T10:00:00Z",
                    "vip_subnet_cidr_id": "sub-prod",
                    "eips": [{"eip_id": "eip-1", "eip_address": "203.0.113.7", "ip_version": 4}],
                    "global_eips": [{"global_eip_id": "geip-1"}],
                    "tags": [],
                }),
                json!({
                    "id": "lb-core",
                    "name": "core",
                    "created_at": "2025-06-11T10:00:00Z",
                    "log_group_id": "lg-1",
                    "log_topic_id": "lt-1",
                    "eips": [],
                    "tags": [{"key": "Owner", "value": "platform"}],
                }),
            ],
        )
        .with_resources(
            ResourceType::ElbListener,
            vec![
                json!({"id": "ls-edge-80", "protocol": "HTTP", "default_pool_id": "pool-edge", "loadbalancers": [{"id": "lb-edge"}]}),
                json!({"id": "ls-core-443", "protocol": "HTTPS", "loadbalancers": [{"id": "lb-core"}]}),
            ],
        )
        .with_members("lb-edge", 0)
        .with_members("lb-core", 4)
        .with_log_group(
            json!({"log_group_id": "lg-2", "log_group_name": "elb-access"}),
            vec![json!({"log_stream_id": "lt-2", "log_stream_name": "edge-access"})],
        )
}

// ── Topics ───────────────────────────────────────────────────────────────────

/// One topic open to every account, one restricted to a service, and an
/// alerts topic the scenarios publish to.
pub fn topic_cloud() -> InMemoryCloud {
    let topic = |name: &str| json!({"id": name, "name": name, "topic_urn": topic_urn(name)});
    InMemoryCloud::new(REGION)
        .with_resources(
            ResourceType::SmnTopic,
            vec![topic("orders"), topic("audit-feed"), topic("sec-alerts")],
        )
        .with_access_policy(
            &topic_urn("orders"),
            &json!({
                "Version": "2016-09-07",
                "Statement": [{"Effect": "Allow", "Principal": {"CSP": ["*"]}, "Action": ["SMN:Publish"]}],
            }),
        )
        .with_access_policy(
            &topic_urn("audit-feed"),
            &json!({
                "Version": "2016-09-07",
                "Statement": [{"Effect": "Allow", "Principal": {"Service": ["obs"]}, "Action": ["SMN:Publish"]}],
            }),
        )
        .with_logtanks(&topic_urn("audit-feed"), vec![json!({"id": "lts-1", "log_group_id": "lg-9"})])
}

// ── Events ───────────────────────────────────────────────────────────────────

/// An audit-trail event for `event_name` by IAM user `user`.
pub fn user_event(user: &str, event_name: &str, resource_ids: &[&str]) -> CloudEvent {
    CloudEvent {
        user: EventUser {
            user_type: "IAMUser".to_string(),
            name: Some(user.to_string()),
            principal_id: Some(format!("{user}-principal")),
        },
        source_ip: Some("198.51.100.23".to_string()),
        event_name: Some(event_name.to_string()),
        resource_ids: resource_ids.iter().map(|s| s.to_string()).collect(),
    }
}
