//! Related-resource filters: `subnet` and `security-group`.
//!
//! A resource's network attachments are looked up through the network
//! service, once per batch, and tested with an embedded value predicate:
//!
//! ```toml
//! [[policies.filters]]
//! type = "security-group"
//! key = "tag:Team"
//! value = "Infra"
//! operator = "and"
//! ```

use std::collections::HashMap;

use serde_json::{json, Value};
use tracing::debug;

use cirrus_contracts::{
    error::CirrusResult,
    resource::{Resource, ResourceType},
};
use cirrus_core::{
    context::RunContext,
    schema::{type_schema, value_properties},
    traits::Filter,
    value::string_list,
    value_filter::ValueFilter,
};

use super::opt_str;
use crate::registry::BuildContext;

/// The two kinds of network attachment a resource can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    Subnet,
    SecurityGroup,
}

impl Attachment {
    pub fn filter_name(self) -> &'static str {
        match self {
            Self::Subnet => "subnet",
            Self::SecurityGroup => "security-group",
        }
    }

    fn annotation_key(self) -> &'static str {
        match self {
            Self::Subnet => "matched-subnets",
            Self::SecurityGroup => "matched-security-groups",
        }
    }

    /// The fields holding this attachment's ids on a resource of `resource_type`.
    fn id_fields(self, resource_type: ResourceType) -> &'static [&'static str] {
        match (self, resource_type) {
            (Self::Subnet, ResourceType::ElbLoadbalancer) => &["vip_subnet_cidr_id", "elb_virsubnet_ids"],
            (Self::Subnet, ResourceType::Functiongraph) => &["func_vpc.subnet_id"],
            (Self::SecurityGroup, ResourceType::Functiongraph) => &["func_vpc.security_groups"],
            _ => &[],
        }
    }

    /// Attachment ids of one resource, deduplicated, in field order.
    pub fn ids(self, resource_type: ResourceType, resource: &Resource) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for field in self.id_fields(resource_type) {
            for id in string_list(resource, field) {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids
    }

    /// Fetch every attachment referenced by `resources` in a single call.
    ///
    /// Ids the network service does not know are simply missing from the map.
    pub fn fetch(
        self,
        ctx: &RunContext<'_>,
        resources: &[Resource],
    ) -> CirrusResult<HashMap<String, Resource>> {
        let mut ids: Vec<String> = Vec::new();
        for resource in resources {
            for id in self.ids(ctx.resource_type, resource) {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let network = ctx.services.network();
        let found = match self {
            Self::Subnet => network.subnets(&ids)?,
            Self::SecurityGroup => network.security_groups(&ids)?,
        };
        debug!(
            policy = ctx.policy,
            attachment = self.filter_name(),
            requested = ids.len(),
            found = found.len(),
            "queried network attachments"
        );
        Ok(found
            .into_iter()
            .map(|r| (r.id().to_string(), r))
            .collect())
    }

    /// The attachments of `resource` that were found, in id order.
    pub fn resolve<'m>(
        self,
        resource_type: ResourceType,
        resource: &Resource,
        related: &'m HashMap<String, Resource>,
    ) -> Vec<&'m Resource> {
        self.ids(resource_type, resource)
            .iter()
            .filter_map(|id| related.get(id))
            .collect()
    }
}

fn related_schema(name: &str) -> Value {
    let mut properties = value_properties();
    properties["operator"] = json!({"enum": ["or", "and"]});
    type_schema(name, properties, &["key"])
}

pub fn subnet_schema() -> Value {
    related_schema("subnet")
}

pub fn build_subnet(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Filter>> {
    RelatedFilter::build(Attachment::Subnet, options, ctx)
}

pub fn security_group_schema() -> Value {
    related_schema("security-group")
}

pub fn build_security_group(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Filter>> {
    RelatedFilter::build(Attachment::SecurityGroup, options, ctx)
}

struct RelatedFilter {
    attachment: Attachment,
    predicate: ValueFilter,
    /// `operator = "and"`: every attachment must match.
    require_all: bool,
}

impl RelatedFilter {
    fn build(
        attachment: Attachment,
        options: &Value,
        ctx: &BuildContext<'_>,
    ) -> CirrusResult<Box<dyn Filter>> {
        let mut predicate_options = options.clone();
        if let Some(map) = predicate_options.as_object_mut() {
            map.remove("operator");
        }
        let predicate = ValueFilter::from_options(&predicate_options).map_err(|e| ctx.reject(e.reason()))?;
        Ok(Box::new(Self {
            attachment,
            predicate,
            require_all: opt_str(options, "operator") == Some("and"),
        }))
    }
}

impl Filter for RelatedFilter {
    fn name(&self) -> &str {
        self.attachment.filter_name()
    }

    fn process(&self, ctx: &RunContext<'_>, resources: Vec<Resource>) -> CirrusResult<Vec<Resource>> {
        let related = self.attachment.fetch(ctx, &resources)?;
        let mut kept = Vec::new();
        for mut resource in resources {
            let attached = self.attachment.resolve(ctx.resource_type, &resource, &related);
            if attached.is_empty() {
                continue;
            }
            let matched: Vec<String> = attached
                .iter()
                .filter(|a| self.predicate.matches(a))
                .map(|a| a.id().to_string())
                .collect();
            let hit = if self.require_all {
                matched.len() == attached.len()
            } else {
                !matched.is_empty()
            };
            if hit {
                resource.annotate(self.attachment.annotation_key(), json!(matched));
                kept.push(resource);
            }
        }
        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn loadbalancer_subnet_ids_merge_vip_and_member_subnets() {
        let lb = Resource::from_value(json!({
            "id": "lb-1",
            "vip_subnet_cidr_id": "sub-1",
            "elb_virsubnet_ids": ["sub-2", "sub-1"]
        }));
        assert_eq!(
            Attachment::Subnet.ids(ResourceType::ElbLoadbalancer, &lb),
            vec!["sub-1", "sub-2"]
        );
        assert!(Attachment::SecurityGroup
            .ids(ResourceType::ElbLoadbalancer, &lb)
            .is_empty());
    }

    #[test]
    fn function_ids_come_from_the_vpc_block() {
        let func = Resource::from_value(json!({
            "id": "fn-1",
            "func_vpc": {"subnet_id": "sub-1", "security_groups": ["sg-1", "sg-2"]}
        }));
        assert_eq!(Attachment::Subnet.ids(ResourceType::Functiongraph, &func), vec!["sub-1"]);
        assert_eq!(
            Attachment::SecurityGroup.ids(ResourceType::Functiongraph, &func),
            vec!["sg-1", "sg-2"]
        );
    }

    #[test]
    fn function_without_vpc_has_no_attachments() {
        let func = Resource::from_value(json!({"id": "fn-1", "func_vpc": null}));
        assert!(Attachment::Subnet.ids(ResourceType::Functiongraph, &func).is_empty());
    }

    #[test]
    fn schema_accepts_operator() {
        let schema = security_group_schema();
        assert_eq!(schema["properties"]["operator"]["enum"], json!(["or", "and"]));
        assert_eq!(schema["required"], json!(["type", "key"]));
    }
}
