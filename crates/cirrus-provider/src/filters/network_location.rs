//! `network-location`: consistency of a key across a resource, its subnets
//! and its security groups.
//!
//! For each compared target the key is resolved on every attachment,
//! producing a value map (attachment id to value) and a value space (the
//! distinct non-empty values). The checks, in order:
//!
//! 1. an attachment without a value, unless `missing-ok`;
//! 2. a value space larger than `max-cardinality`;
//! 3. subnet and security group spaces that differ;
//! 4. a resource value that is absent or outside the attachment spaces,
//!    and security groups whose value differs from the resource's.
//!
//! Under `not-equal` (the default) a resource with findings matches and
//! carries them as the `network-location` annotation. `equal` keeps the
//! resources without findings. `in` keeps resources whose values all fall
//! inside the configured `value` list.

use std::collections::{BTreeSet, HashMap};

use serde_json::{json, Value};
use tracing::debug;

use cirrus_contracts::{
    error::{CirrusError, CirrusResult},
    evaluation::{LocationFinding, LocationReason, ValueMap},
    resource::Resource,
};
use cirrus_core::{
    context::RunContext,
    schema::type_schema,
    traits::Filter,
    value::{is_truthy, render, resolve, resolve_string},
};

use super::{opt_bool, opt_str, opt_strings};
use super::related::Attachment;
use crate::registry::BuildContext;

pub const ANNOTATION: &str = "network-location";

pub fn schema() -> Value {
    type_schema(
        "network-location",
        json!({
            "missing-ok": {"type": "boolean"},
            "match": {"enum": ["equal", "not-equal", "in"]},
            "compare": {
                "type": "array",
                "items": {"enum": ["resource", "subnet", "security-group"]},
            },
            "key": {"type": "string"},
            "max-cardinality": {"type": "integer", "minimum": 0},
            "ignore": {"type": "array", "items": {"type": "object"}},
            "value": {"type": "array", "items": {"type": "string"}},
        }),
        &["key"],
    )
}

pub fn build(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Box<dyn Filter>> {
    let capabilities = ctx.capabilities();
    for required in [Attachment::Subnet, Attachment::SecurityGroup] {
        if !capabilities.has_filter(required.filter_name()) {
            return Err(ctx.reject(format!(
                "network-location requires {} filters to be available",
                required.filter_name()
            )));
        }
    }
    Ok(Box::new(NetworkLocation::from_options(options, ctx)?))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Equal,
    NotEqual,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Compare {
    resource: bool,
    subnet: bool,
    security_group: bool,
}

#[derive(Debug, Clone)]
pub struct NetworkLocation {
    key: String,
    compare: Compare,
    max_cardinality: usize,
    missing_ok: bool,
    mode: MatchMode,
    /// Each entry drops an attachment when any of its pairs matches.
    ignore: Vec<Vec<(String, String)>>,
    allowed: BTreeSet<String>,
}

impl NetworkLocation {
    fn from_options(options: &Value, ctx: &BuildContext<'_>) -> CirrusResult<Self> {
        let key = opt_str(options, "key")
            .ok_or_else(|| ctx.reject("network-location requires 'key'"))?
            .to_string();

        let compare = match opt_strings(options, "compare") {
            Some(targets) => Compare {
                resource: targets.iter().any(|t| t == "resource"),
                subnet: targets.iter().any(|t| t == "subnet"),
                security_group: targets.iter().any(|t| t == "security-group"),
            },
            None => Compare {
                resource: true,
                subnet: true,
                security_group: true,
            },
        };

        let mode = match opt_str(options, "match").unwrap_or("not-equal") {
            "equal" => MatchMode::Equal,
            "not-equal" => MatchMode::NotEqual,
            "in" => MatchMode::In,
            other => return Err(ctx.reject(format!("unknown network-location match '{other}'"))),
        };

        let ignore = options
            .get("ignore")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(Value::as_object)
                    .map(|pairs| pairs.iter().map(|(k, v)| (k.clone(), render(v))).collect())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            key,
            compare,
            max_cardinality: options
                .get("max-cardinality")
                .and_then(Value::as_u64)
                .map_or(1, |n| n as usize),
            missing_ok: opt_bool(options, "missing-ok", false),
            mode,
            ignore,
            allowed: opt_strings(options, "value").unwrap_or_default().into_iter().collect(),
        })
    }

    fn is_ignored(&self, attachment: &Resource) -> bool {
        self.ignore.iter().any(|pairs| {
            pairs
                .iter()
                .any(|(k, v)| resolve_string(attachment, k).as_deref() == Some(v.as_str()))
        })
    }

    fn retained<'a>(&self, attachments: Vec<&'a Resource>) -> Vec<&'a Resource> {
        attachments.into_iter().filter(|a| !self.is_ignored(a)).collect()
    }

    /// Attachment id to value, plus the distinct non-empty values.
    fn values(&self, attachments: &[&Resource]) -> (ValueMap, BTreeSet<String>) {
        let mut map = ValueMap::new();
        let mut space = BTreeSet::new();
        for attachment in attachments {
            let raw = resolve(attachment, &self.key);
            if let Some(v) = raw.as_ref().filter(|v| is_truthy(v)) {
                space.insert(render(v));
            }
            map.insert(attachment.id().to_string(), raw.as_ref().map(render));
        }
        (map, space)
    }

    fn has_absent(&self, map: &ValueMap) -> bool {
        !self.missing_ok && map.values().any(Option::is_none)
    }

    /// Findings for one resource under `equal` / `not-equal`.
    pub fn evaluate(
        &self,
        resource: &Resource,
        subnets: &[&Resource],
        groups: &[&Resource],
    ) -> Vec<LocationFinding> {
        let mut findings = Vec::new();
        let (subnet_values, subnet_space) = self.values(subnets);
        let (group_values, group_space) = self.values(groups);

        if self.compare.subnet {
            if self.has_absent(&subnet_values) {
                findings.push(
                    LocationFinding::new(LocationReason::SubnetLocationAbsent).with_subnets(&subnet_values),
                );
            }
            if subnet_space.len() > self.max_cardinality {
                findings.push(
                    LocationFinding::new(LocationReason::SubnetLocationCardinality)
                        .with_subnets(&subnet_values),
                );
            }
        }

        if self.compare.security_group {
            if self.has_absent(&group_values) {
                findings.push(
                    LocationFinding::new(LocationReason::SecurityGroupLocationAbsent)
                        .with_security_groups(&group_values),
                );
            }
            if group_space.len() > self.max_cardinality {
                findings.push(
                    LocationFinding::new(LocationReason::SecurityGroupLocationCardinality)
                        .with_security_groups(&group_values),
                );
            }
        }

        if self.compare.subnet && self.compare.security_group && subnet_space != group_space {
            findings.push(
                LocationFinding::new(LocationReason::LocationMismatch)
                    .with_subnets(&subnet_values)
                    .with_security_groups(&group_values),
            );
        }

        if self.compare.resource {
            let own = resolve_string(resource, &self.key);
            let outside = |space: &BTreeSet<String>| own.as_ref().map_or(true, |v| !space.contains(v));

            if !self.missing_ok && own.is_none() {
                findings.push(
                    LocationFinding::new(LocationReason::ResourceLocationAbsent).with_resource(None),
                );
            } else if self.compare.security_group && !groups.is_empty() && outside(&group_space) {
                findings.push(
                    LocationFinding::new(LocationReason::ResourceLocationMismatch)
                        .with_resource(own.as_deref())
                        .with_security_groups(&group_values),
                );
            } else if self.compare.subnet && !subnets.is_empty() && outside(&subnet_space) {
                findings.push(
                    LocationFinding::new(LocationReason::ResourceLocationMismatch)
                        .with_resource(own.as_deref())
                        .with_subnets(&subnet_values),
                );
            }

            if self.compare.security_group && !groups.is_empty() {
                let mismatched: ValueMap = group_values
                    .iter()
                    .filter(|(_, v)| **v != own)
                    .map(|(id, v)| (id.clone(), v.clone()))
                    .collect();
                if !mismatched.is_empty() {
                    findings.push(
                        LocationFinding::new(LocationReason::SecurityGroupMismatch)
                            .with_resource(own.as_deref())
                            .with_security_groups(&mismatched),
                    );
                }
            }
        }

        findings
    }

    /// Whether every compared value lies inside the configured `value` list.
    pub fn within_allowed(
        &self,
        resource: &Resource,
        subnets: &[&Resource],
        groups: &[&Resource],
    ) -> bool {
        for (compared, attachments) in [
            (self.compare.subnet, subnets),
            (self.compare.security_group, groups),
        ] {
            if !compared {
                continue;
            }
            let (map, space) = self.values(attachments);
            if self.has_absent(&map) || !space.is_subset(&self.allowed) {
                return false;
            }
        }
        if self.compare.resource {
            return resolve_string(resource, &self.key).is_some_and(|v| self.allowed.contains(&v));
        }
        true
    }
}

impl Filter for NetworkLocation {
    fn name(&self) -> &str {
        "network-location"
    }

    fn process(&self, ctx: &RunContext<'_>, resources: Vec<Resource>) -> CirrusResult<Vec<Resource>> {
        let fetch = |compared: bool, attachment: Attachment| -> CirrusResult<HashMap<String, Resource>> {
            if compared {
                attachment.fetch(ctx, &resources)
            } else {
                Ok(HashMap::new())
            }
        };
        let related_subnets = fetch(self.compare.subnet, Attachment::Subnet)?;
        let related_groups = fetch(self.compare.security_group, Attachment::SecurityGroup)?;

        let mut kept = Vec::new();
        for mut resource in resources {
            let subnets = self.retained(Attachment::Subnet.resolve(
                ctx.resource_type,
                &resource,
                &related_subnets,
            ));
            let groups = self.retained(Attachment::SecurityGroup.resolve(
                ctx.resource_type,
                &resource,
                &related_groups,
            ));

            let keep = match self.mode {
                MatchMode::In => self.within_allowed(&resource, &subnets, &groups),
                MatchMode::Equal => self.evaluate(&resource, &subnets, &groups).is_empty(),
                MatchMode::NotEqual => {
                    let findings = self.evaluate(&resource, &subnets, &groups);
                    if findings.is_empty() {
                        false
                    } else {
                        let encoded = serde_json::to_value(&findings).map_err(|e| {
                            CirrusError::Execution {
                                reason: format!("failed to encode network-location findings: {e}"),
                            }
                        })?;
                        resource.annotate(ANNOTATION, encoded);
                        true
                    }
                }
            };
            debug!(
                policy = ctx.policy,
                resource_id = %resource.id(),
                subnets = subnets.len(),
                security_groups = groups.len(),
                matched = keep,
                "evaluated network location"
            );
            if keep {
                kept.push(resource);
            }
        }
        Ok(kept)
    }
}
