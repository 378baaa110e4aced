//! Network-location findings.
//!
//! The network-location filter records why a resource's network placement
//! is inconsistent as an ordered list of `LocationFinding`s, attached to the
//! resource under the `network-location` annotation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Attachment id → the value resolved on that attachment (`None` = absent).
pub type ValueMap = BTreeMap<String, Option<String>>;

/// Why a resource's network location is inconsistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocationReason {
    SubnetLocationAbsent,
    SubnetLocationCardinality,
    SecurityGroupLocationAbsent,
    SecurityGroupLocationCardinality,
    LocationMismatch,
    ResourceLocationAbsent,
    ResourceLocationMismatch,
    SecurityGroupMismatch,
}

/// One inconsistency, paired with the values that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationFinding {
    pub reason: LocationReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnets: Option<ValueMap>,
    #[serde(
        default,
        rename = "security-groups",
        skip_serializing_if = "Option::is_none"
    )]
    pub security_groups: Option<ValueMap>,
    /// The resource's own value. Present only for resource-level reasons.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Option<String>>,
}

impl LocationFinding {
    pub fn new(reason: LocationReason) -> Self {
        Self {
            reason,
            subnets: None,
            security_groups: None,
            resource: None,
        }
    }

    pub fn with_subnets(mut self, subnets: &ValueMap) -> Self {
        self.subnets = Some(subnets.clone());
        self
    }

    pub fn with_security_groups(mut self, groups: &ValueMap) -> Self {
        self.security_groups = Some(groups.clone());
        self
    }

    pub fn with_resource(mut self, value: Option<&str>) -> Self {
        self.resource = Some(value.map(str::to_string));
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn finding_serializes_only_populated_maps() {
        let groups: ValueMap = [("sg-1".to_string(), Some("dev".to_string()))].into();
        let finding = LocationFinding::new(LocationReason::SecurityGroupMismatch)
            .with_security_groups(&groups)
            .with_resource(Some("prod"));

        let encoded = serde_json::to_value(&finding).unwrap();
        assert_eq!(
            encoded,
            json!({
                "reason": "SecurityGroupMismatch",
                "security-groups": {"sg-1": "dev"},
                "resource": "prod"
            })
        );
    }

    #[test]
    fn absent_values_serialize_as_null() {
        let subnets: ValueMap = [("subnet-1".to_string(), None)].into();
        let finding =
            LocationFinding::new(LocationReason::SubnetLocationAbsent).with_subnets(&subnets);
        let encoded = serde_json::to_value(&finding).unwrap();
        assert_eq!(encoded["subnets"]["subnet-1"], json!(null));
    }
}
