//! Resource types and resource records.
//!
//! A `Resource` is what the fetch collaborator hands back: an already
//! normalized JSON record. Filters read it, never reshape it, and leave
//! their findings in a separate annotation map so the vendor record stays
//! intact.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CirrusError;

/// The resource types this plugin registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceType {
    ElbLoadbalancer,
    ElbListener,
    Functiongraph,
    CocPatch,
    CocScript,
    SmnTopic,
}

impl ResourceType {
    pub const ALL: [ResourceType; 6] = [
        ResourceType::ElbLoadbalancer,
        ResourceType::ElbListener,
        ResourceType::Functiongraph,
        ResourceType::CocPatch,
        ResourceType::CocScript,
        ResourceType::SmnTopic,
    ];

    /// The name used in policy documents.
    pub fn name(self) -> &'static str {
        match self {
            Self::ElbLoadbalancer => "elb-loadbalancer",
            Self::ElbListener => "elb-listener",
            Self::Functiongraph => "functiongraph",
            Self::CocPatch => "coc-patch",
            Self::CocScript => "coc-script",
            Self::SmnTopic => "smn-topic",
        }
    }

    /// The resource type the tag service expects, if the type is taggable.
    pub fn tag_resource_type(self) -> Option<&'static str> {
        match self {
            Self::ElbLoadbalancer => Some("loadbalancers"),
            Self::ElbListener => Some("listeners"),
            Self::Functiongraph => Some("functions"),
            Self::SmnTopic => Some("smn_topic"),
            Self::CocPatch | Self::CocScript => None,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResourceType {
    type Err = CirrusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|rt| rt.name() == s)
            .ok_or_else(|| CirrusError::validation(format!("unknown resource type '{s}'")))
    }
}

/// A fetched resource record plus the annotations filters attached to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// The vendor record, unchanged apart from tag writes.
    #[serde(flatten)]
    pub data: Map<String, Value>,
    /// Filter findings, keyed by filter name.
    #[serde(default, rename = "cirrus:annotations", skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, Value>,
}

impl Resource {
    /// Wrap a JSON value. Non-object values yield an empty record.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(data) => Self {
                data,
                annotations: BTreeMap::new(),
            },
            _ => Self::default(),
        }
    }

    /// The `id` field as a string, or `""` when missing.
    pub fn id(&self) -> &str {
        self.str_field("id").unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    pub fn annotate(&mut self, key: impl Into<String>, value: Value) {
        self.annotations.insert(key.into(), value);
    }

    pub fn annotation(&self, key: &str) -> Option<&Value> {
        self.annotations.get(key)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn resource_type_names_round_trip() {
        for rt in ResourceType::ALL {
            assert_eq!(rt.name().parse::<ResourceType>().unwrap(), rt);
            let encoded = serde_json::to_value(rt).unwrap();
            assert_eq!(encoded, json!(rt.name()));
        }
    }

    #[test]
    fn unknown_resource_type_is_a_validation_error() {
        let err = "ecs".parse::<ResourceType>().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("ecs"));
    }

    #[test]
    fn coc_types_are_not_taggable() {
        assert_eq!(ResourceType::CocPatch.tag_resource_type(), None);
        assert_eq!(ResourceType::CocScript.tag_resource_type(), None);
        assert_eq!(ResourceType::SmnTopic.tag_resource_type(), Some("smn_topic"));
    }

    #[test]
    fn annotations_serialize_beside_vendor_fields() {
        let mut r = Resource::from_value(json!({"id": "lb-1", "name": "web"}));
        r.annotate("network-location", json!([]));
        let encoded = serde_json::to_value(&r).unwrap();
        assert_eq!(encoded["id"], "lb-1");
        assert_eq!(encoded["cirrus:annotations"]["network-location"], json!([]));

        let decoded: Resource = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, r);
    }
}
