//! Reading a resource's tags.

use tracing::warn;

use cirrus_contracts::{resource::Resource, tags::TagSet};

/// The resource's normalized tags.
///
/// A missing `tags` field is an empty set. A malformed one is logged and
/// also treated as empty, so an unreadable resource counts as untagged.
pub fn resource_tags(resource: &Resource) -> TagSet {
    let Some(raw) = resource.get("tags") else {
        return TagSet::new();
    };
    if raw.is_null() {
        return TagSet::new();
    }
    match TagSet::from_value(raw) {
        Ok(tags) => tags,
        Err(e) => {
            warn!(
                resource_id = %resource.id(),
                error = %e,
                "failed to parse resource tags, treating resource as untagged"
            );
            TagSet::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn missing_and_null_tags_are_empty() {
        assert!(resource_tags(&Resource::from_value(json!({"id": "a"}))).is_empty());
        assert!(resource_tags(&Resource::from_value(json!({"id": "a", "tags": null}))).is_empty());
    }

    #[test]
    fn malformed_tags_are_treated_as_untagged() {
        let r = Resource::from_value(json!({"id": "a", "tags": 42}));
        assert!(resource_tags(&r).is_empty());
    }

    #[test]
    fn list_tags_are_normalized() {
        let r = Resource::from_value(json!({"id": "a", "tags": [{"key": "Owner", "value": "bob"}]}));
        assert_eq!(resource_tags(&r).get("Owner"), Some("bob"));
    }
}
