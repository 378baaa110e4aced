//! Per-action outcome reports.

use serde::{Deserialize, Serialize};

use crate::tags::TagSet;

/// A resource an action could not process, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedResource {
    pub id: String,
    pub reason: String,
}

/// What one action invocation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReport {
    pub action: String,
    pub succeeded: Vec<String>,
    pub failed: Vec<FailedResource>,
    /// Tags the action wrote, for tagging actions.
    #[serde(default, skip_serializing_if = "TagSet::is_empty")]
    pub tags: TagSet,
}

impl ActionReport {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            succeeded: Vec::new(),
            failed: Vec::new(),
            tags: TagSet::new(),
        }
    }

    pub fn success(&mut self, id: impl Into<String>) {
        self.succeeded.push(id.into());
    }

    pub fn failure(&mut self, id: impl Into<String>, reason: impl Into<String>) {
        self.failed.push(FailedResource {
            id: id.into(),
            reason: reason.into(),
        });
    }

    /// Fold another report's results into this one, keeping this action name.
    pub fn merge(&mut self, other: ActionReport) {
        self.succeeded.extend(other.succeeded);
        self.failed.extend(other.failed);
        for (key, value) in other.tags.iter() {
            self.tags.insert(key, value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.succeeded.is_empty() && self.failed.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}
