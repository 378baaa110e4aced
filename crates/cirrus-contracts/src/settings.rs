//! Runner settings shared by every policy in a session.

use serde::{Deserialize, Serialize};

/// Session-wide knobs. Every field has a default so an empty settings
/// document is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerSettings {
    pub region: String,
    /// Worker count for per-resource augmentation fan-out.
    pub max_workers: usize,
    /// Resources per tag service call.
    pub tag_batch_size: usize,
    /// Tags per tag service call.
    pub max_tags_per_call: usize,
    /// Evaluate filters but skip every action.
    pub dry_run: bool,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            region: "cn-north-4".to_string(),
            max_workers: 3,
            tag_batch_size: 50,
            max_tags_per_call: 10,
            dry_run: false,
        }
    }
}
