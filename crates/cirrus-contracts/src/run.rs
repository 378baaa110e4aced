//! Run identity and the records written to the remediation ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::report::ActionReport;
use crate::resource::ResourceType;

/// Unique identifier for one policy run.
///
/// Every record written during the run carries it, so a ledger can be
/// grouped back into runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub uuid::Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One executed action within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub policy: String,
    pub resource_type: ResourceType,
    pub report: ActionReport,
    pub timestamp: DateTime<Utc>,
}

impl RunRecord {
    pub fn new(
        run_id: RunId,
        policy: impl Into<String>,
        resource_type: ResourceType,
        report: ActionReport,
    ) -> Self {
        Self {
            run_id,
            policy: policy.into(),
            resource_type,
            report,
            timestamp: Utc::now(),
        }
    }
}
