//! Policy execution modes.
//!
//! A policy either runs on demand over everything the fetch collaborator
//! returns (`pull`), or is triggered by audit-trail events (`cloudtrace`)
//! and only sees the resources the event touched.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PolicyMode {
    #[default]
    Pull,
    Cloudtrace {
        /// Event names that trigger the policy. Empty accepts any event.
        #[serde(default)]
        events: Vec<String>,
    },
}

impl PolicyMode {
    pub fn is_event_driven(&self) -> bool {
        matches!(self, Self::Cloudtrace { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pull => "pull",
            Self::Cloudtrace { .. } => "cloudtrace",
        }
    }

    /// Whether an event with `event_name` should trigger this policy.
    pub fn accepts(&self, event_name: Option<&str>) -> bool {
        match self {
            Self::Pull => false,
            Self::Cloudtrace { events } => {
                events.is_empty() || event_name.is_some_and(|n| events.iter().any(|e| e == n))
            }
        }
    }
}
