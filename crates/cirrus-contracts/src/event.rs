//! Audit-trail events delivered to event-driven (`cloudtrace`) policies.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The actor kinds an attribution policy may be configured to accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserType {
    IAMUser,
    AssumedRole,
    FederatedUser,
}

impl UserType {
    pub const ALL: [UserType; 3] = [
        UserType::IAMUser,
        UserType::AssumedRole,
        UserType::FederatedUser,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::IAMUser => "IAMUser",
            Self::AssumedRole => "AssumedRole",
            Self::FederatedUser => "FederatedUser",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The actor who triggered an event.
///
/// `user_type` stays a plain string: events from the trail may carry actor
/// kinds this plugin has no name for, and those must be rejected by the
/// allow-list rather than fail to parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventUser {
    #[serde(rename = "type")]
    pub user_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub principal_id: Option<String>,
}

impl EventUser {
    /// The actor kind, when it is one of the known kinds.
    pub fn known_type(&self) -> Option<UserType> {
        UserType::ALL
            .into_iter()
            .find(|t| t.as_str() == self.user_type)
    }
}

/// A single audit-trail event. Produced externally, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudEvent {
    pub user: EventUser,
    #[serde(default)]
    pub source_ip: Option<String>,
    #[serde(default)]
    pub event_name: Option<String>,
    /// Ids of the resources the event touched.
    #[serde(default)]
    pub resource_ids: Vec<String>,
}
