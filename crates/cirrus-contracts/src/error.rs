//! Error types for the Cirrus plugin.
//!
//! All fallible operations return `CirrusResult<T>`. Variants are split by
//! *when* they surface: configuration problems are reported before any
//! resource is touched, service-call problems abort the current action.

use thiserror::Error;

/// The unified error type for the Cirrus crates.
#[derive(Debug, Error)]
pub enum CirrusError {
    /// A policy is structurally valid TOML but cannot run as written
    /// (unknown filter, missing dependency, wrong mode, ...).
    ///
    /// The whole policy is rejected; nothing executes.
    #[error("policy validation failed: {reason}")]
    PolicyValidation { reason: String },

    /// A filter or action option block failed its declared JSON schema.
    #[error("schema validation error: {reason}")]
    SchemaValidation { reason: String },

    /// A settings or policy file could not be read or parsed.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// A call through a service collaborator failed.
    ///
    /// Never retried here. Mutating actions treat this as fatal for the
    /// current invocation.
    #[error("service call {service}:{operation} failed: {reason}")]
    ServiceCall {
        service: String,
        operation: String,
        reason: String,
    },

    /// An action could not complete for a reason other than a service failure,
    /// e.g. a lookup that found nothing to act on.
    #[error("policy execution error: {reason}")]
    Execution { reason: String },

    /// The remediation ledger could not persist a run record.
    #[error("audit write failed: {reason}")]
    AuditWriteFailed { reason: String },
}

impl CirrusError {
    /// Shorthand for a `ServiceCall` error.
    pub fn service(
        service: impl Into<String>,
        operation: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ServiceCall {
            service: service.into(),
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a `PolicyValidation` error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::PolicyValidation {
            reason: reason.into(),
        }
    }

    /// True for errors that reject a policy before execution starts.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::PolicyValidation { .. } | Self::SchemaValidation { .. } | Self::ConfigError { .. }
        )
    }

    /// The bare reason, without the variant prefix.
    pub fn reason(&self) -> &str {
        match self {
            Self::PolicyValidation { reason }
            | Self::SchemaValidation { reason }
            | Self::ConfigError { reason }
            | Self::ServiceCall { reason, .. }
            | Self::Execution { reason }
            | Self::AuditWriteFailed { reason } => reason,
        }
    }
}

/// Convenience alias used throughout the Cirrus crates.
pub type CirrusResult<T> = Result<T, CirrusError>;

/// A resource's `tags` field could not be normalized into a `TagSet`.
///
/// Always recovered locally: the resource is treated as carrying no tags.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagParseError {
    /// `tags` was neither a mapping nor a sequence.
    #[error("tags must be a mapping or a sequence, found {found}")]
    UnsupportedShape { found: &'static str },

    /// A list entry could not be read as a key/value pair.
    #[error("tag entry {index} is malformed: {detail}")]
    MalformedEntry { index: usize, detail: String },

    /// A tag value was a nested structure rather than a scalar.
    #[error("tag '{key}' has a non-scalar value")]
    NonScalarValue { key: String },
}
