//! Error types for the NetBox / DigitalOcean sync engine.
//!
//! This module provides the error hierarchy for every phase of a run:
//! configuration, normalization, diffing, branch resolution, the two remote
//! APIs, and plan pinning.
//!
//! Errors raised while reading, normalizing, or diffing are fatal to the run.
//! [`ApiError`]s raised while applying a change set are scoped to a single
//! operation and classified with [`CallClass`] to decide whether a retry is
//! worthwhile.

use std::path::PathBuf;
use thiserror::Error;

use crate::resource::{ResourceKind, System};

/// The main error type for the sync engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A raw record could not be mapped into a canonical resource.
    #[error("Normalization error: {0}")]
    Normalize(#[from] NormalizationError),

    /// An internal contract was broken between pipeline stages.
    #[error("Invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),

    /// Branch resolution errors.
    #[error("Branch error: {0}")]
    Branch(#[from] BranchError),

    /// Remote API errors.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Planning errors.
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// A required setting was supplied neither by flag, environment, nor file.
    #[error("Missing {setting}: pass {flag} or set {env}")]
    MissingSetting {
        /// Human readable setting name.
        setting: String,
        /// Command line flag that supplies it.
        flag: String,
        /// Environment variable that supplies it.
        env: String,
    },
}

/// Raw record could not be turned into a canonical resource.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
    /// A field the mapping marks as required is absent or null.
    #[error("{system} {kind} record {record} is missing required field '{field}'")]
    MissingField {
        /// System the record came from.
        system: System,
        /// Kind of the record.
        kind: ResourceKind,
        /// Dotted path of the missing field.
        field: String,
        /// Record locator (identity or position) for diagnostics.
        record: String,
    },

    /// Two records in the same source claim the same identity.
    #[error("{system} produced duplicate {kind} identity '{identity_key}'")]
    DuplicateIdentity {
        /// System the records came from.
        system: System,
        /// Kind of the records.
        kind: ResourceKind,
        /// The colliding identity.
        identity_key: String,
    },

    /// The value at a mapped path is not a primitive.
    #[error("{system} {kind} '{identity_key}' field '{field}' holds a non-primitive value")]
    UnsupportedValue {
        /// System the record came from.
        system: System,
        /// Kind of the record.
        kind: ResourceKind,
        /// Identity of the record.
        identity_key: String,
        /// Dotted path of the field.
        field: String,
    },

    /// No mapping table exists for this system and kind.
    #[error("{system} has no mapping for {kind} records")]
    UnmappedKind {
        /// System the record came from.
        system: System,
        /// Kind without a mapping.
        kind: ResourceKind,
    },
}

/// Contract breach between pipeline stages. Always a bug upstream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// A resource reached the diff engine without an identity.
    #[error("{kind} resource reached the diff engine without an identity key")]
    MissingIdentity {
        /// Kind of the malformed resource.
        kind: ResourceKind,
    },

    /// A resource set handed to the diff engine holds a duplicate identity.
    #[error("duplicate {kind} identity '{identity_key}' reached the diff engine")]
    DuplicateIdentity {
        /// Kind of the duplicated resource.
        kind: ResourceKind,
        /// The duplicated identity.
        identity_key: String,
    },

    /// An update was built without any field change.
    #[error("update for {kind} '{identity_key}' carries no field changes")]
    EmptyUpdate {
        /// Kind of the resource.
        kind: ResourceKind,
        /// Identity of the resource.
        identity_key: String,
    },
}

/// Branch resolution errors.
#[derive(Debug, Error)]
pub enum BranchError {
    /// The branch does not exist and creation was not authorized.
    #[error("Branch '{name}' does not exist; pass --force to create it")]
    NotFound {
        /// Requested branch name.
        name: String,
    },

    /// The branch exists but never reached a usable state.
    #[error("Branch '{name}' did not become ready within {timeout_secs}s (status: {status})")]
    NotReady {
        /// Branch name.
        name: String,
        /// Last observed status.
        status: String,
        /// Seconds waited.
        timeout_secs: u64,
    },
}

/// Whether a failed remote call is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallClass {
    /// Rate limits, timeouts, connection failures, gateway errors.
    Transient,
    /// Validation errors, conflicts, authentication, unsupported changes.
    NonTransient,
}

/// Remote API errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Authentication failed.
    #[error("{system} authentication failed: {message}")]
    AuthenticationFailed {
        /// System that rejected the credentials.
        system: System,
        /// Description of the auth failure.
        message: String,
    },

    /// Rate limited.
    #[error("{system} API rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// System that throttled the call.
        system: System,
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// The call did not complete within the configured timeout.
    #[error("{system} request timed out: {message}")]
    Timeout {
        /// System that was called.
        system: System,
        /// Description of the timeout.
        message: String,
    },

    /// Network error.
    #[error("Network error communicating with {system}: {message}")]
    Network {
        /// System that was called.
        system: System,
        /// Description of the network error.
        message: String,
    },

    /// The server failed to handle the request.
    #[error("{system} server error: {status} - {message}")]
    Server {
        /// System that failed.
        system: System,
        /// HTTP status code.
        status: u16,
        /// Error body from the API.
        message: String,
    },

    /// The request was rejected (validation error, conflict, bad input).
    #[error("{system} rejected the request: {status} - {message}")]
    Rejected {
        /// System that rejected the call.
        system: System,
        /// HTTP status code.
        status: u16,
        /// Error body from the API.
        message: String,
    },

    /// The addressed object does not exist.
    #[error("{system} object not found: {resource}")]
    NotFound {
        /// System that was called.
        system: System,
        /// Description of the missing object.
        resource: String,
    },

    /// The response could not be interpreted.
    #[error("Invalid response from {system}: {message}")]
    InvalidResponse {
        /// System that answered.
        system: System,
        /// Description of the response issue.
        message: String,
    },

    /// The target cannot express the requested change.
    #[error("{system} cannot apply this change: {message}")]
    Unsupported {
        /// Target system.
        system: System,
        /// Description of the unsupported change.
        message: String,
    },

    /// A multi-call change failed after earlier calls took effect.
    /// Repeating the whole change would apply those calls twice.
    #[error("{system} change partially applied ({applied}): {source}")]
    PartiallyApplied {
        /// Target system.
        system: System,
        /// What took effect before the failure.
        applied: String,
        /// The failure of the later call.
        source: Box<ApiError>,
    },
}

/// Planning errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The change set no longer matches the one that was reviewed.
    #[error("Change set digest {actual} does not match expected {expected}; re-run --dry-run and review")]
    DigestMismatch {
        /// Digest supplied by the operator.
        expected: String,
        /// Digest computed from live state.
        actual: String,
    },
}

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// Returns true if this is a `BranchNotFound` error.
    #[must_use]
    pub const fn is_branch_not_found(&self) -> bool {
        matches!(self, Self::Branch(BranchError::NotFound { .. }))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a missing-setting error.
    #[must_use]
    pub fn missing(setting: &str, flag: &str, env: &str) -> Self {
        Self::MissingSetting {
            setting: setting.to_string(),
            flag: flag.to_string(),
            env: env.to_string(),
        }
    }
}

impl ApiError {
    /// Maps an unsuccessful HTTP status to an error.
    #[must_use]
    pub fn from_status(
        system: System,
        status: u16,
        body: impl Into<String>,
        retry_after_secs: Option<u64>,
    ) -> Self {
        let message = body.into();
        match status {
            401 | 403 => Self::AuthenticationFailed { system, message },
            404 => Self::NotFound {
                system,
                resource: message,
            },
            429 => Self::RateLimited {
                system,
                retry_after_secs: retry_after_secs.filter(|s| *s > 0).unwrap_or(60),
            },
            500..=599 => Self::Server {
                system,
                status,
                message,
            },
            _ => Self::Rejected {
                system,
                status,
                message,
            },
        }
    }

    /// Maps a transport-level failure to an error.
    #[must_use]
    pub fn from_transport(system: System, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                system,
                message: err.to_string(),
            }
        } else if err.is_decode() {
            Self::InvalidResponse {
                system,
                message: err.to_string(),
            }
        } else {
            Self::Network {
                system,
                message: err.to_string(),
            }
        }
    }

    /// Creates an invalid response error.
    #[must_use]
    pub fn invalid(system: System, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            system,
            message: message.into(),
        }
    }

    /// Creates an unsupported change error.
    #[must_use]
    pub fn unsupported(system: System, message: impl Into<String>) -> Self {
        Self::Unsupported {
            system,
            message: message.into(),
        }
    }

    /// Marks a failure that happened after `applied` already took effect.
    #[must_use]
    pub fn after(self, system: System, applied: impl Into<String>) -> Self {
        Self::PartiallyApplied {
            system,
            applied: applied.into(),
            source: Box::new(self),
        }
    }

    /// Classifies the failure for retry purposes.
    #[must_use]
    pub const fn class(&self) -> CallClass {
        match self {
            Self::RateLimited { .. } | Self::Timeout { .. } | Self::Network { .. } => {
                CallClass::Transient
            }
            Self::Server { status, .. } => match *status {
                500 | 502 | 503 | 504 => CallClass::Transient,
                _ => CallClass::NonTransient,
            },
            _ => CallClass::NonTransient,
        }
    }

    /// Returns true if the call may succeed when retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.class(), CallClass::Transient)
    }

    /// Returns true if the addressed object was not found.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns the delay the server asked for, if any.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            _ => None,
        }
    }
}
