//! Error types for role sync.
//!
//! Three kinds of failure exist: validation errors found before any remote
//! call, remote errors from a role or membership call (fatal for the run),
//! and rollback errors, which are only logged and never surface here.

use crate::types::Operation;
use std::fmt;
use thiserror::Error;

/// Result type for role sync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by remote client implementations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// The service answered with a failure status
    #[error("HTTP {status}: {message}")]
    Http {
        /// Status code returned by the service
        status: u16,
        /// Body or reason sent with the status
        message: String,
    },

    /// The requested role or member does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Connection, DNS or TLS failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Response body could not be decoded
    #[error("invalid response: {0}")]
    Decode(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Broad classes of sync errors, used for user feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Local role data is malformed
    Validation,
    /// A call to the remote service failed
    Remote,
    /// The run was cancelled by the caller
    Cancelled,
    /// Failure inside the engine itself
    Internal,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Validation => "Invalid role definitions",
            Self::Remote => "Remote operation failed",
            Self::Cancelled => "Sync cancelled",
            Self::Internal => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Validation => "Fix the role files and run again; nothing was changed remotely",
            Self::Remote => "Check the service and re-run; the next run recomputes the plan",
            Self::Cancelled => "Re-run to finish converging the remaining roles",
            Self::Internal => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Errors that can occur while planning, executing or reconciling.
#[derive(Debug, Error)]
pub enum Error {
    /// A role definition is malformed
    #[error("invalid role '{role}': {message}")]
    InvalidRole {
        /// Name of the offending role (may be empty)
        role: String,
        /// What is wrong with it
        message: String,
    },

    /// Two roles with the same name in one role set
    #[error("duplicate role name: {0}")]
    DuplicateRole(String),

    /// One member listed in two roles
    #[error("member {member} appears in multiple roles: {first} and {second}")]
    MemberConflict {
        /// The member claimed twice
        member: String,
        /// Role that claimed it first
        first: String,
        /// Role that claimed it again
        second: String,
    },

    /// A role create/update/delete call failed
    #[error("failed to {operation} role {role}: {source}")]
    RoleOperation {
        /// Kind of operation that failed
        operation: Operation,
        /// Role the operation targeted
        role: String,
        /// Error reported by the client
        #[source]
        source: ClientError,
    },

    /// A role could not be looked up
    #[error("failed to look up role {role}: {source}")]
    RoleLookup {
        /// Role that was looked up
        role: String,
        /// Error reported by the client
        #[source]
        source: ClientError,
    },

    /// A role exists remotely but carries no id
    #[error("role {0} has no remote id")]
    MissingRoleId(String),

    /// Listing remote roles or members failed
    #[error("failed to fetch {what}: {source}")]
    Fetch {
        /// What was being fetched
        what: &'static str,
        /// Error reported by the client
        #[source]
        source: ClientError,
    },

    /// A membership call failed
    #[error("failed to {action} member {member}: {source}")]
    Membership {
        /// Action being performed (assign, invite, remove, cancel invite for)
        action: &'static str,
        /// Member email
        member: String,
        /// Error reported by the client
        #[source]
        source: ClientError,
    },

    /// The caller cancelled the run
    #[error("sync cancelled before {0} phase finished")]
    Cancelled(Operation),

    /// Invalid executor settings
    #[error("invalid parallelism: {0} (must be at least 1)")]
    InvalidParallelism(usize),

    /// Worker pool could not be created
    #[error("failed to create worker pool: {0}")]
    Pool(String),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidRole { .. } | Error::DuplicateRole(_) | Error::MemberConflict { .. } => {
                ErrorCategory::Validation
            }
            Error::RoleOperation { .. }
            | Error::RoleLookup { .. }
            | Error::MissingRoleId(_)
            | Error::Fetch { .. }
            | Error::Membership { .. } => ErrorCategory::Remote,
            Error::Cancelled(_) => ErrorCategory::Cancelled,
            Error::InvalidParallelism(_) | Error::Pool(_) => ErrorCategory::Internal,
        }
    }

    /// Whether the error was raised before any remote call was made.
    pub fn is_validation(&self) -> bool {
        self.category() == ErrorCategory::Validation
    }

    pub(crate) fn invalid_role(role: &str, message: impl Into<String>) -> Self {
        Error::InvalidRole {
            role: role.to_string(),
            message: message.into(),
        }
    }
}
