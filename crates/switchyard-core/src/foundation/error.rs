//! Error types for the Switchyard dispatch core.
//!
//! Two families exist:
//!
//! - [`AliasConflict`] is raised while commands are being registered. It is
//!   fatal: the process is expected to abort startup.
//! - [`DispatchError`] is the runtime taxonomy. Every per-event failure is
//!   caught at the pipeline's execute boundary and routed to a recovery
//!   action by the error router; it never escapes the dispatch loop.

use std::time::Duration;

use thiserror::Error;

/// A type-erased error, used to carry foreign failures through [`DispatchError::Unhandled`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// =============================================================================
// Registration-time errors
// =============================================================================

/// Two actions declare the same alias at the same depth of the command trie.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("alias conflict: actions '{first}' and '{second}' both declare alias '{alias}'")]
pub struct AliasConflict {
    /// The alias declared twice.
    pub alias: String,
    /// Name of the action that already owned the alias.
    pub first: String,
    /// Name of the action that tried to claim it.
    pub second: String,
}

// =============================================================================
// Outbound collaborator errors
// =============================================================================

/// Errors reported by the [`Outbound`](crate::Outbound) collaborator.
#[derive(Debug, Clone, Error)]
pub enum OutboundError {
    /// The transport is not connected.
    #[error("outbound channel is not connected")]
    NotConnected,

    /// The remote side rejected the request.
    #[error("outbound request rejected: {0}")]
    Rejected(String),

    /// I/O failure while transmitting.
    #[error("outbound I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for OutboundError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// Runtime errors
// =============================================================================

/// Failures raised while dispatching a single event.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A handler reported a business failure; `message` is meant for the user.
    #[error("{message}")]
    ExecutionFailed { message: String },

    /// The action's authorization predicate rejected the actor.
    #[error("privilege denied{}", format_reasons(.reasons))]
    PrivilegeDenied { reasons: Vec<String> },

    /// The actor exhausted the action's permits for the current window.
    #[error("cooldown breached ({permits} per {interval:?}), retry after {retry_after:?}")]
    CooldownBreached {
        permits: usize,
        interval: Duration,
        retry_after: Duration,
    },

    /// An argument was missing or could not be parsed.
    #[error("invalid input{}", format_input(.argument, .value))]
    InvalidInput {
        argument: Option<String>,
        value: Option<String>,
    },

    /// A parent command was invoked with a missing or unknown subcommand.
    #[error("bad subcommand{}", format_token(.token))]
    BadSubcommand { token: Option<String> },

    /// An awaited component interaction did not arrive in time.
    #[error("timed out after {after:?} waiting for component '{custom_id}'")]
    Timeout { custom_id: String, after: Duration },

    /// Anything else.
    #[error("unhandled error: {0}")]
    Unhandled(#[source] BoxError),
}

fn format_reasons(reasons: &[String]) -> String {
    if reasons.is_empty() {
        String::new()
    } else {
        format!(": {}", reasons.join("; "))
    }
}

fn format_token(token: &Option<String>) -> String {
    token
        .as_ref()
        .map(|token| format!(" '{token}'"))
        .unwrap_or_default()
}

fn format_input(argument: &Option<String>, value: &Option<String>) -> String {
    let mut out = String::new();
    if let Some(argument) = argument {
        out.push_str(&format!(" for '{argument}'"));
    }
    if let Some(value) = value {
        out.push_str(&format!(": '{value}'"));
    }
    out
}

impl DispatchError {
    /// Creates a user-facing execution failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            message: message.into(),
        }
    }

    /// Creates a privilege denial without a reason.
    pub fn denied() -> Self {
        Self::PrivilegeDenied {
            reasons: Vec::new(),
        }
    }

    /// Creates a privilege denial carrying one reason.
    pub fn denied_with(reason: impl Into<String>) -> Self {
        Self::PrivilegeDenied {
            reasons: vec![reason.into()],
        }
    }

    /// Creates an invalid-input error for a named argument.
    pub fn invalid_argument(argument: impl Into<String>, value: Option<String>) -> Self {
        Self::InvalidInput {
            argument: Some(argument.into()),
            value,
        }
    }

    /// Creates a bad-subcommand error for the offending token, if any.
    pub fn bad_subcommand(token: Option<String>) -> Self {
        Self::BadSubcommand { token }
    }

    /// Wraps any error as [`DispatchError::Unhandled`].
    pub fn unhandled<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Unhandled(err.into())
    }

    /// Short, stable name of the variant, for logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::ExecutionFailed { .. } => "execution_failed",
            Self::PrivilegeDenied { .. } => "privilege_denied",
            Self::CooldownBreached { .. } => "cooldown_breached",
            Self::InvalidInput { .. } => "invalid_input",
            Self::BadSubcommand { .. } => "bad_subcommand",
            Self::Timeout { .. } => "timeout",
            Self::Unhandled(_) => "unhandled",
        }
    }
}

impl From<OutboundError> for DispatchError {
    fn from(err: OutboundError) -> Self {
        Self::Unhandled(Box::new(err))
    }
}

impl From<AliasConflict> for DispatchError {
    fn from(err: AliasConflict) -> Self {
        Self::Unhandled(Box::new(err))
    }
}

/// Result type for dispatch operations.
pub type DispatchResult<T = ()> = Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privilege_denied_display() {
        assert_eq!(DispatchError::denied().to_string(), "privilege denied");
        let err = DispatchError::PrivilegeDenied {
            reasons: vec!["not an admin".into(), "not the owner".into()],
        };
        assert_eq!(
            err.to_string(),
            "privilege denied: not an admin; not the owner"
        );
    }

    #[test]
    fn test_invalid_input_display() {
        let err = DispatchError::invalid_argument("count", Some("ten".into()));
        assert_eq!(err.to_string(), "invalid input for 'count': 'ten'");
        let bare = DispatchError::InvalidInput {
            argument: None,
            value: None,
        };
        assert_eq!(bare.to_string(), "invalid input");
    }

    #[test]
    fn test_outbound_error_is_unhandled() {
        let err: DispatchError = OutboundError::NotConnected.into();
        assert_eq!(err.kind_name(), "unhandled");
    }
}
