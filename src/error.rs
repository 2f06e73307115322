//! Error types for the proc runtime
//!
//! Blockage of a single proc is not an error: evaluators report it through
//! [`crate::evaluator::TickResult`]. Only network-wide conditions (deadlock,
//! exhausted tick budgets) and caller/graph mistakes surface here.

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// No proc made progress during a tick while I/O was pending.
    #[error("Proc network is deadlocked. Blocked channels: {}", .channels.join(", "))]
    Deadlock { channels: Vec<String> },

    /// A counted tick budget ran out before the stopping condition held.
    /// The network is left in a valid state and may be ticked again.
    #[error("Exceeded limit of {limit} ticks of the proc network before {waiting_for}")]
    DeadlineExceeded { limit: u64, waiting_for: String },

    /// A value does not conform to the type declared for it.
    #[error("type mismatch in {context}: expected {expected}, got {actual}")]
    TypeMismatch {
        context: String,
        expected: String,
        actual: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("parse error at {line}:{col}: {message}")]
    Parse {
        line: usize,
        col: usize,
        message: String,
    },

    /// The package violates a structural invariant.
    #[error("verification failed: {0}")]
    Verify(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("failed to parse package JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Machine-readable code for drivers that dispatch on error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Deadlock { .. } => "DEADLOCK",
            Error::DeadlineExceeded { .. } => "DEADLINE_EXCEEDED",
            Error::TypeMismatch { .. } => "TYPE_MISMATCH",
            Error::NotFound(_) => "NOT_FOUND",
            Error::InvalidArgument(_) => "INVALID_ARGUMENT",
            Error::Parse { .. } => "PARSE",
            Error::Verify(_) => "VERIFY",
            Error::Unsupported(_) => "UNSUPPORTED",
            Error::Json(_) => "JSON",
        }
    }

    /// Whether the caller may simply continue (e.g. tick again).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::DeadlineExceeded { .. })
    }

    pub(crate) fn type_mismatch(
        context: impl Into<String>,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        Error::TypeMismatch {
            context: context.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadlock_message_lists_channels() {
        let err = Error::Deadlock {
            channels: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Proc network is deadlocked. Blocked channels: a, b"
        );
        assert_eq!(err.code(), "DEADLOCK");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_deadline_is_recoverable() {
        let err = Error::DeadlineExceeded {
            limit: 100,
            waiting_for: "blocking".to_string(),
        };
        assert!(err.to_string().contains("Exceeded limit of 100 ticks"));
        assert!(err.is_recoverable());
    }
}
