//! Result and error types for Recorrido.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for harness operations
pub type FlowResult<T> = Result<T, FlowError>;

/// Errors that can occur while driving a flow
#[derive(Debug, Error)]
pub enum FlowError {
    /// Browser process could not be started
    #[error("Failed to launch browser: {message}")]
    Launch {
        /// Error message
        message: String,
    },

    /// Navigation failed or timed out
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// No element matched any candidate selector
    #[error("No element matched '{selector}'")]
    SelectorNotFound {
        /// Selector (or candidate list) that failed to match
        selector: String,
    },

    /// Element was present but the action did not complete in time
    #[error("Step '{step}' timed out after {timeout_ms}ms")]
    ActionTimeout {
        /// Step name
        step: String,
        /// Per-attempt timeout in milliseconds
        timeout_ms: u64,
    },

    /// In-page script threw or could not be evaluated
    #[error("Evaluation failed: {message}")]
    Evaluation {
        /// Error message
        message: String,
    },

    /// Declared post-condition did not hold after the action
    #[error("Unexpected page state: {message}")]
    UnexpectedState {
        /// Error message
        message: String,
    },

    /// Two step executions overlapped on one session
    #[error("Session is already executing a step; concurrent page access is not allowed")]
    ConcurrentAccess,

    /// Run was cancelled before the step could complete
    #[error("Flow aborted: {message}")]
    FlowAborted {
        /// Error message
        message: String,
    },

    /// Session was closed before or during the operation
    #[error("Session is closed")]
    SessionClosed,

    /// Step definition failed validation
    #[error("Invalid step '{step}': {message}")]
    InvalidStep {
        /// Step name
        step: String,
        /// Error message
        message: String,
    },

    /// Flow definition file failed validation
    #[error("Invalid flow file: {message}")]
    FlowFile {
        /// Error message
        message: String,
    },

    /// Screenshot capture failed
    #[error("Screenshot failed: {message}")]
    Screenshot {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl FlowError {
    /// Whether the step executor may retry after this error.
    ///
    /// Only transient lookup failures are retryable; evaluation errors,
    /// post-condition failures, and session-level errors propagate
    /// immediately.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SelectorNotFound { .. } | Self::ActionTimeout { .. }
        )
    }

    /// Whether this error invalidates the whole session.
    ///
    /// A fatal error transitions the run to `Aborted` instead of the
    /// ordinary `Failed`.
    #[must_use]
    pub const fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Self::Launch { .. }
                | Self::ConcurrentAccess
                | Self::FlowAborted { .. }
                | Self::SessionClosed
        )
    }

    /// Classify this error for structured step results.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Launch { .. } => ErrorKind::Launch,
            Self::Navigation { .. } => ErrorKind::Navigation,
            Self::SelectorNotFound { .. } => ErrorKind::SelectorNotFound,
            Self::ActionTimeout { .. } => ErrorKind::ActionTimeout,
            Self::Evaluation { .. } => ErrorKind::Evaluation,
            Self::UnexpectedState { .. } => ErrorKind::UnexpectedState,
            Self::ConcurrentAccess => ErrorKind::ConcurrentAccess,
            Self::FlowAborted { .. } => ErrorKind::FlowAborted,
            Self::SessionClosed => ErrorKind::SessionClosed,
            Self::InvalidStep { .. } => ErrorKind::InvalidStep,
            Self::FlowFile { .. } => ErrorKind::FlowFile,
            Self::Screenshot { .. } => ErrorKind::Screenshot,
            Self::Io(_) => ErrorKind::Io,
            Self::Json(_) | Self::Yaml(_) => ErrorKind::Serialization,
        }
    }
}

/// Machine-readable error classification carried in step results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Browser launch failure
    Launch,
    /// Navigation failure
    Navigation,
    /// Element absent after the step's timeout
    SelectorNotFound,
    /// Element present but the action did not complete
    ActionTimeout,
    /// In-page script threw
    Evaluation,
    /// Post-condition check failed
    UnexpectedState,
    /// Overlapping step executions on one session
    ConcurrentAccess,
    /// Run cancelled mid-step
    FlowAborted,
    /// Session closed
    SessionClosed,
    /// Step definition rejected
    InvalidStep,
    /// Flow file rejected
    FlowFile,
    /// Screenshot capture failure
    Screenshot,
    /// I/O failure
    Io,
    /// JSON/YAML failure
    Serialization,
}

impl ErrorKind {
    /// Whether a step failing with this kind should abort the whole run.
    #[must_use]
    pub const fn aborts_run(&self) -> bool {
        matches!(
            self,
            Self::Launch | Self::ConcurrentAccess | Self::FlowAborted | Self::SessionClosed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_not_found_is_retryable() {
        let err = FlowError::SelectorNotFound {
            selector: ".time-slot".to_string(),
        };
        assert!(err.is_retryable());
        assert!(!err.is_session_fatal());
        assert_eq!(err.kind(), ErrorKind::SelectorNotFound);
    }

    #[test]
    fn action_timeout_is_retryable() {
        let err = FlowError::ActionTimeout {
            step: "confirm".to_string(),
            timeout_ms: 5000,
        };
        assert!(err.is_retryable());
        assert_eq!(err.kind(), ErrorKind::ActionTimeout);
    }

    #[test]
    fn unexpected_state_is_not_retryable() {
        let err = FlowError::UnexpectedState {
            message: "thank-you node missing".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(!err.kind().aborts_run());
    }

    #[test]
    fn session_errors_are_fatal() {
        assert!(FlowError::ConcurrentAccess.is_session_fatal());
        assert!(FlowError::SessionClosed.is_session_fatal());
        assert!(ErrorKind::FlowAborted.aborts_run());
        assert!(!ErrorKind::Evaluation.aborts_run());
    }

    #[test]
    fn error_messages_name_the_step() {
        let err = FlowError::ActionTimeout {
            step: "pick-first-time-slot".to_string(),
            timeout_ms: 2000,
        };
        assert!(err.to_string().contains("pick-first-time-slot"));
        assert!(err.to_string().contains("2000"));
    }
}
