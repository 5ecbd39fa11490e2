//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error (bad arguments or environment)
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// No flow with the requested name
    #[error("Unknown flow '{name}'. Run `recorrido list-flows` to see what is available")]
    UnknownFlow {
        /// The requested flow name
        name: String,
    },

    /// The flow run did not pass
    #[error("Flow '{flow}' {status}")]
    FlowDidNotPass {
        /// Flow name
        flow: String,
        /// Final run status
        status: String,
    },

    /// Harness error
    #[error("Flow error: {0}")]
    Flow(#[from] recorrido::FlowError),

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
