//! Error types for library-index.
//!
//! Library code returns [`AgentError`] from the agent layer and
//! [`CommandError`] from the CLI layer. Both fold into the crate-level
//! [`Error`] so callers can use a single [`Result`] alias.

use thiserror::Error;

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Agent or collaborator failure.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// CLI command failure.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the agent, its collaborators and its configuration.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No API key was configured.
    #[error("API key missing: set OPENAI_API_KEY or LI_API_KEY")]
    ApiKeyMissing,

    /// A configuration value is missing or out of range.
    #[error("invalid configuration: {message}")]
    Configuration {
        /// What was wrong.
        message: String,
    },

    /// The configured provider name is not known.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// Provider name as configured.
        name: String,
    },

    /// The LLM API rejected or failed a request.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Error detail from the SDK.
        message: String,
        /// HTTP status, when known.
        status: Option<u16>,
    },

    /// A collaborator returned data that could not be parsed.
    #[error("failed to parse response: {message}")]
    ResponseParse {
        /// Parse failure detail.
        message: String,
        /// Raw content that failed to parse.
        content: String,
    },

    /// A non-LLM collaborator (academic database, parser, memory, I/O) failed.
    #[error("{collaborator} call failed: {message}")]
    ExternalCall {
        /// Which collaborator failed.
        collaborator: &'static str,
        /// Failure detail.
        message: String,
    },

    /// The state machine reached a state it cannot handle.
    #[error("no handler for state {state}")]
    State {
        /// Name of the offending state.
        state: String,
    },

    /// The operator cancelled the run.
    #[error("execution was manually terminated")]
    Interrupted,

    /// Orchestration-level failure (bad input, task join failure).
    #[error("orchestration error: {message}")]
    Orchestration {
        /// Failure detail.
        message: String,
    },
}

impl AgentError {
    /// Builds an [`AgentError::ExternalCall`] for the given collaborator.
    pub fn external(collaborator: &'static str, message: impl std::fmt::Display) -> Self {
        Self::ExternalCall {
            collaborator,
            message: message.to_string(),
        }
    }
}

/// Errors raised while executing CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command could not complete.
    #[error("command failed: {0}")]
    ExecutionFailed(String),

    /// An argument value was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Output could not be rendered in the requested format.
    #[error("output format error: {0}")]
    OutputFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_call_display() {
        let err = AgentError::external("academic-db", "connection reset");
        assert_eq!(err.to_string(), "academic-db call failed: connection reset");
    }

    #[test]
    fn test_agent_error_converts_to_crate_error() {
        let err: Error = AgentError::Interrupted.into();
        assert!(matches!(err, Error::Agent(AgentError::Interrupted)));
        assert_eq!(err.to_string(), "execution was manually terminated");
    }
}
