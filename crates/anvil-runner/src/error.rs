//! Runner error types.

use anvil_session::SessionError;
use anvil_sim::SimError;
use thiserror::Error;

/// Errors raised by the command-line runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Config file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid YAML.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Report could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Simulator could not be built.
    #[error("simulator error: {0}")]
    Sim(#[from] SimError),

    /// Session rejected an operation.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Bad command-line input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The link went down before the operation finished.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The device did not answer in time.
    #[error("timed out after {timeout_ms} ms waiting for {what}")]
    Timeout {
        /// What was being waited on.
        what: &'static str,
        /// Configured timeout.
        timeout_ms: u64,
    },
}

impl RunnerError {
    /// Shorthand for [`RunnerError::InvalidArgument`].
    pub fn invalid(msg: impl Into<String>) -> Self {
        RunnerError::InvalidArgument(msg.into())
    }
}

/// Result type alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;
