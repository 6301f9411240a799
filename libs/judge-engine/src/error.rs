// Error taxonomy for the execution pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Failures of the isolate itself, as opposed to failures of the submitted code.
#[derive(Debug, Error)]
pub enum IsolateError {
    #[error("failed to write artifact {path}: {source}")]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to launch command: {0}")]
    Launch(String),

    #[error("sandbox unavailable: {0}")]
    Unavailable(String),
}

impl From<bollard::errors::Error> for IsolateError {
    fn from(err: bollard::errors::Error) -> Self {
        IsolateError::Launch(err.to_string())
    }
}

/// A test case whose input cannot be turned into a call in the target language.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("argument name `{0}` is not a valid identifier")]
    InvalidName(String),

    #[error("argument `{name}` has a value java cannot express: {value}")]
    UnsupportedJavaValue { name: String, value: String },
}

/// Raised by the sandbox runner; carries the command that was being attempted.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct RunnerError {
    pub command: String,
    #[source]
    pub source: IsolateError,
}

/// Request-level failure returned by the orchestrator.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Rejected before any sandbox interaction.
    #[error("{0}")]
    RequestInvalid(String),

    /// The batch was aborted; no partial results are returned.
    #[error("{message}")]
    Pipeline { message: String, command: String },
}

impl From<RunnerError> for ExecutionError {
    fn from(err: RunnerError) -> Self {
        ExecutionError::Pipeline {
            message: err.source.to_string(),
            command: err.command,
        }
    }
}
