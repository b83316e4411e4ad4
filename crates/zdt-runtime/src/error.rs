//! Error types for zdt-runtime

use thiserror::Error;
use zdt_core::HarnessError;

/// Errors that can occur while driving the container runtime
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Docker CLI not found
    #[error("docker is not installed or not in PATH")]
    DockerNotFound,

    /// A docker invocation exited non-zero
    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// Backing store never accepted connections
    #[error("backing store {container} not ready: {detail}")]
    StoreNotReady { container: String, detail: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unparseable docker output
    #[error("unexpected docker output: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<RuntimeError> for HarnessError {
    fn from(err: RuntimeError) -> Self {
        HarnessError::Deployment(err.to_string())
    }
}
