//! Error types for the runner module.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Errors that can occur while building or deploying generated code.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Failed to spawn {program}: {message}")]
    SpawnFailed { program: String, message: String },

    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    #[error("Command failed: {command} exited with {code:?}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("Project file missing: {0}")]
    MissingProjectFile(PathBuf),

    #[error("Build output missing: {0}")]
    MissingOutput(PathBuf),

    #[error("Deploy failed: {0}")]
    Deploy(String),

    #[error("Copy failed: {0}")]
    Copy(#[from] fs_extra::error::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
