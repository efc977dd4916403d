//! Error types for the policy module.

use thiserror::Error;

use kiln_core::CoreError;

/// Result type alias for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Errors that can occur while evaluating rules.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Rule evaluation failed: {rule} - {message}")]
    RuleEvaluationFailed { rule: String, message: String },

    #[error("Invalid path filter '{pattern}': {message}")]
    InvalidPathFilter { pattern: String, message: String },

    #[error("Gate task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PolicyError> for CoreError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::Io(e) => CoreError::Io(e),
            other => CoreError::Collaborator(other.to_string()),
        }
    }
}
