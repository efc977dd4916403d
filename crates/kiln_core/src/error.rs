//! Error types for the core module.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur during core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Unknown generation type: {0}")]
    UnknownGenerationType(String),

    #[error("Generation type not resolved before {0}")]
    GenerationTypeMissing(String),

    #[error("Station not found: {0}")]
    StationNotFound(String),

    #[error("Invalid workflow state: {0}")]
    InvalidState(String),

    #[error("Station execution failed: {station} - {message}")]
    StationExecutionFailed { station: String, message: String },

    #[error("Collaborator failed: {0}")]
    Collaborator(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}
