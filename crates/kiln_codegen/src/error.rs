//! Error types for code generation.

use thiserror::Error;

use kiln_core::GenerationType;

/// Result type alias for code generation operations.
pub type CodegenResult<T> = Result<T, CodegenError>;

#[derive(Error, Debug)]
pub enum CodegenError {
    #[error("Generation type {0} is not supported by this operation")]
    UnsupportedType(GenerationType),

    #[error("Missing required artifact field: {0}")]
    MissingField(&'static str),

    #[error("Input rejected: {0}")]
    Guardrail(String),

    #[error("Model not configured: {0}")]
    ModelNotConfigured(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Too many tool invocations (limit {0})")]
    ToolLimit(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CodegenError {
    /// Configuration errors are fatal and never retried.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CodegenError::UnsupportedType(_)
                | CodegenError::MissingField(_)
                | CodegenError::ModelNotConfigured(_)
        )
    }
}

impl From<reqwest::Error> for CodegenError {
    fn from(err: reqwest::Error) -> Self {
        CodegenError::Model(err.to_string())
    }
}
