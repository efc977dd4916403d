//! Error types for the chat layer.

use std::fmt;
use std::sync::Arc;

use kiln_codegen::CodegenError;
use kiln_core::CoreError;

/// Chat layer errors
#[derive(Debug)]
pub enum ChatError {
    /// Invalid request shape or missing configuration; never retried
    Config(String),
    /// Input refused before reaching the model
    Rejected(String),
    /// Upstream model failure
    Model(String),
    /// Chat history store failure
    History(String),
    /// Workflow run failure
    Workflow(String),
    /// File system error
    Io(std::io::Error),
    /// Serialization error
    Serialization(String),
}

impl ChatError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Rejected(msg) => write!(f, "Request rejected: {}", msg),
            Self::Model(msg) => write!(f, "Model error: {}", msg),
            Self::History(msg) => write!(f, "Chat history error: {}", msg),
            Self::Workflow(msg) => write!(f, "Workflow error: {}", msg),
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for ChatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ChatError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<CodegenError> for ChatError {
    fn from(err: CodegenError) -> Self {
        match err {
            CodegenError::Guardrail(msg) => Self::Rejected(msg),
            e if e.is_configuration() => Self::Config(e.to_string()),
            CodegenError::Io(e) => Self::Io(e),
            CodegenError::Serialization(e) => Self::Serialization(e.to_string()),
            e => Self::Model(e.to_string()),
        }
    }
}

impl From<CoreError> for ChatError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnknownGenerationType(_)
            | CoreError::GenerationTypeMissing(_)
            | CoreError::Config(_) => Self::Config(err.to_string()),
            CoreError::Io(e) => Self::Io(e),
            e => Self::Workflow(e.to_string()),
        }
    }
}

/// Errors shared by every waiter of a coalesced cache load.
impl From<Arc<ChatError>> for ChatError {
    fn from(err: Arc<ChatError>) -> Self {
        match err.as_ref() {
            Self::Config(msg) => Self::Config(msg.clone()),
            Self::Rejected(msg) => Self::Rejected(msg.clone()),
            Self::Model(msg) => Self::Model(msg.clone()),
            Self::History(msg) => Self::History(msg.clone()),
            Self::Workflow(msg) => Self::Workflow(msg.clone()),
            Self::Io(e) => Self::Io(std::io::Error::new(e.kind(), e.to_string())),
            Self::Serialization(msg) => Self::Serialization(msg.clone()),
        }
    }
}

/// Result type for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::GenerationType;

    #[test]
    fn test_codegen_error_mapping() {
        assert!(matches!(
            ChatError::from(CodegenError::Guardrail("too long".into())),
            ChatError::Rejected(_)
        ));
        assert!(ChatError::from(CodegenError::UnsupportedType(GenerationType::MultiStepProject)).is_configuration());
        assert!(matches!(
            ChatError::from(CodegenError::Model("503".into())),
            ChatError::Model(_)
        ));
    }

    #[test]
    fn test_core_error_mapping() {
        assert!(ChatError::from(CoreError::UnknownGenerationType("xml".into())).is_configuration());
        assert!(matches!(
            ChatError::from(CoreError::InvalidState("x".into())),
            ChatError::Workflow(_)
        ));
    }
}
