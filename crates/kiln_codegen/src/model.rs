//! Model capability contracts.
//!
//! Three shapes are consumed: a blocking structured call, a plain text
//! stream, and a tool-augmented event stream. Implementations are opaque to
//! the rest of the system; retries, if any, happen inside them.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use kiln_core::{GenerationType, RequestContext};

use crate::artifact::CodeArtifact;
use crate::error::CodegenResult;
use crate::tools::ToolSet;

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments as produced by the model
    pub arguments: String,
}

/// One message of a conversation as the model sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ModelMessage {
    User {
        text: String,
    },
    Assistant {
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    ToolResult {
        id: String,
        name: String,
        content: String,
    },
}

impl ModelMessage {
    pub fn user(text: impl Into<String>) -> Self {
        ModelMessage::User { text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        ModelMessage::Assistant {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self, ModelMessage::ToolResult { .. })
    }
}

/// Everything a capability needs for one call.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub context: RequestContext,
    pub generation_type: GenerationType,
    pub system_prompt: String,
    /// Conversation so far, oldest first, ending with the current user message
    pub messages: Vec<ModelMessage>,
}

impl ModelRequest {
    /// Text of the last user message.
    pub fn user_text(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find_map(|m| match m {
                ModelMessage::User { text } => Some(text.as_str()),
                _ => None,
            })
            .unwrap_or_default()
    }
}

/// One unit of a tool-augmented model stream.
///
/// Events for one tool call share an id. `ToolRequest` may repeat while the
/// arguments stream in; exactly one `ToolExecuted` follows once the call ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    #[serde(rename = "ai_response")]
    AiTextDelta { data: String },
    ToolRequest {
        id: String,
        name: String,
        /// Arguments received so far; may be partial JSON
        arguments: String,
    },
    ToolExecuted {
        id: String,
        name: String,
        arguments: String,
        result: String,
    },
}

impl StreamEvent {
    pub fn text(data: impl Into<String>) -> Self {
        StreamEvent::AiTextDelta { data: data.into() }
    }
}

pub type TextStream = BoxStream<'static, CodegenResult<String>>;
pub type EventStream = BoxStream<'static, CodegenResult<StreamEvent>>;

/// Blocking call returning a pre-structured artifact.
#[async_trait]
pub trait StructuredModel: Send + Sync {
    async fn generate_structured(&self, request: ModelRequest) -> CodegenResult<CodeArtifact>;
}

/// Streaming call producing raw text chunks.
#[async_trait]
pub trait StreamingModel: Send + Sync {
    async fn generate_stream(&self, request: ModelRequest) -> CodegenResult<TextStream>;
}

/// Streaming call that may invoke tools, producing [`StreamEvent`]s.
#[async_trait]
pub trait ToolStreamingModel: Send + Sync {
    async fn generate_stream_with_tools(
        &self,
        request: ModelRequest,
        tools: Arc<ToolSet>,
    ) -> CodegenResult<EventStream>;
}
