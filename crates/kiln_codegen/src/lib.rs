//! # kiln_codegen
//!
//! Everything between a prompt and files on disk.
//!
//! - **Parser**: extracts fenced code blocks from a complete model response
//! - **Saver**: writes artifacts to `{type}_{id}` directories atomically
//! - **Model**: the three model capability contracts and an OpenAI-compatible adapter
//! - **Tools**: file tools the project generator calls, scoped to one project root
//! - **Guardrail**: input checks applied before any model call

pub mod artifact;
pub mod error;
pub mod guardrail;
pub mod llm;
pub mod mock;
pub mod model;
pub mod parser;
pub mod prompts;
pub mod saver;
pub mod tools;

pub use artifact::{CodeArtifact, FrontendFile, HtmlCode, MultiFileCode};
pub use error::{CodegenError, CodegenResult};
pub use guardrail::PromptGuardrail;
pub use llm::OpenAiModel;
pub use mock::{Script, ScriptedModel};
pub use model::{
    EventStream, ModelMessage, ModelRequest, StreamEvent, StreamingModel, StructuredModel,
    TextStream, ToolCall, ToolStreamingModel,
};
pub use parser::{parse_code, parse_html_code, parse_multi_file_code};
pub use saver::{next_snowflake_id, CodeFileSaver};
pub use tools::{Tool, ToolSet};
