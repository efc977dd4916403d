//! Chat history records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kiln_codegen::ToolCall;
use kiln_core::{AppId, RequestContext};

/// Who produced a history entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    User,
    Assistant,
}

/// What a history entry holds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Prose
    #[default]
    Plain,
    /// A [`ToolRequestRecord`] as JSON
    ToolRequest,
    /// A [`ToolResultRecord`] as JSON
    ToolResult,
}

/// A single persisted chat turn or turn fragment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Unique entry ID (UUID)
    pub id: String,
    pub app_id: AppId,
    pub user_id: i64,
    pub actor: Actor,
    #[serde(default)]
    pub kind: EntryKind,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(ctx: &RequestContext, actor: Actor, kind: EntryKind, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            app_id: ctx.app_id,
            user_id: ctx.user_id,
            actor,
            kind,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    /// Create a user message
    pub fn user(ctx: &RequestContext, text: impl Into<String>) -> Self {
        Self::new(ctx, Actor::User, EntryKind::Plain, text)
    }

    /// Create an assistant message
    pub fn assistant(ctx: &RequestContext, text: impl Into<String>) -> Self {
        Self::new(ctx, Actor::Assistant, EntryKind::Plain, text)
    }
}

/// A reconstructed tool request: the call plus the assistant text spoken
/// right before it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolRequestRecord {
    pub id: String,
    pub name: String,
    pub arguments: String,
    #[serde(default)]
    pub text: String,
}

impl ToolRequestRecord {
    pub fn call(&self) -> ToolCall {
        ToolCall {
            id: self.id.clone(),
            name: self.name.clone(),
            arguments: self.arguments.clone(),
        }
    }
}

/// A finished tool execution as reported by the model stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolResultRecord {
    pub id: String,
    pub name: String,
    pub arguments: String,
    pub result: String,
}
