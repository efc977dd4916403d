//! Bounded conversation memory and its rehydration from history.

use std::collections::VecDeque;

use tracing::warn;

use kiln_codegen::ModelMessage;

use crate::types::{Actor, EntryKind, HistoryEntry, ToolRequestRecord, ToolResultRecord};

/// Sliding window over the most recent model messages.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    max_messages: usize,
    messages: VecDeque<ModelMessage>,
}

impl ConversationMemory {
    pub fn new(max_messages: usize) -> Self {
        Self {
            max_messages: max_messages.max(1),
            messages: VecDeque::new(),
        }
    }

    /// Rebuild memory from persisted entries, oldest first.
    ///
    /// A trailing user entry is dropped: it is the request being served, and
    /// the dispatcher adds it itself.
    pub fn rehydrate(max_messages: usize, entries: &[HistoryEntry]) -> Self {
        let entries = match entries.last() {
            Some(last) if last.actor == Actor::User => &entries[..entries.len() - 1],
            _ => entries,
        };

        let mut memory = Self::new(max_messages);
        memory.extend(messages_from_entries(entries));
        memory
    }

    pub fn add(&mut self, message: ModelMessage) {
        self.messages.push_back(message);
        self.trim();
    }

    pub fn extend(&mut self, messages: impl IntoIterator<Item = ModelMessage>) {
        self.messages.extend(messages);
        self.trim();
    }

    pub fn messages(&self) -> Vec<ModelMessage> {
        self.messages.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop the oldest messages over the limit, then any tool results left
    /// without their request.
    fn trim(&mut self) {
        while self.messages.len() > self.max_messages {
            self.messages.pop_front();
        }
        while self.messages.front().is_some_and(ModelMessage::is_tool_result) {
            self.messages.pop_front();
        }
    }
}

/// Convert history entries to model messages.
///
/// An assistant text entry directly followed by a tool request carrying the
/// same text collapses into that request's assistant message.
pub fn messages_from_entries(entries: &[HistoryEntry]) -> Vec<ModelMessage> {
    let mut messages = Vec::with_capacity(entries.len());
    let mut iter = entries.iter().peekable();

    while let Some(entry) = iter.next() {
        match (entry.actor, entry.kind) {
            (Actor::User, _) => messages.push(ModelMessage::user(entry.text.clone())),
            (Actor::Assistant, EntryKind::Plain) => {
                let merged = iter
                    .peek()
                    .filter(|next| next.kind == EntryKind::ToolRequest)
                    .and_then(|next| serde_json::from_str::<ToolRequestRecord>(&next.text).ok())
                    .is_some_and(|record| record.text == entry.text);
                if !merged {
                    messages.push(ModelMessage::assistant(entry.text.clone()));
                }
            }
            (Actor::Assistant, EntryKind::ToolRequest) => {
                match serde_json::from_str::<ToolRequestRecord>(&entry.text) {
                    Ok(record) => messages.push(ModelMessage::Assistant {
                        text: record.text.clone(),
                        tool_calls: vec![record.call()],
                    }),
                    Err(e) => warn!("Skipping malformed tool request entry {}: {}", entry.id, e),
                }
            }
            (Actor::Assistant, EntryKind::ToolResult) => {
                match serde_json::from_str::<ToolResultRecord>(&entry.text) {
                    Ok(record) => messages.push(ModelMessage::ToolResult {
                        id: record.id,
                        name: record.name,
                        content: record.result,
                    }),
                    Err(e) => warn!("Skipping malformed tool result entry {}: {}", entry.id, e),
                }
            }
        }
    }
    messages
}
