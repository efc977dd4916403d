//! Stream reassembly.
//!
//! Turns the heterogeneous model event stream into three outputs: a display
//! stream forwarded to the caller, a display transcript persisted as one
//! assistant turn, and a replay transcript persisted as granular entries
//! that can rebuild model memory including tool turns.
//!
//! The fold itself is [`TranscriptAccumulator::apply`]; [`StreamReassembler`]
//! drives it on a spawned task so persistence completes even when the
//! caller stops listening.

use std::collections::HashSet;
use std::sync::Arc;

use async_stream::stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use kiln_codegen::{CodegenError, EventStream, StreamEvent, TextStream, ToolSet};
use kiln_core::RequestContext;

use crate::error::{ChatError, ChatResult};
use crate::history::HistoryStores;
use crate::types::{Actor, EntryKind, HistoryEntry, ToolRequestRecord, ToolResultRecord};

/// Display chunks delivered to the caller.
pub type DisplayStream = BoxStream<'static, ChatResult<String>>;

/// One replay transcript record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayRecord {
    AssistantText(String),
    ToolRequest(ToolRequestRecord),
    ToolResult(ToolResultRecord),
}

impl ReplayRecord {
    pub fn into_entry(self, ctx: &RequestContext) -> ChatResult<HistoryEntry> {
        Ok(match self {
            ReplayRecord::AssistantText(text) => HistoryEntry::assistant(ctx, text),
            ReplayRecord::ToolRequest(record) => HistoryEntry::new(
                ctx,
                Actor::Assistant,
                EntryKind::ToolRequest,
                serde_json::to_string(&record)?,
            ),
            ReplayRecord::ToolResult(record) => HistoryEntry::new(
                ctx,
                Actor::Assistant,
                EntryKind::ToolResult,
                serde_json::to_string(&record)?,
            ),
        })
    }
}

/// Both transcripts of one finished stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    pub display: String,
    pub replay: Vec<ReplayRecord>,
}

/// Accumulator state for one stream invocation.
#[derive(Debug, Default)]
pub struct TranscriptAccumulator {
    seen_requests: HashSet<String>,
    display: String,
    pending_text: String,
    replay: Vec<ReplayRecord>,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event. Returns the chunk to forward to the display stream,
    /// or `None` when the event is suppressed.
    pub fn apply(&mut self, event: &StreamEvent, tools: &ToolSet) -> Option<String> {
        match event {
            StreamEvent::AiTextDelta { data } => {
                self.display.push_str(data);
                self.pending_text.push_str(data);
                Some(data.clone())
            }
            StreamEvent::ToolRequest { id, name, .. } => {
                if !self.seen_requests.insert(id.clone()) {
                    return None;
                }
                let announcement = tools.render_selected(name);
                self.display.push_str(&announcement);
                Some(announcement)
            }
            StreamEvent::ToolExecuted {
                id,
                name,
                arguments,
                result,
            } => {
                let block = tools.render_executed(name, arguments);
                self.display.push_str(&block);

                let text = std::mem::take(&mut self.pending_text);
                if !text.is_empty() {
                    self.replay.push(ReplayRecord::AssistantText(text.clone()));
                }
                self.replay.push(ReplayRecord::ToolRequest(ToolRequestRecord {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: arguments.clone(),
                    text,
                }));
                self.replay.push(ReplayRecord::ToolResult(ToolResultRecord {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: arguments.clone(),
                    result: result.clone(),
                }));
                Some(block)
            }
        }
    }

    /// Flush the trailing text span and hand over both transcripts.
    pub fn finish(mut self) -> Transcript {
        if !self.pending_text.is_empty() {
            self.replay
                .push(ReplayRecord::AssistantText(std::mem::take(&mut self.pending_text)));
        }
        Transcript {
            display: self.display,
            replay: self.replay,
        }
    }
}

/// Drives model streams and persists their transcripts.
#[derive(Clone)]
pub struct StreamReassembler {
    history: HistoryStores,
}

impl StreamReassembler {
    pub fn new(history: HistoryStores) -> Self {
        Self { history }
    }

    /// Reassemble a tool-augmented event stream.
    pub fn reassemble_events(
        &self,
        ctx: RequestContext,
        mut events: EventStream,
        tools: Arc<ToolSet>,
    ) -> DisplayStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let history = self.history.clone();

        tokio::spawn(async move {
            let mut acc = TranscriptAccumulator::new();
            while let Some(item) = events.next().await {
                match item {
                    Ok(event) => {
                        if let Some(chunk) = acc.apply(&event, &tools) {
                            // Keep consuming after the caller left so history is complete.
                            let _ = tx.send(Ok(chunk));
                        }
                    }
                    Err(e) => {
                        fail(&history, &ctx, &e).await;
                        let _ = tx.send(Err(ChatError::from(e)));
                        return;
                    }
                }
            }

            let transcript = acc.finish();
            persist_display(&history, &ctx, transcript.display).await;
            persist_replay(&history, &ctx, transcript.replay).await;
        });

        receiver_stream(rx)
    }

    /// Reassemble a plain text stream. Text generators rehydrate from the
    /// display store, so only the display transcript is kept.
    pub fn reassemble_text(&self, ctx: RequestContext, mut text: TextStream) -> DisplayStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let history = self.history.clone();

        tokio::spawn(async move {
            let mut display = String::new();
            while let Some(item) = text.next().await {
                match item {
                    Ok(chunk) => {
                        display.push_str(&chunk);
                        let _ = tx.send(Ok(chunk));
                    }
                    Err(e) => {
                        fail(&history, &ctx, &e).await;
                        let _ = tx.send(Err(ChatError::from(e)));
                        return;
                    }
                }
            }

            if display.trim().is_empty() {
                warn!(app_id = ctx.app_id, "Model returned an empty reply, nothing persisted");
                return;
            }
            persist_display(&history, &ctx, display).await;
        });

        receiver_stream(rx)
    }
}

fn receiver_stream(mut rx: mpsc::UnboundedReceiver<ChatResult<String>>) -> DisplayStream {
    Box::pin(stream! {
        while let Some(item) = rx.recv().await {
            yield item;
        }
    })
}

/// Record the failure in place of the partial reply.
async fn fail(history: &HistoryStores, ctx: &RequestContext, cause: &CodegenError) {
    error!(
        app_id = ctx.app_id,
        request_id = %ctx.request_id,
        "AI reply failed: {}",
        cause
    );
    let message = format!("AI reply failed: {}", cause);
    if let Err(e) = history.append_both(HistoryEntry::assistant(ctx, message)).await {
        error!(app_id = ctx.app_id, "Failed to persist failure message: {}", e);
    }
}

async fn persist_display(history: &HistoryStores, ctx: &RequestContext, display: String) {
    match history.display.append(HistoryEntry::assistant(ctx, display)).await {
        Ok(()) => info!(app_id = ctx.app_id, "Persisted assistant reply"),
        Err(e) => error!(app_id = ctx.app_id, "Failed to persist assistant reply: {}", e),
    }
}

async fn persist_replay(history: &HistoryStores, ctx: &RequestContext, replay: Vec<ReplayRecord>) {
    let entries: ChatResult<Vec<HistoryEntry>> = replay.into_iter().map(|r| r.into_entry(ctx)).collect();
    let result = match entries {
        Ok(entries) => history.replay.append_batch(entries).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        error!(app_id = ctx.app_id, "Failed to persist replay transcript: {}", e);
    }
}
