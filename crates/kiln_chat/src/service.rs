//! Chat entry points.
//!
//! [`ChatService`] is what a front end talks to: it validates a request,
//! records the user turn and returns a display stream. In agent mode the
//! request runs through the workflow instead of a single generation, and
//! the stream carries workflow progress.

use std::path::PathBuf;
use std::sync::Arc;

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use kiln_core::{
    AppId, CodeGenerator, CoreError, CoreResult, GenerationType, RequestContext, WorkflowContext,
    WorkflowEvent, WorkflowExecutor,
};

use crate::dispatcher::{DispatchedStream, GenerationDispatcher};
use crate::error::{ChatError, ChatResult};
use crate::history::HistoryStores;
use crate::reassembly::{DisplayStream, StreamReassembler};
use crate::types::HistoryEntry;

pub struct ChatService {
    dispatcher: Arc<GenerationDispatcher>,
    reassembler: StreamReassembler,
    history: HistoryStores,
    workflow: Option<Arc<WorkflowExecutor>>,
    stream_mode: bool,
}

impl ChatService {
    pub fn new(dispatcher: Arc<GenerationDispatcher>, history: HistoryStores) -> Self {
        Self {
            dispatcher,
            reassembler: StreamReassembler::new(history.clone()),
            history,
            workflow: None,
            stream_mode: true,
        }
    }

    pub fn with_workflow(mut self, workflow: Arc<WorkflowExecutor>) -> Self {
        self.workflow = Some(workflow);
        self
    }

    /// Use the structured call for the text types instead of streaming.
    pub fn with_stream_mode(mut self, stream_mode: bool) -> Self {
        self.stream_mode = stream_mode;
        self
    }

    /// Generate code for a chat message.
    ///
    /// Request errors (blank message, unknown type, rejected input) are
    /// returned here; model failures arrive as the stream's last item.
    pub async fn chat_to_gen_code(
        &self,
        ctx: &RequestContext,
        message: &str,
        generation_type: &str,
        agent_mode: bool,
    ) -> ChatResult<DisplayStream> {
        if message.trim().is_empty() {
            return Err(ChatError::Rejected("message must not be empty".to_string()));
        }
        let generation_type: GenerationType = generation_type.parse()?;
        self.dispatcher.check_input(message)?;

        self.history
            .append_both(HistoryEntry::user(ctx, message))
            .await?;
        info!(
            app_id = ctx.app_id,
            user_id = ctx.user_id,
            request_id = %ctx.request_id,
            "Chat request for {} (agent mode: {})",
            generation_type,
            agent_mode
        );

        if agent_mode {
            return self.run_workflow(ctx, message, generation_type);
        }

        if !self.stream_mode && !generation_type.uses_tools() {
            return self.generate_blocking(ctx, message, generation_type).await;
        }

        match self.dispatcher.stream_prompt(ctx, message, generation_type).await {
            Ok(DispatchedStream::Text(text)) => Ok(self.reassembler.reassemble_text(ctx.clone(), text)),
            Ok(DispatchedStream::Events { events, tools }) => {
                Ok(self.reassembler.reassemble_events(ctx.clone(), events, tools))
            }
            Err(e) => {
                self.record_failure(ctx, &e).await;
                Err(e)
            }
        }
    }

    /// Display history of an application, oldest first.
    pub async fn history(&self, app_id: AppId, limit: usize) -> ChatResult<Vec<HistoryEntry>> {
        self.history.display.load_recent(app_id, limit).await
    }

    async fn generate_blocking(
        &self,
        ctx: &RequestContext,
        message: &str,
        generation_type: GenerationType,
    ) -> ChatResult<DisplayStream> {
        match self.dispatcher.save_prompt(ctx, message, generation_type).await {
            Ok(dir) => {
                let reply = format!("Generated {} in {}", generation_type.label(), dir.display());
                self.history
                    .display
                    .append(HistoryEntry::assistant(ctx, reply.clone()))
                    .await?;
                Ok(Box::pin(futures::stream::once(async move { Ok(reply) })))
            }
            Err(e) => {
                self.record_failure(ctx, &e).await;
                Err(e)
            }
        }
    }

    fn run_workflow(&self, ctx: &RequestContext, message: &str, generation_type: GenerationType) -> ChatResult<DisplayStream> {
        let workflow = self
            .workflow
            .clone()
            .ok_or_else(|| ChatError::Config("agent mode requires a workflow".to_string()))?;

        let context = WorkflowContext::new(ctx.clone(), message).with_generation_type(generation_type);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let history = self.history.clone();
        let ctx = ctx.clone();

        // Runs to completion even if the caller stops reading.
        let run = tokio::spawn(async move {
            let result = workflow.execute_with_events(context, Some(tx)).await;
            let summary = match &result {
                Ok(log) => match &log.context.generated_code_dir {
                    Some(dir) => format!("Workflow finished, code saved to {}", dir.display()),
                    None => "Workflow finished without generated code".to_string(),
                },
                Err(e) => format!("AI reply failed: {}", e),
            };
            if let Err(e) = history.display.append(HistoryEntry::assistant(&ctx, summary)).await {
                error!(app_id = ctx.app_id, "Failed to persist workflow summary: {}", e);
            }
            result.map(|_| ())
        });

        Ok(Box::pin(stream! {
            while let Some(event) = rx.recv().await {
                yield Ok(render_workflow_event(&event));
            }
            match run.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    yield Err(ChatError::from(e));
                }
                Err(e) => {
                    yield Err(ChatError::Workflow(e.to_string()));
                }
            }
        }))
    }

    async fn record_failure(&self, ctx: &RequestContext, err: &ChatError) {
        let entry = HistoryEntry::assistant(ctx, format!("AI reply failed: {}", err));
        if let Err(e) = self.history.append_both(entry).await {
            warn!(app_id = ctx.app_id, "Failed to persist failure message: {}", e);
        }
    }
}

/// One display line per workflow event.
pub fn render_workflow_event(event: &WorkflowEvent) -> String {
    match event {
        WorkflowEvent::Started { execution_id, .. } => {
            format!("Workflow {} started\n", execution_id)
        }
        WorkflowEvent::StepCompleted { step, index, message } => match message {
            Some(message) => format!("Step {} completed: {} ({})\n", index, step, message),
            None => format!("Step {} completed: {}\n", index, step),
        },
        WorkflowEvent::Completed {
            generated_code_dir,
            build_result_dir,
        } => {
            let mut line = String::from("Workflow completed");
            if let Some(dir) = generated_code_dir {
                line.push_str(&format!(", code in {}", dir.display()));
            }
            if let Some(dir) = build_result_dir {
                line.push_str(&format!(", build in {}", dir.display()));
            }
            line.push('\n');
            line
        }
        WorkflowEvent::Failed { error } => format!("Workflow failed: {}\n", error),
    }
}

/// Workflow code generator backed by the dispatcher.
///
/// Streams are drained to completion; the text types are saved by the
/// dispatcher, project files by the tools.
pub struct DispatchingCodeGenerator {
    dispatcher: Arc<GenerationDispatcher>,
    stream_mode: bool,
}

impl DispatchingCodeGenerator {
    pub fn new(dispatcher: Arc<GenerationDispatcher>, stream_mode: bool) -> Self {
        Self {
            dispatcher,
            stream_mode,
        }
    }
}

#[async_trait]
impl CodeGenerator for DispatchingCodeGenerator {
    async fn generate(
        &self,
        ctx: &RequestContext,
        generation_type: GenerationType,
        prompt: &str,
    ) -> CoreResult<PathBuf> {
        let collaborator = |e: ChatError| CoreError::Collaborator(e.to_string());

        if !self.stream_mode && !generation_type.uses_tools() {
            return self
                .dispatcher
                .save_prompt(ctx, prompt, generation_type)
                .await
                .map_err(collaborator);
        }

        match self
            .dispatcher
            .stream_prompt(ctx, prompt, generation_type)
            .await
            .map_err(collaborator)?
        {
            DispatchedStream::Text(mut text) => {
                while let Some(chunk) = text.next().await {
                    chunk.map_err(|e| CoreError::Collaborator(e.to_string()))?;
                }
            }
            DispatchedStream::Events { mut events, .. } => {
                while let Some(event) = events.next().await {
                    event.map_err(|e| CoreError::Collaborator(e.to_string()))?;
                }
            }
        }

        Ok(self.dispatcher.saver().output_dir(generation_type, ctx.app_id))
    }
}
