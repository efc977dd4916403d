//! Generation dispatch.
//!
//! Maps a generation type to its invocation shape:
//!
//! | type | shape |
//! |------|-------|
//! | `html`, `multi_file` | structured call, or text stream extracted after completion |
//! | `vue_project` | tool-augmented event stream, always |
//!
//! Invalid requests fail before any stream is created.

use std::path::PathBuf;
use std::sync::Arc;

use async_stream::try_stream;
use futures::StreamExt;
use tracing::{error, info};

use kiln_codegen::prompts::{structured_system_prompt, system_prompt};
use kiln_codegen::{
    parse_code, CodeFileSaver, CodegenError, CodegenResult, EventStream, ModelMessage,
    ModelRequest, PromptGuardrail, StreamEvent, TextStream, ToolSet,
};
use kiln_core::{AppId, GenerationType, RequestContext, SessionKey};

use crate::cache::GeneratorCache;
use crate::error::{ChatError, ChatResult};
use crate::handle::{GeneratorHandle, ModelBinding};
use crate::memory::messages_from_entries;
use crate::reassembly::TranscriptAccumulator;

/// Output of a streaming dispatch.
pub enum DispatchedStream {
    /// Raw text chunks of `html` / `multi_file` generation.
    Text(TextStream),
    /// Events of `vue_project` generation, with the tools they refer to.
    Events { events: EventStream, tools: Arc<ToolSet> },
}

pub struct GenerationDispatcher {
    cache: Arc<GeneratorCache>,
    saver: CodeFileSaver,
    guardrail: PromptGuardrail,
}

impl GenerationDispatcher {
    pub fn new(cache: Arc<GeneratorCache>, saver: CodeFileSaver) -> Self {
        Self {
            cache,
            saver,
            guardrail: PromptGuardrail::default(),
        }
    }

    pub fn with_guardrail(mut self, guardrail: PromptGuardrail) -> Self {
        self.guardrail = guardrail;
        self
    }

    pub fn saver(&self) -> &CodeFileSaver {
        &self.saver
    }

    pub fn cache(&self) -> &Arc<GeneratorCache> {
        &self.cache
    }

    /// Run the input guardrail.
    pub fn check_input(&self, message: &str) -> ChatResult<()> {
        self.guardrail.validate(message).map_err(ChatError::from)
    }

    /// Structured generation, saved to the application's directory.
    pub async fn generate_and_save(
        &self,
        ctx: &RequestContext,
        message: &str,
        generation_type: GenerationType,
    ) -> ChatResult<PathBuf> {
        self.check_input(message)?;
        self.save_prompt(ctx, message, generation_type).await
    }

    /// Structured generation without the guardrail, for callers that have
    /// already checked the user's message.
    pub async fn save_prompt(
        &self,
        ctx: &RequestContext,
        message: &str,
        generation_type: GenerationType,
    ) -> ChatResult<PathBuf> {
        if generation_type.uses_tools() {
            return Err(ChatError::Config(format!(
                "{} generation only supports streaming",
                generation_type
            )));
        }

        let handle = self.handle(ctx, generation_type).await?;
        let ModelBinding::Text { structured, .. } = handle.binding() else {
            return Err(ChatError::Config(format!("no structured model bound to {}", handle.key())));
        };

        let request = ModelRequest {
            context: ctx.clone(),
            generation_type,
            system_prompt: structured_system_prompt(generation_type),
            messages: handle.conversation_with(message).await,
        };
        let artifact = structured.generate_structured(request).await?;

        let saver = self.saver.clone();
        let app_id = ctx.app_id;
        let reply = artifact
            .description()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Generated {}", generation_type.label()));
        let dir = tokio::task::spawn_blocking(move || saver.save_for_app(&artifact, app_id))
            .await
            .map_err(|e| ChatError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))??;

        handle
            .remember([ModelMessage::user(message), ModelMessage::assistant(reply)])
            .await;
        Ok(dir)
    }

    /// Streaming generation.
    ///
    /// Text streams are extracted and saved once they complete; project
    /// streams write files through their tools as they go. Memory is updated
    /// when the stream finishes.
    pub async fn generate_stream(
        &self,
        ctx: &RequestContext,
        message: &str,
        generation_type: GenerationType,
    ) -> ChatResult<DispatchedStream> {
        self.check_input(message)?;
        self.stream_prompt(ctx, message, generation_type).await
    }

    /// Streaming generation without the guardrail. Workflow prompts carry
    /// enhancement and quality feedback and may exceed the user input limit.
    pub async fn stream_prompt(
        &self,
        ctx: &RequestContext,
        message: &str,
        generation_type: GenerationType,
    ) -> ChatResult<DispatchedStream> {
        let handle = self.handle(ctx, generation_type).await?;

        let request = ModelRequest {
            context: ctx.clone(),
            generation_type,
            system_prompt: system_prompt(generation_type).to_string(),
            messages: handle.conversation_with(message).await,
        };

        match handle.binding().clone() {
            ModelBinding::Text { streaming, .. } => {
                if generation_type.uses_tools() {
                    return Err(ChatError::Config(format!("{} requires tools", generation_type)));
                }
                let stream = streaming.generate_stream(request).await?;
                Ok(DispatchedStream::Text(Box::pin(save_on_completion(
                    stream,
                    handle,
                    self.saver.clone(),
                    ctx.clone(),
                    message.to_string(),
                ))))
            }
            ModelBinding::Project { model, tools } => {
                let events = model.generate_stream_with_tools(request, tools.clone()).await?;
                Ok(DispatchedStream::Events {
                    events: Box::pin(remember_on_completion(
                        events,
                        handle,
                        tools.clone(),
                        ctx.clone(),
                        message.to_string(),
                    )),
                    tools,
                })
            }
        }
    }

    async fn handle(&self, ctx: &RequestContext, generation_type: GenerationType) -> ChatResult<Arc<GeneratorHandle>> {
        let key = SessionKey::new(ctx.app_id, generation_type);
        info!(
            app_id = ctx.app_id,
            request_id = %ctx.request_id,
            "Dispatching {} generation",
            generation_type
        );
        self.cache.get(key).await
    }
}

/// Forward text chunks; extract and save the full response at the end.
///
/// Only model errors end the stream with an error. A failed extraction or
/// write is logged and the exchange is still remembered.
fn save_on_completion(
    mut stream: TextStream,
    handle: Arc<GeneratorHandle>,
    saver: CodeFileSaver,
    ctx: RequestContext,
    message: String,
) -> impl futures::Stream<Item = CodegenResult<String>> + Send + 'static {
    try_stream! {
        let mut full = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            full.push_str(&chunk);
            yield chunk;
        }

        let generation_type = handle.key().generation_type;
        let app_id = ctx.app_id;
        match save_reply(&full, generation_type, app_id, saver).await {
            Ok(dir) => info!(app_id, "Saved streamed {} artifact to {:?}", generation_type, dir),
            Err(e) => error!(app_id, "Could not save streamed {} artifact: {}", generation_type, e),
        }

        handle.remember([ModelMessage::user(message), ModelMessage::assistant(full)]).await;
    }
}

async fn save_reply(
    reply: &str,
    generation_type: GenerationType,
    app_id: AppId,
    saver: CodeFileSaver,
) -> CodegenResult<PathBuf> {
    let artifact = parse_code(reply, generation_type)?;
    tokio::task::spawn_blocking(move || saver.save_for_app(&artifact, app_id))
        .await
        .map_err(|e| CodegenError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?
}

/// Forward events; record the exchange, tool turns included, at the end.
fn remember_on_completion(
    mut events: EventStream,
    handle: Arc<GeneratorHandle>,
    tools: Arc<ToolSet>,
    ctx: RequestContext,
    message: String,
) -> impl futures::Stream<Item = CodegenResult<StreamEvent>> + Send + 'static {
    try_stream! {
        let mut acc = TranscriptAccumulator::new();
        while let Some(event) = events.next().await {
            let event = event?;
            acc.apply(&event, &tools);
            yield event;
        }

        let transcript = acc.finish();
        let entries = transcript
            .replay
            .into_iter()
            .map(|r| r.into_entry(&ctx))
            .collect::<ChatResult<Vec<_>>>()
            .map_err(|e| CodegenError::Tool(e.to_string()))?;

        let mut messages = vec![ModelMessage::user(message)];
        messages.extend(messages_from_entries(&entries));
        handle.remember(messages).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{HistoryGeneratorFactory, ModelSuite};
    use crate::history::HistoryStores;
    use kiln_codegen::{CodeArtifact, HtmlCode, Script, ScriptedModel};
    use kiln_core::config::{CacheConfig, MemoryConfig};
    use tempfile::TempDir;

    fn dispatcher(model: ScriptedModel, out: &TempDir) -> GenerationDispatcher {
        let factory = HistoryGeneratorFactory::new(
            ModelSuite::shared(Arc::new(model)),
            HistoryStores::in_memory(),
            MemoryConfig::default(),
            out.path(),
        );
        let cache = Arc::new(GeneratorCache::new(Arc::new(factory), &CacheConfig::default()));
        GenerationDispatcher::new(cache, CodeFileSaver::new(out.path()))
    }

    #[tokio::test]
    async fn test_structured_path_saves_and_remembers() {
        let out = TempDir::new().unwrap();
        let model = ScriptedModel::new().with_artifact(CodeArtifact::Html(HtmlCode {
            html_code: Some("<button>Go</button>".into()),
            description: Some("A button".into()),
        }));
        let dispatcher = dispatcher(model.clone(), &out);
        let ctx = RequestContext::new(1, 4);

        let dir = dispatcher
            .generate_and_save(&ctx, "simple page with a button", GenerationType::SingleFile)
            .await
            .unwrap();

        assert_eq!(dir, out.path().join("html_4"));
        assert_eq!(
            std::fs::read_to_string(dir.join("index.html")).unwrap(),
            "<button>Go</button>"
        );
        assert!(model.requests()[0].system_prompt.contains("JSON"));

        let handle = dispatcher
            .cache()
            .peek(SessionKey::new(4, GenerationType::SingleFile))
            .await
            .unwrap();
        assert_eq!(handle.memory_len().await, 2);
    }

    #[tokio::test]
    async fn test_structured_path_rejects_project_type() {
        let out = TempDir::new().unwrap();
        let dispatcher = dispatcher(ScriptedModel::new(), &out);

        let err = dispatcher
            .generate_and_save(&RequestContext::new(1, 1), "a shop", GenerationType::MultiStepProject)
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_guardrail_runs_before_model() {
        let out = TempDir::new().unwrap();
        let model = ScriptedModel::new();
        let dispatcher = dispatcher(model.clone(), &out);

        let long = "a".repeat(1001);
        let result = dispatcher
            .generate_stream(&RequestContext::new(1, 1), &long, GenerationType::SingleFile)
            .await;

        assert!(matches!(result, Err(ChatError::Rejected(_))));
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_text_stream_saves_after_completion() {
        let out = TempDir::new().unwrap();
        let model = ScriptedModel::new().with_text_chunks([
            "```html\n<h1>",
            "Hello</h1>\n```",
            "\nDone.",
        ]);
        let dispatcher = dispatcher(model, &out);
        let ctx = RequestContext::new(2, 9);

        let DispatchedStream::Text(stream) = dispatcher
            .generate_stream(&ctx, "a heading", GenerationType::SingleFile)
            .await
            .unwrap()
        else {
            panic!("expected text stream");
        };

        let target = out.path().join("html_9").join("index.html");
        let chunks: Vec<String> = stream.map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks.len(), 3);
        assert_eq!(std::fs::read_to_string(target).unwrap(), "<h1>Hello</h1>");
    }

    #[tokio::test]
    async fn test_text_stream_error_skips_save() {
        let out = TempDir::new().unwrap();
        let model = ScriptedModel::new().with_text(Script::failing(vec!["```html\n<p>".into()], "reset"));
        let dispatcher = dispatcher(model, &out);

        let DispatchedStream::Text(stream) = dispatcher
            .generate_stream(&RequestContext::new(1, 3), "a page", GenerationType::SingleFile)
            .await
            .unwrap()
        else {
            panic!("expected text stream");
        };

        let items: Vec<_> = stream.collect().await;
        assert!(items.last().unwrap().is_err());
        assert!(!out.path().join("html_3").exists());
    }

    #[tokio::test]
    async fn test_unsavable_reply_still_completes() {
        let out = TempDir::new().unwrap();
        let model = ScriptedModel::new().with_text_chunks(["just css\n```css\nbody { margin: 0; }\n```"]);
        let dispatcher = dispatcher(model, &out);
        let ctx = RequestContext::new(1, 12);

        let DispatchedStream::Text(stream) = dispatcher
            .generate_stream(&ctx, "a styled page", GenerationType::MultiFile)
            .await
            .unwrap()
        else {
            panic!("expected text stream");
        };

        let items: Vec<_> = stream.collect().await;
        assert_eq!(items.len(), 1);
        assert!(items.iter().all(|i| i.is_ok()));
        assert!(!out.path().join("multi_file_12").exists());

        let handle = dispatcher
            .cache()
            .peek(SessionKey::new(12, GenerationType::MultiFile))
            .await
            .unwrap();
        assert_eq!(handle.memory_len().await, 2);
    }

    #[tokio::test]
    async fn test_stream_prompt_skips_guardrail() {
        let out = TempDir::new().unwrap();
        let model = ScriptedModel::new().with_text_chunks(["```html\n<p>long</p>\n```"]);
        let dispatcher = dispatcher(model.clone(), &out);

        let long = "a".repeat(1500);
        let DispatchedStream::Text(stream) = dispatcher
            .stream_prompt(&RequestContext::new(1, 13), &long, GenerationType::SingleFile)
            .await
            .unwrap()
        else {
            panic!("expected text stream");
        };
        let _: Vec<_> = stream.collect().await;

        assert_eq!(model.call_count(), 1);
        assert!(out.path().join("html_13/index.html").exists());
    }

    #[tokio::test]
    async fn test_project_stream_remembers_tool_turns() {
        let out = TempDir::new().unwrap();
        let model = ScriptedModel::new().executing_tools().with_events(Script::ok(vec![
            StreamEvent::text("Writing"),
            StreamEvent::ToolRequest {
                id: "c1".into(),
                name: "writeFile".into(),
                arguments: String::new(),
            },
            StreamEvent::ToolExecuted {
                id: "c1".into(),
                name: "writeFile".into(),
                arguments: r#"{"relativeFilePath":"index.html","content":"<div id=\"app\"></div>"}"#.into(),
                result: String::new(),
            },
        ]));
        let dispatcher = dispatcher(model, &out);
        let ctx = RequestContext::new(1, 6);

        let DispatchedStream::Events { events, .. } = dispatcher
            .generate_stream(&ctx, "a vue app", GenerationType::MultiStepProject)
            .await
            .unwrap()
        else {
            panic!("expected event stream");
        };
        let events: Vec<_> = events.collect().await;
        assert_eq!(events.len(), 3);
        assert!(out.path().join("vue_project_6").join("index.html").exists());

        let handle = dispatcher
            .cache()
            .peek(SessionKey::new(6, GenerationType::MultiStepProject))
            .await
            .unwrap();
        // user, assistant with the tool call, tool result
        assert_eq!(handle.memory_len().await, 3);
    }
}
