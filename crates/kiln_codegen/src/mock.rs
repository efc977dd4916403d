//! Scripted model for testing.
//!
//! Provides a configurable implementation of all three model capabilities
//! for use in tests and offline runs without a model endpoint.

use std::collections::VecDeque;
use std::sync::Arc;

use async_stream::stream;
use async_trait::async_trait;
use parking_lot::RwLock;

use crate::artifact::CodeArtifact;
use crate::error::{CodegenError, CodegenResult};
use crate::model::{
    EventStream, ModelRequest, StreamEvent, StreamingModel, StructuredModel, TextStream, ToolCall,
    ToolStreamingModel,
};
use crate::tools::ToolSet;

/// One scripted stream: items followed by an optional failure.
#[derive(Debug, Clone)]
pub struct Script<T> {
    pub items: Vec<T>,
    pub failure: Option<String>,
}

impl<T> Script<T> {
    pub fn ok(items: Vec<T>) -> Self {
        Self { items, failure: None }
    }

    pub fn failing(items: Vec<T>, message: impl Into<String>) -> Self {
        Self {
            items,
            failure: Some(message.into()),
        }
    }
}

/// Model that replays predefined responses and records every request.
///
/// Scripts are consumed in order. When a queue is empty the call fails, so a
/// test notices an unexpected extra call. With `execute_tools` set, scripted
/// `ToolExecuted` events really run against the tool set and carry the real
/// result.
#[derive(Clone, Default)]
pub struct ScriptedModel {
    artifacts: Arc<RwLock<VecDeque<CodeArtifact>>>,
    texts: Arc<RwLock<VecDeque<Script<String>>>>,
    events: Arc<RwLock<VecDeque<Script<StreamEvent>>>>,
    requests: Arc<RwLock<Vec<ModelRequest>>>,
    execute_tools: bool,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_artifact(self, artifact: CodeArtifact) -> Self {
        self.artifacts.write().push_back(artifact);
        self
    }

    pub fn with_text(self, script: Script<String>) -> Self {
        self.texts.write().push_back(script);
        self
    }

    /// Convenience for a successful text stream.
    pub fn with_text_chunks<S: Into<String>>(self, chunks: impl IntoIterator<Item = S>) -> Self {
        self.with_text(Script::ok(chunks.into_iter().map(Into::into).collect()))
    }

    pub fn with_events(self, script: Script<StreamEvent>) -> Self {
        self.events.write().push_back(script);
        self
    }

    pub fn executing_tools(mut self) -> Self {
        self.execute_tools = true;
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.read().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.read().len()
    }

    fn record(&self, request: ModelRequest) {
        self.requests.write().push(request);
    }
}

#[async_trait]
impl StructuredModel for ScriptedModel {
    async fn generate_structured(&self, request: ModelRequest) -> CodegenResult<CodeArtifact> {
        self.record(request);
        self.artifacts
            .write()
            .pop_front()
            .ok_or_else(|| CodegenError::Model("no scripted artifact".to_string()))
    }
}

#[async_trait]
impl StreamingModel for ScriptedModel {
    async fn generate_stream(&self, request: ModelRequest) -> CodegenResult<TextStream> {
        self.record(request);
        let script = self
            .texts
            .write()
            .pop_front()
            .ok_or_else(|| CodegenError::Model("no scripted text stream".to_string()))?;

        Ok(Box::pin(stream! {
            for item in script.items {
                yield Ok(item);
            }
            if let Some(message) = script.failure {
                yield Err(CodegenError::Model(message));
            }
        }))
    }
}

#[async_trait]
impl ToolStreamingModel for ScriptedModel {
    async fn generate_stream_with_tools(
        &self,
        request: ModelRequest,
        tools: Arc<ToolSet>,
    ) -> CodegenResult<EventStream> {
        let ctx = request.context.clone();
        self.record(request);
        let script = self
            .events
            .write()
            .pop_front()
            .ok_or_else(|| CodegenError::Model("no scripted event stream".to_string()))?;
        let execute_tools = self.execute_tools;

        Ok(Box::pin(stream! {
            for event in script.items {
                match event {
                    StreamEvent::ToolExecuted { id, name, arguments, .. } if execute_tools => {
                        let call = ToolCall { id, name, arguments };
                        let real = tools.execute(&ctx, &call).await;
                        yield Ok(StreamEvent::ToolExecuted {
                            id: call.id,
                            name: call.name,
                            arguments: call.arguments,
                            result: real,
                        });
                    }
                    other => {
                        yield Ok(other);
                    }
                }
            }
            if let Some(message) = script.failure {
                yield Err(CodegenError::Model(message));
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::HtmlCode;
    use crate::model::ModelMessage;
    use futures::StreamExt;
    use kiln_core::{GenerationType, RequestContext};

    fn request() -> ModelRequest {
        ModelRequest {
            context: RequestContext::new(1, 7),
            generation_type: GenerationType::SingleFile,
            system_prompt: String::new(),
            messages: vec![ModelMessage::user("hi")],
        }
    }

    #[tokio::test]
    async fn test_text_script_then_failure() {
        let model = ScriptedModel::new().with_text(Script::failing(vec!["a".into()], "boom"));

        let items: Vec<_> = model.generate_stream(request()).await.unwrap().collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "a");
        assert!(items[1].is_err());

        // Queue exhausted
        assert!(model.generate_stream(request()).await.is_err());
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn test_structured_script() {
        let model = ScriptedModel::new().with_artifact(CodeArtifact::Html(HtmlCode {
            html_code: Some("<p/>".into()),
            description: None,
        }));
        let artifact = model.generate_structured(request()).await.unwrap();
        assert_eq!(artifact.html(), Some("<p/>"));
        assert_eq!(model.requests()[0].user_text(), "hi");
    }

    #[tokio::test]
    async fn test_executing_tools_runs_real_tool() {
        let dir = tempfile::tempdir().unwrap();
        let tools = Arc::new(ToolSet::for_project(dir.path(), 7));
        let model = ScriptedModel::new()
            .executing_tools()
            .with_events(Script::ok(vec![StreamEvent::ToolExecuted {
                id: "c1".into(),
                name: "writeFile".into(),
                arguments: r#"{"relativeFilePath":"index.html","content":"<div/>"}"#.into(),
                result: String::new(),
            }]));

        let events: Vec<_> = model
            .generate_stream_with_tools(request(), tools.clone())
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(events.len(), 1);
        assert!(tools.project_root().join("index.html").exists());
    }
}
