//! Model adapter for OpenAI-compatible chat-completions endpoints.
//!
//! Implements all three capability shapes. Streaming uses server-sent
//! events; the tool-augmented stream runs the call/execute/feed-back loop
//! itself and reports each step as a [`StreamEvent`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use kiln_core::config::LlmConfig;
use kiln_core::{GenerationType, RequestContext};

use crate::artifact::{CodeArtifact, HtmlCode, MultiFileCode};
use crate::error::{CodegenError, CodegenResult};
use crate::model::{
    EventStream, ModelMessage, ModelRequest, StreamEvent, StreamingModel, StructuredModel,
    TextStream, ToolCall, ToolStreamingModel,
};
use crate::tools::ToolSet;

/// Chat-completions client.
#[derive(Clone)]
pub struct OpenAiModel {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_retries: u32,
    max_tool_invocations: usize,
}

impl OpenAiModel {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_retries: 3,
            max_tool_invocations: 30,
        }
    }

    /// Build from configuration. Fails when no API key is configured.
    pub fn from_config(config: &LlmConfig, max_tool_invocations: usize) -> CodegenResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| CodegenError::ModelNotConfigured("no API key (set OPENAI_API_KEY)".into()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key,
            model: config.model.clone(),
            max_retries: config.max_retries.max(1),
            max_tool_invocations,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// POST with retries on network errors, 5xx and 429.
    async fn send(&self, body: &ChatRequest, ctx: &RequestContext) -> CodegenResult<reqwest::Response> {
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = Duration::from_secs(1 << (attempt - 1));
                tokio::time::sleep(delay).await;
            }

            let response = match self
                .client
                .post(self.endpoint())
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(app_id = ctx.app_id, "Model request failed (attempt {}): {}", attempt + 1, e);
                    last_error = Some(CodegenError::Model(format!("Network error: {}", e)));
                    continue;
                }
            };

            let status = response.status();
            if status.is_server_error() || status.as_u16() == 429 {
                let text = response.text().await.unwrap_or_default();
                last_error = Some(CodegenError::Model(format!(
                    "API error {} (attempt {}/{}): {}",
                    status,
                    attempt + 1,
                    self.max_retries,
                    text
                )));
                continue;
            }

            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(CodegenError::Model(format!("API error {}: {}", status, text)));
            }

            return Ok(response);
        }

        Err(last_error.unwrap_or_else(|| CodegenError::Model("Max retries exceeded".to_string())))
    }

    fn body(&self, messages: Vec<WireMessage>, stream: bool) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages,
            stream,
            stream_options: stream.then(|| json!({"include_usage": true})),
            tools: Vec::new(),
            response_format: None,
        }
    }
}

#[async_trait]
impl StructuredModel for OpenAiModel {
    async fn generate_structured(&self, request: ModelRequest) -> CodegenResult<CodeArtifact> {
        let ctx = &request.context;
        let started = Instant::now();
        info!(
            app_id = ctx.app_id,
            request_id = %ctx.request_id,
            model = %self.model,
            "Structured model call started"
        );

        let mut body = self.body(to_wire(&request.system_prompt, &request.messages), false);
        body.response_format = Some(json!({"type": "json_object"}));

        let response: ChatResponse = self.send(&body, ctx).await?.json().await?;
        log_usage(ctx, response.usage.as_ref(), started);

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CodegenError::Model("empty response".to_string()))?;
        parse_structured(&content, request.generation_type)
    }
}

#[async_trait]
impl StreamingModel for OpenAiModel {
    async fn generate_stream(&self, request: ModelRequest) -> CodegenResult<TextStream> {
        let ctx = request.context.clone();
        info!(
            app_id = ctx.app_id,
            request_id = %ctx.request_id,
            model = %self.model,
            "Streaming model call started"
        );

        let body = self.body(to_wire(&request.system_prompt, &request.messages), true);
        let response = self.send(&body, &ctx).await?;
        Ok(Box::pin(text_deltas(
            sse_chunks(response.bytes_stream()),
            ctx,
            Instant::now(),
        )))
    }
}

#[async_trait]
impl ToolStreamingModel for OpenAiModel {
    async fn generate_stream_with_tools(
        &self,
        request: ModelRequest,
        tools: Arc<ToolSet>,
    ) -> CodegenResult<EventStream> {
        info!(
            app_id = request.context.app_id,
            request_id = %request.context.request_id,
            model = %self.model,
            tools = ?tools.names(),
            "Tool streaming model call started"
        );
        Ok(Box::pin(tool_events(self.clone(), request, tools)))
    }
}

/// Content deltas of one streamed completion.
fn text_deltas<S>(chunks: S, ctx: RequestContext, started: Instant) -> impl Stream<Item = CodegenResult<String>> + Send + 'static
where
    S: Stream<Item = CodegenResult<StreamChunk>> + Send + 'static,
{
    try_stream! {
        futures::pin_mut!(chunks);
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            if chunk.usage.is_some() {
                log_usage(&ctx, chunk.usage.as_ref(), started);
            }
            for choice in chunk.choices {
                if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                    yield text;
                }
            }
        }
    }
}

/// Tool call being assembled from streamed deltas.
#[derive(Debug, Default)]
struct PendingCall {
    id: String,
    name: String,
    arguments: String,
}

/// Fold one tool-call delta into its slot.
///
/// The id is fixed by the first delta of a call: the provider's id, or
/// `call_{round}_{index}` when the provider sends none, so the request
/// announcement and the executed event always agree.
fn merge_tool_delta(pending: &mut Vec<PendingCall>, call: DeltaToolCall, round: usize) -> &PendingCall {
    while pending.len() <= call.index {
        pending.push(PendingCall::default());
    }
    let slot = &mut pending[call.index];
    if slot.id.is_empty() {
        slot.id = call
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("call_{}_{}", round, call.index));
    }
    if let Some(function) = call.function {
        if let Some(name) = function.name {
            slot.name.push_str(&name);
        }
        if let Some(arguments) = function.arguments {
            slot.arguments.push_str(&arguments);
        }
    }
    slot
}

/// The call / execute / feed-back loop, flattened into one event stream.
fn tool_events(
    model: OpenAiModel,
    request: ModelRequest,
    tools: Arc<ToolSet>,
) -> impl Stream<Item = CodegenResult<StreamEvent>> + Send + 'static {
    try_stream! {
        let ctx = request.context.clone();
        let definitions = tools.definitions();
        let mut messages = to_wire(&request.system_prompt, &request.messages);
        let mut invocations = 0usize;
        let mut round = 0usize;

        loop {
            round += 1;
            let started = Instant::now();
            let mut body = model.body(messages.clone(), true);
            body.tools = definitions.clone();
            let response = model.send(&body, &ctx).await?;

            let chunks = sse_chunks(response.bytes_stream());
            futures::pin_mut!(chunks);
            let mut text = String::new();
            let mut pending: Vec<PendingCall> = Vec::new();

            while let Some(chunk) = chunks.next().await {
                let chunk = chunk?;
                if chunk.usage.is_some() {
                    log_usage(&ctx, chunk.usage.as_ref(), started);
                }
                for choice in chunk.choices {
                    if let Some(delta) = choice.delta.content.filter(|t| !t.is_empty()) {
                        text.push_str(&delta);
                        yield StreamEvent::text(delta);
                    }
                    for call in choice.delta.tool_calls {
                        let slot = merge_tool_delta(&mut pending, call, round);
                        yield StreamEvent::ToolRequest {
                            id: slot.id.clone(),
                            name: slot.name.clone(),
                            arguments: slot.arguments.clone(),
                        };
                    }
                }
            }

            if pending.is_empty() {
                break;
            }

            invocations += pending.len();
            if invocations > model.max_tool_invocations {
                Err(CodegenError::ToolLimit(model.max_tool_invocations))?;
            }

            let calls: Vec<ToolCall> = pending
                .into_iter()
                .map(|p| ToolCall {
                    id: p.id,
                    name: p.name,
                    arguments: p.arguments,
                })
                .collect();
            messages.push(WireMessage::assistant(text, &calls));

            for call in calls {
                let result = tools.execute(&ctx, &call).await;
                debug!(app_id = ctx.app_id, "Tool {} finished", call.name);
                yield StreamEvent::ToolExecuted {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                    result: result.clone(),
                };
                messages.push(WireMessage::tool(call.id, result));
            }
        }
    }
}

/// Parse `data:` lines of a server-sent event byte stream into chunks.
fn sse_chunks<S, B, E>(bytes: S) -> impl Stream<Item = CodegenResult<StreamChunk>> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<CodegenError> + Send + 'static,
{
    try_stream! {
        futures::pin_mut!(bytes);
        let mut buffer: Vec<u8> = Vec::new();
        'read: while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(Into::into)?;
            buffer.extend_from_slice(chunk.as_ref());

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                let Some(data) = line.trim().strip_prefix("data:") else {
                    continue;
                };
                let data = data.trim();
                if data == "[DONE]" {
                    break 'read;
                }
                if data.is_empty() {
                    continue;
                }
                let parsed: StreamChunk = serde_json::from_str(data)?;
                yield parsed;
            }
        }
    }
}

fn log_usage(ctx: &RequestContext, usage: Option<&Usage>, started: Instant) {
    let (input, output) = usage
        .map(|u| (u.prompt_tokens, u.completion_tokens))
        .unwrap_or((0, 0));
    info!(
        app_id = ctx.app_id,
        user_id = ctx.user_id,
        request_id = %ctx.request_id,
        input_tokens = input,
        output_tokens = output,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Model call completed"
    );
}

/// Decode a structured answer, tolerating a surrounding markdown fence.
fn parse_structured(content: &str, generation_type: GenerationType) -> CodegenResult<CodeArtifact> {
    let trimmed = content.trim();
    let json = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    match generation_type {
        GenerationType::SingleFile => Ok(CodeArtifact::Html(serde_json::from_str::<HtmlCode>(json)?)),
        GenerationType::MultiFile => Ok(CodeArtifact::MultiFile(serde_json::from_str::<MultiFileCode>(json)?)),
        GenerationType::MultiStepProject => Err(CodegenError::UnsupportedType(generation_type)),
    }
}

fn to_wire(system_prompt: &str, messages: &[ModelMessage]) -> Vec<WireMessage> {
    let mut wire = Vec::with_capacity(messages.len() + 1);
    if !system_prompt.is_empty() {
        wire.push(WireMessage::text("system", system_prompt.to_string()));
    }
    for message in messages {
        wire.push(match message {
            ModelMessage::User { text } => WireMessage::text("user", text.clone()),
            ModelMessage::Assistant { text, tool_calls } => WireMessage::assistant(text.clone(), tool_calls),
            ModelMessage::ToolResult { id, content, .. } => WireMessage::tool(id.clone(), content.clone()),
        });
    }
    wire
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
struct WireMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl WireMessage {
    fn text(role: &'static str, content: String) -> Self {
        Self {
            role,
            content: Some(content),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    fn assistant(text: String, calls: &[ToolCall]) -> Self {
        Self {
            role: "assistant",
            content: (!text.is_empty() || calls.is_empty()).then_some(text),
            tool_calls: calls
                .iter()
                .map(|c| WireToolCall {
                    id: c.id.clone(),
                    kind: "function",
                    function: WireFunction {
                        name: c.name.clone(),
                        arguments: c.arguments.clone(),
                    },
                })
                .collect(),
            tool_call_id: None,
        }
    }

    fn tool(id: String, content: String) -> Self {
        Self {
            role: "tool",
            content: Some(content),
            tool_calls: Vec::new(),
            tool_call_id: Some(id),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction,
}

#[derive(Debug, Clone, Serialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ResponseChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<DeltaToolCall>,
}

#[derive(Debug, Deserialize)]
struct DeltaToolCall {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<DeltaFunction>,
}

#[derive(Debug, Deserialize)]
struct DeltaFunction {
    name: Option<String>,
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn sse(lines: &[&str]) -> Vec<Result<Vec<u8>, CodegenError>> {
        // Split in the middle of a line to exercise buffering.
        let joined: String = lines.iter().map(|l| format!("{}\n\n", l)).collect();
        let bytes = joined.into_bytes();
        let mid = bytes.len() / 2;
        vec![Ok(bytes[..mid].to_vec()), Ok(bytes[mid..].to_vec())]
    }

    #[tokio::test]
    async fn test_sse_text_deltas() {
        let body = sse(&[
            r#"data: {"choices":[{"delta":{"content":"Hello"}}]}"#,
            r#"data: {"choices":[{"delta":{"content":" world"}}]}"#,
            r#"data: {"choices":[],"usage":{"prompt_tokens":3,"completion_tokens":2}}"#,
            "data: [DONE]",
            r#"data: {"choices":[{"delta":{"content":"ignored"}}]}"#,
        ]);

        let deltas: Vec<String> = text_deltas(
            sse_chunks(stream::iter(body)),
            RequestContext::new(1, 1),
            Instant::now(),
        )
        .map(|r| r.unwrap())
        .collect()
        .await;

        assert_eq!(deltas, vec!["Hello".to_string(), " world".to_string()]);
    }

    #[tokio::test]
    async fn test_sse_tool_call_deltas() {
        let body = sse(&[
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"writeFile","arguments":""}}]}}]}"#,
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"relativeFilePath\":"}}]}}]}"#,
        ]);

        let chunks: Vec<StreamChunk> = sse_chunks(stream::iter(body))
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(chunks.len(), 2);
        let first = &chunks[0].choices[0].delta.tool_calls[0];
        assert_eq!(first.id.as_deref(), Some("call_1"));
        let second = &chunks[1].choices[0].delta.tool_calls[0];
        assert!(second.id.is_none());
        assert_eq!(
            second.function.as_ref().and_then(|f| f.arguments.as_deref()),
            Some("{\"relativeFilePath\":")
        );
    }

    #[tokio::test]
    async fn test_tool_delta_without_id_gets_stable_id() {
        let body = sse(&[
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"name":"readFile","arguments":""}}]}}]}"#,
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":1,"id":"call_b","function":{"name":"readDir"}}]}}]}"#,
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"relativeFilePath\":\"a\"}"}}]}}]}"#,
        ]);
        let chunks: Vec<StreamChunk> = sse_chunks(stream::iter(body))
            .map(|r| r.unwrap())
            .collect()
            .await;

        let mut pending = Vec::new();
        let mut announced = Vec::new();
        for chunk in chunks {
            for choice in chunk.choices {
                for call in choice.delta.tool_calls {
                    announced.push(merge_tool_delta(&mut pending, call, 2).id.clone());
                }
            }
        }

        assert_eq!(announced, vec!["call_2_0", "call_b", "call_2_0"]);
        assert_eq!(pending[0].id, "call_2_0");
        assert_eq!(pending[0].name, "readFile");
        assert_eq!(pending[0].arguments, r#"{"relativeFilePath":"a"}"#);
        assert_eq!(pending[1].id, "call_b");
    }

    #[tokio::test]
    async fn test_sse_malformed_chunk_is_error() {
        let body = sse(&["data: {not json"]);
        let results: Vec<_> = sse_chunks(stream::iter(body)).collect().await;
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(CodegenError::Serialization(_))));
    }

    #[test]
    fn test_parse_structured() {
        let artifact = parse_structured(
            "```json\n{\"htmlCode\":\"<p>hi</p>\",\"description\":\"greeting\"}\n```",
            GenerationType::SingleFile,
        )
        .unwrap();
        assert_eq!(artifact.html(), Some("<p>hi</p>"));

        let multi = parse_structured(
            r#"{"htmlCode":"<p></p>","cssCode":"p{}","jsCode":"x()"}"#,
            GenerationType::MultiFile,
        )
        .unwrap();
        assert_eq!(multi.files().len(), 3);

        assert!(parse_structured("{}", GenerationType::MultiStepProject).is_err());
    }

    #[test]
    fn test_to_wire_with_tool_turns() {
        let messages = vec![
            ModelMessage::user("build it"),
            ModelMessage::Assistant {
                text: String::new(),
                tool_calls: vec![ToolCall {
                    id: "c1".into(),
                    name: "writeFile".into(),
                    arguments: "{}".into(),
                }],
            },
            ModelMessage::ToolResult {
                id: "c1".into(),
                name: "writeFile".into(),
                content: "File written: index.html".into(),
            },
        ];

        let wire = serde_json::to_value(to_wire("sys", &messages)).unwrap();

        assert_eq!(wire[0]["role"], "system");
        assert_eq!(wire[2]["role"], "assistant");
        assert!(wire[2]["content"].is_null());
        assert_eq!(wire[2]["tool_calls"][0]["type"], "function");
        assert_eq!(wire[3]["role"], "tool");
        assert_eq!(wire[3]["tool_call_id"], "c1");
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = LlmConfig::default();
        assert!(matches!(
            OpenAiModel::from_config(&config, 30),
            Err(CodegenError::ModelNotConfigured(_))
        ));
    }
}
