//! OpenAI-compatible chat completions client
//!
//! Endpoint: POST {base_url}/chat/completions. Works against any server that
//! implements the protocol (OpenAI, Ollama's `/v1`, vLLM, llama.cpp).
//! Streamed completions are read as server-sent events.

use crate::errors::{AgentError, Result};
use crate::models::{ChatMessage, ChatModel, ChatRole, ModelRequest, ModelResponse};
use crate::tools::ToolSchema;
use crate::types::{ToolCallRequest, Usage};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Default endpoint (a local Ollama server)
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434/v1";

/// Default model
pub const DEFAULT_MODEL: &str = "qwen2.5:7b-instruct";

/// Default request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Chat completions client
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl OpenAiClient {
    /// Create client with default settings
    pub fn new() -> Result<Self> {
        Self::with_config(DEFAULT_BASE_URL, DEFAULT_MODEL, REQUEST_TIMEOUT)
    }

    /// Create client with custom configuration
    pub fn with_config(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(AgentError::HttpError)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
            timeout,
        })
    }

    /// Authenticate with a bearer token
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Get base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Report client-side timeouts with the configured limit
    fn request_error(&self, err: reqwest::Error) -> AgentError {
        if err.is_timeout() {
            AgentError::Timeout {
                duration_ms: self.timeout.as_millis() as u64,
            }
        } else {
            AgentError::HttpError(err)
        }
    }

    fn build_body(&self, request: &ModelRequest) -> WireRequest {
        let parallel_tool_calls = if request.tools.is_empty() {
            None
        } else {
            request.parallel_tool_calls
        };

        WireRequest {
            model: self.model.clone(),
            messages: request.messages.iter().map(WireMessage::from).collect(),
            tools: request.tools.iter().map(WireTool::from).collect(),
            temperature: request.temperature,
            parallel_tool_calls,
            stream: None,
            stream_options: None,
            response_format: request.response_schema.as_ref().map(|schema| {
                serde_json::json!({
                    "type": "json_schema",
                    "json_schema": {"name": "output", "schema": schema}
                })
            }),
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse> {
        let body = self.build_body(&request);
        let response = self.send(&body).await?;

        let wire: WireResponse = response.json().await.map_err(|e| self.request_error(e))?;
        wire.into_response()
    }

    async fn complete_stream(
        &self,
        request: ModelRequest,
        on_chunk: &(dyn for<'a> Fn(&'a str) + Send + Sync),
    ) -> Result<ModelResponse> {
        let mut body = self.build_body(&request);
        body.stream = Some(true);
        body.stream_options = Some(serde_json::json!({"include_usage": true}));

        let response = self.send(&body).await?;
        let bytes = response.bytes_stream();
        futures_util::pin_mut!(bytes);
        let mut events = EventAccumulator::default();

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| self.request_error(e))?;
            events.feed(&chunk, on_chunk)?;
            if events.done {
                break;
            }
        }

        events.finish(on_chunk)
    }
}

impl OpenAiClient {
    /// POST a request body, failing on non-success status
    async fn send(&self, body: &WireRequest) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!(
            model = %self.model,
            messages = body.messages.len(),
            tools = body.tools.len(),
            stream = body.stream.unwrap_or(false),
            "sending chat completion"
        );

        let mut builder = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AgentError::ModelApiError(format!(
                "HTTP {}: {}",
                status.as_u16(),
                error_text
            )));
        }

        Ok(response)
    }
}

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parallel_tool_calls: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: ChatRole,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl From<&ChatMessage> for WireMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role,
            content: msg.content.clone(),
            name: msg.name.clone(),
            tool_calls: msg
                .tool_calls
                .iter()
                .map(|call| WireToolCall {
                    id: call.id.clone(),
                    kind: "function".to_string(),
                    function: WireFunctionCall {
                        name: call.name.clone(),
                        arguments: call.arguments.to_string(),
                    },
                })
                .collect(),
            tool_call_id: msg.tool_call_id.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

impl From<&ToolSchema> for WireTool {
    fn from(schema: &ToolSchema) -> Self {
        Self {
            kind: "function",
            function: WireFunction {
                name: schema.name.clone(),
                description: schema.description.clone(),
                parameters: schema.parameters.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireReply,
}

#[derive(Debug, Deserialize)]
struct WireReply {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl WireResponse {
    fn into_response(self) -> Result<ModelResponse> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::ModelApiError("response contained no choices".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| tool_call(call.id, call.function.name, call.function.arguments))
            .collect();

        Ok(ModelResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            usage: self
                .usage
                .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens)),
        })
    }
}

fn tool_call(id: String, name: String, arguments: String) -> ToolCallRequest {
    // Arguments that are not valid JSON are passed through as a string
    // so schema validation reports them to the agent.
    let arguments = serde_json::from_str(&arguments).unwrap_or(serde_json::Value::String(arguments));
    let id = if id.is_empty() {
        format!("call_{}", Uuid::new_v4().simple())
    } else {
        id
    };
    ToolCallRequest::new(id, name, arguments)
}

#[derive(Debug, Deserialize)]
struct WireStreamChunk {
    #[serde(default)]
    choices: Vec<WireStreamChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireStreamChoice {
    #[serde(default)]
    delta: WireDelta,
}

#[derive(Debug, Default, Deserialize)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCallDelta {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<WireFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct WireFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Rebuilds a completion from `data:` lines of an event stream
#[derive(Debug, Default)]
struct EventAccumulator {
    /// Bytes after the last newline seen
    pending: Vec<u8>,
    content: String,
    tool_calls: Vec<PartialToolCall>,
    usage: Option<WireUsage>,
    done: bool,
}

impl EventAccumulator {
    fn feed(&mut self, bytes: &[u8], on_chunk: &(dyn Fn(&str) + Send + Sync)) -> Result<()> {
        self.pending.extend_from_slice(bytes);
        while let Some(end) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            self.line(&String::from_utf8_lossy(&line), on_chunk)?;
        }
        Ok(())
    }

    fn line(&mut self, line: &str, on_chunk: &(dyn Fn(&str) + Send + Sync)) -> Result<()> {
        let Some(data) = line.trim().strip_prefix("data:") else {
            return Ok(());
        };
        let data = data.trim();
        if data == "[DONE]" {
            self.done = true;
            return Ok(());
        }

        let chunk: WireStreamChunk = serde_json::from_str(data)?;
        if chunk.usage.is_some() {
            self.usage = chunk.usage;
        }

        for choice in chunk.choices {
            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                on_chunk(&text);
                self.content.push_str(&text);
            }

            for delta in choice.delta.tool_calls.unwrap_or_default() {
                if self.tool_calls.len() <= delta.index {
                    self.tool_calls.resize_with(delta.index + 1, PartialToolCall::default);
                }
                let call = &mut self.tool_calls[delta.index];
                if let Some(id) = delta.id {
                    call.id = id;
                }
                if let Some(function) = delta.function {
                    call.name.push_str(function.name.as_deref().unwrap_or(""));
                    call.arguments.push_str(function.arguments.as_deref().unwrap_or(""));
                }
            }
        }
        Ok(())
    }

    fn finish(mut self, on_chunk: &(dyn Fn(&str) + Send + Sync)) -> Result<ModelResponse> {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.line(&String::from_utf8_lossy(&rest), on_chunk)?;
        }

        Ok(ModelResponse {
            content: self.content,
            tool_calls: self
                .tool_calls
                .into_iter()
                .filter(|call| !call.name.is_empty())
                .map(|call| tool_call(call.id, call.name, call.arguments))
                .collect(),
            usage: self
                .usage
                .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> OpenAiClient {
        OpenAiClient::with_config("http://localhost:8000/v1/", "test-model", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_client_creation() {
        let client = client();
        assert_eq!(client.model_name(), "test-model");
        assert_eq!(client.base_url(), "http://localhost:8000/v1");
    }

    #[test]
    fn test_request_body_with_tools() {
        let request = ModelRequest::new(vec![
            ChatMessage::system("You are a travel agent."),
            ChatMessage::user("Find a hotel").with_name("user"),
        ])
        .with_tools(vec![ToolSchema::new(
            "lookup_hotel",
            "Look up hotels",
            json!({"type": "object"}),
        )])
        .with_parallel_tool_calls(Some(false));

        let body = serde_json::to_value(client().build_body(&request)).unwrap();

        assert_eq!(body["model"], "test-model");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["tools"][0]["function"]["name"], "lookup_hotel");
        assert_eq!(body["parallel_tool_calls"], false);
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_parallel_flag_omitted_without_tools() {
        let request = ModelRequest::new(vec![ChatMessage::user("hi")]).with_parallel_tool_calls(Some(false));
        let body = serde_json::to_value(client().build_body(&request)).unwrap();

        assert!(body.get("parallel_tool_calls").is_none());
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_parse_tool_call_response() {
        let wire: WireResponse = serde_json::from_value(json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "sum", "arguments": "{\"values\": [1, 2]}"}
                    }]
                }
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        }))
        .unwrap();

        let response = wire.into_response().unwrap();
        assert_eq!(response.content, "");
        assert_eq!(response.tool_calls[0].arguments, json!({"values": [1, 2]}));
        assert_eq!(response.usage, Some(Usage::new(12, 3)));
    }

    #[test]
    fn test_malformed_arguments_kept_as_string() {
        let wire: WireResponse = serde_json::from_value(json!({
            "choices": [{
                "message": {
                    "tool_calls": [{"function": {"name": "sum", "arguments": "{oops"}}]
                }
            }]
        }))
        .unwrap();

        let response = wire.into_response().unwrap();
        assert_eq!(response.tool_calls[0].arguments, json!("{oops"));
        assert!(response.tool_calls[0].id.starts_with("call_"));
    }

    #[test]
    fn test_empty_choices_is_error() {
        let wire: WireResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(wire.into_response().is_err());
    }

    #[tokio::test]
    async fn test_unanswered_request_times_out() {
        // Accepts the connection and never writes a response
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let client = OpenAiClient::with_config(
            &format!("http://{}/v1", addr),
            "test-model",
            Duration::from_millis(100),
        )
        .unwrap();
        let result = client
            .complete(ModelRequest::new(vec![ChatMessage::user("hi")]))
            .await;

        assert!(matches!(result, Err(AgentError::Timeout { duration_ms: 100 })));
        assert!(result.unwrap_err().is_retryable());
        server.abort();
    }

    fn collect(accumulator: &mut EventAccumulator, parts: &[&str], seen: &std::sync::Mutex<Vec<String>>) {
        for part in parts {
            accumulator
                .feed(part.as_bytes(), &|text| seen.lock().unwrap().push(text.to_string()))
                .unwrap();
        }
    }

    #[test]
    fn test_event_stream_text_split_across_reads() {
        let seen = std::sync::Mutex::new(Vec::new());
        let mut events = EventAccumulator::default();
        collect(
            &mut events,
            &[
                "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"Leaves \"}}]}\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"dri",
                "ft\"}}]}\n\ndata: {\"choices\":[],\"usage\":{\"prompt_tokens\":9,\"completion_tokens\":2}}\n\n",
                "data: [DONE]\n\n",
            ],
            &seen,
        );

        assert!(events.done);
        let response = events.finish(&|_| {}).unwrap();
        assert_eq!(response.content, "Leaves drift");
        assert_eq!(*seen.lock().unwrap(), vec!["Leaves ", "drift"]);
        assert_eq!(response.usage, Some(Usage::new(9, 2)));
    }

    #[test]
    fn test_event_stream_tool_call_fragments() {
        let seen = std::sync::Mutex::new(Vec::new());
        let mut events = EventAccumulator::default();
        collect(
            &mut events,
            &[
                "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_7\",\"function\":{\"name\":\"sum\",\"arguments\":\"{\\\"values\\\": \"}}]}}]}\n",
                "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"[1, 2]}\"}}]}}]}",
            ],
            &seen,
        );

        // The last event has no trailing newline
        let response = events.finish(&|_| {}).unwrap();
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].id, "call_7");
        assert_eq!(response.tool_calls[0].arguments, json!({"values": [1, 2]}));
    }

    #[tokio::test]
    async fn test_streamed_completion_over_http() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\", world\"}}]}\n\n",
            "data: [DONE]\n\n"
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            use tokio::io::{AsyncReadExt, AsyncWriteExt};
            let (mut socket, _) = listener.accept().await.unwrap();

            // Read the whole request before answering
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let length = text[..head_end]
                        .lines()
                        .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().to_string()))
                        .and_then(|v| v.parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        let client =
            OpenAiClient::with_config(&format!("http://{}/v1", addr), "test-model", Duration::from_secs(5)).unwrap();
        let seen = std::sync::Mutex::new(Vec::new());
        let response = client
            .complete_stream(ModelRequest::new(vec![ChatMessage::user("hi")]), &|text| {
                seen.lock().unwrap().push(text.to_string())
            })
            .await
            .unwrap();

        assert_eq!(response.content, "Hello, world");
        assert_eq!(*seen.lock().unwrap(), vec!["Hello", ", world"]);
        server.await.unwrap();
    }
}
