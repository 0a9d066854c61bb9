//! Chat model collaborators
//!
//! Agents and model-driven selectors talk to language models only through the
//! [`ChatModel`] trait. [`OpenAiClient`] speaks the OpenAI-compatible
//! `/chat/completions` protocol; [`ScriptedModel`] replays canned responses so
//! runs can be tested and replayed deterministically.

pub mod client;
pub mod retry;
pub mod scripted;

pub use client::OpenAiClient;
pub use retry::RetryPolicy;
pub use scripted::ScriptedModel;

use crate::errors::Result;
use crate::tools::ToolSchema;
use crate::types::{ToolCallRequest, Usage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// One message of a model prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,

    /// Speaker name for multi-party prompts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Tool calls made by an assistant message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,

    /// Call answered by a tool message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn with_role(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(ChatRole::Assistant, content)
    }

    /// Assistant message that requested tool calls
    pub fn assistant_tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        let mut msg = Self::with_role(ChatRole::Assistant, "");
        msg.tool_calls = calls;
        msg
    }

    /// Tool output answering `call_id`
    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::with_role(ChatRole::Tool, content);
        msg.tool_call_id = Some(call_id.into());
        msg
    }

    /// Attach a speaker name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A completion request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelRequest {
    /// Prompt messages
    pub messages: Vec<ChatMessage>,

    /// Tools the model may call
    pub tools: Vec<ToolSchema>,

    /// JSON Schema the reply must follow
    pub response_schema: Option<serde_json::Value>,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Whether the model may request several tool calls at once
    pub parallel_tool_calls: Option<bool>,
}

impl ModelRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolSchema>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_response_schema(mut self, schema: Option<serde_json::Value>) -> Self {
        self.response_schema = schema;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_parallel_tool_calls(mut self, parallel: Option<bool>) -> Self {
        self.parallel_tool_calls = parallel;
        self
    }
}

/// A completion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    /// Reply text (empty when the model only called tools)
    pub content: String,

    /// Requested tool calls
    pub tool_calls: Vec<ToolCallRequest>,

    /// Token usage
    pub usage: Option<Usage>,
}

impl ModelResponse {
    /// Plain text reply
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// Reply requesting tool calls
    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            tool_calls: calls,
            ..Default::default()
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A language model endpoint
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier
    fn model_name(&self) -> &str;

    /// Produce one completion
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse>;

    /// Produce one completion, passing text to `on_chunk` as it is generated
    ///
    /// Returns the same response [`complete`](Self::complete) would. Models
    /// that cannot stream report the whole content as one chunk.
    async fn complete_stream(
        &self,
        request: ModelRequest,
        on_chunk: &(dyn for<'a> Fn(&'a str) + Send + Sync),
    ) -> Result<ModelResponse> {
        let response = self.complete(request).await?;
        if !response.content.is_empty() {
            on_chunk(&response.content);
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_message_constructors() {
        let msg = ChatMessage::user("hello").with_name("critic");
        assert_eq!(msg.role, ChatRole::User);
        assert_eq!(msg.name.as_deref(), Some("critic"));

        let tool = ChatMessage::tool("c1", "42");
        assert_eq!(tool.role, ChatRole::Tool);
        assert_eq!(tool.tool_call_id.as_deref(), Some("c1"));
    }

    #[test]
    fn test_request_builder() {
        let request = ModelRequest::new(vec![ChatMessage::system("be brief")])
            .with_temperature(Some(0.2))
            .with_response_schema(Some(json!({"type": "object"})))
            .with_parallel_tool_calls(Some(false));

        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.parallel_tool_calls, Some(false));
        assert!(request.tools.is_empty());
    }

    struct Echo;

    #[async_trait]
    impl ChatModel for Echo {
        fn model_name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: ModelRequest) -> Result<ModelResponse> {
            let last = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(ModelResponse::text(last))
        }
    }

    #[tokio::test]
    async fn test_default_stream_is_one_chunk() {
        let chunks = std::sync::Mutex::new(Vec::new());
        let response = Echo
            .complete_stream(ModelRequest::new(vec![ChatMessage::user("hello there")]), &|text| {
                chunks.lock().unwrap().push(text.to_string())
            })
            .await
            .unwrap();

        assert_eq!(response.content, "hello there");
        assert_eq!(*chunks.lock().unwrap(), vec!["hello there".to_string()]);
    }

    #[test]
    fn test_response_kinds() {
        assert!(!ModelResponse::text("hi").has_tool_calls());

        let calls = vec![ToolCallRequest::new("c1", "sum", json!({"values": [1]}))];
        assert!(ModelResponse::tool_calls(calls).has_tool_calls());
    }
}
