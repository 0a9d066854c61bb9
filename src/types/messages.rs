//! Message types for agent communication
//!
//! Defines the messages that make up a conversation: plain contributions,
//! tool-call requests, tool results and handoffs. A message is never mutated
//! after it has been appended to a conversation.

use crate::tools::ToolResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;
use uuid::Uuid;

/// Source name used for the task that seeds every conversation
pub const USER_SOURCE: &str = "user";

/// Kind of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Free-form contribution from an agent (or the task itself)
    Plain,

    /// Agent requested one or more tool invocations
    ToolCall,

    /// Results of the tool invocations requested in the same turn
    ToolResult,

    /// Agent designated the next speaker
    Handoff,
}

/// Message payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain text
    Text(String),

    /// Structured JSON payload (validated agent output)
    Structured(serde_json::Value),
}

impl MessageContent {
    /// Render the payload as text
    pub fn as_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Structured(value) => value.to_string(),
        }
    }

    /// Check whether the rendered payload contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        match self {
            MessageContent::Text(text) => text.contains(needle),
            MessageContent::Structured(value) => value.to_string().contains(needle),
        }
    }

    /// Get structured payload if present
    pub fn as_structured(&self) -> Option<&serde_json::Value> {
        match self {
            MessageContent::Structured(value) => Some(value),
            MessageContent::Text(_) => None,
        }
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Text(text)
    }
}

/// A tool invocation requested by a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Call identifier assigned by the model (or generated)
    pub id: String,

    /// Tool name
    pub name: String,

    /// JSON arguments
    pub arguments: serde_json::Value,
}

impl ToolCallRequest {
    /// Create new tool call request
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Token usage reported by a model completion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl Usage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, other: Self) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }
}

/// A single conversation message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message id
    pub id: Uuid,

    /// Name of the participant that produced the message
    pub source: String,

    /// Message kind
    pub kind: MessageKind,

    /// Payload
    pub content: MessageContent,

    /// Next speaker designated by a handoff
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handoff_target: Option<String>,

    /// Tool calls carried by a `ToolCall` message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,

    /// Tool results carried by a `ToolResult` message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolResult>,

    /// Model usage spent producing this message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn base(source: impl Into<String>, kind: MessageKind, content: MessageContent) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            kind,
            content,
            handoff_target: None,
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            usage: None,
            created_at: Utc::now(),
        }
    }

    /// Task message that seeds a conversation
    pub fn task(task: impl Into<String>) -> Self {
        Self::base(USER_SOURCE, MessageKind::Plain, MessageContent::Text(task.into()))
    }

    /// Plain text contribution
    pub fn text(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self::base(source, MessageKind::Plain, MessageContent::Text(text.into()))
    }

    /// Structured contribution
    pub fn structured(source: impl Into<String>, value: serde_json::Value) -> Self {
        Self::base(source, MessageKind::Plain, MessageContent::Structured(value))
    }

    /// Tool call request message
    pub fn tool_call(source: impl Into<String>, calls: Vec<ToolCallRequest>) -> Self {
        let summary = calls
            .iter()
            .map(|c| format!("{}({})", c.name, c.arguments))
            .collect::<Vec<_>>()
            .join(", ");
        let mut msg = Self::base(source, MessageKind::ToolCall, MessageContent::Text(summary));
        msg.tool_calls = calls;
        msg
    }

    /// Tool result message
    pub fn tool_result(source: impl Into<String>, results: Vec<ToolResult>) -> Self {
        let summary = results
            .iter()
            .map(|r| r.render())
            .collect::<Vec<_>>()
            .join("\n");
        let mut msg = Self::base(source, MessageKind::ToolResult, MessageContent::Text(summary));
        msg.tool_results = results;
        msg
    }

    /// Handoff to another participant
    pub fn handoff(
        source: impl Into<String>,
        target: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let mut msg = Self::base(source, MessageKind::Handoff, MessageContent::Text(text.into()));
        msg.handoff_target = Some(target.into());
        msg
    }

    /// Attach usage information
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Rendered text of the payload
    pub fn text_content(&self) -> String {
        self.content.as_text()
    }

    /// Whether the message came from the task seed
    pub fn is_task(&self) -> bool {
        self.source == USER_SOURCE
    }

    /// Compare everything except identity and creation time
    pub fn payload_eq(&self, other: &Message) -> bool {
        self.source == other.source
            && self.kind == other.kind
            && self.content == other.content
            && self.handoff_target == other.handoff_target
            && self.tool_calls == other.tool_calls
    }

    /// Estimate token count for this message
    pub fn estimate_tokens(&self) -> usize {
        // Heuristic: 1 token ≈ 4 characters
        (self.source.len() + self.text_content().chars().count()) / 4
    }
}
