//! Agents
//!
//! An agent reads the shared conversation and produces its turn: one or more
//! messages the run loop appends in order. Agents never append to the
//! conversation themselves.

pub mod descriptor;
pub mod human_proxy;
pub mod model_agent;
pub mod roster;
pub mod state;
pub mod team_agent;

pub use descriptor::AgentDescriptor;
pub use human_proxy::HumanProxyAgent;
pub use model_agent::{ModelAgent, DEFAULT_MAX_TOOL_ITERATIONS};
pub use roster::AgentRoster;
pub use state::{RunState, StateEvent};
pub use team_agent::TeamAgent;

use crate::conversation::Conversation;
use crate::errors::Result;
use crate::memory::{MemoryBinding, MemoryItem};
use crate::types::Message;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::warn;

/// Partial output of a turn, forwarded while the agent is still working
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnChunk {
    pub agent: String,
    pub text: String,
}

/// Channel a turn streams its partial output into
pub type ChunkSender = mpsc::UnboundedSender<TurnChunk>;

/// Everything an agent sees when it takes a turn
#[derive(Debug, Clone, Copy)]
pub struct TurnContext<'a> {
    /// Full conversation so far
    pub conversation: &'a Conversation,

    /// Items retrieved from bound memory sources
    pub memory_context: &'a [MemoryItem],

    /// Instruction from the selector for this turn
    pub instruction: Option<&'a str>,

    /// Zero-based index of this turn
    pub turn: usize,

    /// Output schema overriding the agent's own
    pub output_schema: Option<&'a Value>,

    /// Where to stream partial output, if the run consumer wants it
    pub chunks: Option<&'a ChunkSender>,
}

impl<'a> TurnContext<'a> {
    pub fn new(conversation: &'a Conversation) -> Self {
        Self {
            conversation,
            memory_context: &[],
            instruction: None,
            turn: 0,
            output_schema: None,
            chunks: None,
        }
    }

    pub fn with_memory(mut self, items: &'a [MemoryItem]) -> Self {
        self.memory_context = items;
        self
    }

    pub fn with_instruction(mut self, instruction: Option<&'a str>) -> Self {
        self.instruction = instruction;
        self
    }

    pub fn with_turn(mut self, turn: usize) -> Self {
        self.turn = turn;
        self
    }

    pub fn with_output_schema(mut self, schema: Option<&'a Value>) -> Self {
        self.output_schema = schema;
        self
    }

    pub fn with_chunks(mut self, chunks: Option<&'a ChunkSender>) -> Self {
        self.chunks = chunks;
        self
    }

    /// Text the agent should respond to: the instruction if any, else the latest message
    pub fn prompt(&self) -> String {
        match self.instruction {
            Some(instruction) => instruction.to_string(),
            None => self
                .conversation
                .last()
                .map(|m| m.text_content())
                .unwrap_or_default(),
        }
    }
}

/// Messages produced by one turn, in append order
#[derive(Debug, Clone, Default)]
pub struct AgentReply {
    pub messages: Vec<Message>,
}

impl AgentReply {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Reply consisting of one message
    pub fn single(message: Message) -> Self {
        Self {
            messages: vec![message],
        }
    }

    /// Message that concludes the turn
    pub fn final_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// A conversation participant
#[async_trait]
pub trait Agent: Send + Sync {
    /// Static identity
    fn descriptor(&self) -> &AgentDescriptor;

    /// Unique name
    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Produce this agent's turn
    async fn respond(&self, ctx: &TurnContext<'_>) -> Result<AgentReply>;

    /// Drop any state accumulated across runs
    async fn reset(&self) -> Result<()> {
        Ok(())
    }
}

/// Query every binding with `query`, skipping sources that fail
pub async fn gather_memory<'a, I>(bindings: I, query: &str) -> Vec<MemoryItem>
where
    I: IntoIterator<Item = &'a MemoryBinding>,
{
    let mut items = Vec::new();
    for binding in bindings {
        match binding.source.query(query).await {
            Ok(found) => items.extend(found),
            Err(e) => warn!(source = binding.source.name(), error = %e, "memory query failed"),
        }
    }
    items
}

/// Record a completed turn into every write-on-completion binding
pub async fn record_completion<'a, I>(bindings: I, agent: &str, text: &str)
where
    I: IntoIterator<Item = &'a MemoryBinding>,
{
    if text.is_empty() {
        return;
    }

    for binding in bindings.into_iter().filter(|b| b.write_on_completion) {
        let item = MemoryItem::new(text).with_source(agent);
        if let Err(e) = binding.source.add(item).await {
            warn!(source = binding.source.name(), error = %e, "memory write failed");
        }
    }
}
