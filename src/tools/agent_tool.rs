//! Agents and teams exposed as tools
//!
//! Both wrappers are stateful: calls are serialized through a lock and the
//! executor never runs them alongside other calls of the same batch.

use crate::agent::{Agent, TurnContext};
use crate::conversation::Conversation;
use crate::errors::{AgentError, Result};
use crate::team::Team;
use crate::tools::registry::ToolRegistry;
use crate::tools::types::{ToolHandler, ToolSchema};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;

fn task_parameters() -> Value {
    json!({
        "type": "object",
        "properties": {
            "task": {"type": "string", "description": "The task to perform."}
        },
        "required": ["task"]
    })
}

fn task_argument<'v>(tool: &str, args: &'v Value) -> Result<&'v str> {
    args.get("task")
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::SchemaValidation {
            tool: tool.to_string(),
            reason: "missing string argument 'task'".to_string(),
        })
}

/// Single agent invoked as a tool
///
/// Each call gives the agent a fresh conversation seeded with the task and
/// returns the text of its final message.
pub struct AgentTool {
    agent: Arc<dyn Agent>,
    lock: Mutex<()>,
}

impl AgentTool {
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self {
            agent,
            lock: Mutex::new(()),
        }
    }

    pub fn schema(&self) -> ToolSchema {
        let descriptor = self.agent.descriptor();
        ToolSchema::new(&descriptor.name, &descriptor.description, task_parameters()).stateful()
    }

    /// Register under the agent's name
    pub fn register(self, registry: &mut ToolRegistry) -> Result<()> {
        let schema = self.schema();
        registry.register(schema, Arc::new(self))
    }
}

#[async_trait]
impl ToolHandler for AgentTool {
    async fn call(&self, args: Value) -> Result<Value> {
        let task = task_argument(self.agent.name(), &args)?;
        let _guard = self.lock.lock().await;

        let conversation = Conversation::with_task([self.agent.name()], task);
        let reply = self.agent.respond(&TurnContext::new(&conversation)).await?;

        Ok(match reply.final_message() {
            Some(message) => match message.content.as_structured() {
                Some(value) => value.clone(),
                None => Value::String(message.text_content()),
            },
            None => Value::String(String::new()),
        })
    }
}

/// Team invoked as a tool; returns the final message of the run
pub struct TeamTool {
    name: String,
    description: String,
    team: Mutex<Team>,
}

impl TeamTool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, team: Team) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            team: Mutex::new(team),
        }
    }

    pub fn schema(&self) -> ToolSchema {
        ToolSchema::new(&self.name, &self.description, task_parameters()).stateful()
    }

    pub fn register(self, registry: &mut ToolRegistry) -> Result<()> {
        let schema = self.schema();
        registry.register(schema, Arc::new(self))
    }
}

#[async_trait]
impl ToolHandler for TeamTool {
    async fn call(&self, args: Value) -> Result<Value> {
        let task = task_argument(&self.name, &args)?;
        let mut team = self.team.lock().await;
        let result = team.run(task).await;

        if let Some(e) = result.error {
            return Err(AgentError::ToolHandler {
                tool: self.name.clone(),
                reason: e.to_string(),
            });
        }
        Ok(Value::String(result.output()))
    }
}
