//! Sequential crews
//!
//! A crew runs a fixed list of tasks in order, each handled by one agent in a
//! single-turn team. Task descriptions may contain `{key}` placeholders filled
//! from the kickoff inputs, and a task can read the outputs of earlier tasks
//! as context.

use crate::agent::{Agent, AgentRoster};
use crate::config::RunConfig;
use crate::errors::{AgentError, Result};
use crate::memory::{ListMemory, MemoryBinding};
use crate::team::Team;
use crate::termination::MaxTurns;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Called with each task's output as soon as the task completes
pub type TaskCallback = Arc<dyn Fn(&TaskOutput) + Send + Sync>;

/// One unit of crew work
#[derive(Clone)]
pub struct Task {
    pub description: String,
    pub expected_output: String,

    /// Name of the agent that performs the task
    pub agent: String,

    /// Indices of earlier tasks whose outputs are handed over as context
    pub context: Vec<usize>,
    pub output_schema: Option<Value>,
    pub callback: Option<TaskCallback>,
}

impl Task {
    pub fn new(
        description: impl Into<String>,
        expected_output: impl Into<String>,
        agent: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            expected_output: expected_output.into(),
            agent: agent.into(),
            context: Vec::new(),
            output_schema: None,
            callback: None,
        }
    }

    pub fn with_context(mut self, context: Vec<usize>) -> Self {
        self.context = context;
        self
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&TaskOutput) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("description", &self.description)
            .field("agent", &self.agent)
            .field("context", &self.context)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

/// Output of one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
    pub description: String,
    pub agent: String,
    pub raw: String,

    /// Validated structured output, when the task declared a schema
    pub structured: Option<Value>,
}

/// Outputs of a whole kickoff, in task order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrewOutput {
    pub tasks_output: Vec<TaskOutput>,
}

impl CrewOutput {
    /// Raw output of the last task
    pub fn raw(&self) -> &str {
        self.tasks_output.last().map(|t| t.raw.as_str()).unwrap_or("")
    }
}

pub struct Crew {
    agents: AgentRoster,
    tasks: Vec<Task>,
    memory: Option<Arc<ListMemory>>,
    config: RunConfig,
}

impl Crew {
    /// Validate agents and tasks
    ///
    /// Every task must name a crew agent and may only take context from
    /// tasks that run before it.
    pub fn new(agents: Vec<Arc<dyn Agent>>, tasks: Vec<Task>) -> Result<Self> {
        let mut roster = AgentRoster::new();
        for agent in agents {
            roster.add(agent)?;
        }

        for (index, task) in tasks.iter().enumerate() {
            if !roster.contains(&task.agent) {
                return Err(AgentError::UnknownAgent(task.agent.clone()));
            }
            if let Some(bad) = task.context.iter().find(|&&c| c >= index) {
                return Err(AgentError::ConfigError(format!(
                    "task {} takes context from task {}, which does not run before it",
                    index, bad
                )));
            }
        }

        Ok(Self {
            agents: roster,
            tasks,
            memory: None,
            config: RunConfig::default(),
        })
    }

    /// Share a list memory between all agents; every task output is recorded in it
    pub fn with_memory(mut self, enabled: bool) -> Self {
        self.memory = enabled.then(|| Arc::new(ListMemory::new("crew")));
        self
    }

    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Shared crew memory, when enabled
    pub fn memory(&self) -> Option<&Arc<ListMemory>> {
        self.memory.as_ref()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Run every task in order
    pub async fn kickoff(&self, inputs: &HashMap<String, String>) -> Result<CrewOutput> {
        let mut output = CrewOutput::default();

        for (index, task) in self.tasks.iter().enumerate() {
            let agent = self
                .agents
                .get(&task.agent)
                .cloned()
                .ok_or_else(|| AgentError::UnknownAgent(task.agent.clone()))?;

            let description = interpolate(&task.description, inputs)?;
            let expected = interpolate(&task.expected_output, inputs)?;
            let context: Vec<&str> = task
                .context
                .iter()
                .filter_map(|&i| output.tasks_output.get(i))
                .map(|t| t.raw.as_str())
                .collect();
            let prompt = task_prompt(&description, &expected, &context);

            info!(task = index, agent = %task.agent, "crew task started");

            let mut builder = Team::builder()
                .agent(agent)
                .termination(MaxTurns::new(1))
                .config(self.config.clone());
            if let Some(schema) = &task.output_schema {
                builder = builder.output_schema(schema.clone());
            }
            if let Some(memory) = &self.memory {
                builder = builder.shared_memory(MemoryBinding::shared(memory.clone()).write_on_completion());
            }
            let mut team = builder.build()?;

            let result = team.run(prompt).await;
            if let Some(e) = result.error {
                return Err(e);
            }

            let last = result.messages.last().filter(|m| !m.is_task());
            let task_output = TaskOutput {
                description,
                agent: task.agent.clone(),
                raw: last.map(|m| m.text_content()).unwrap_or_default(),
                structured: last.and_then(|m| m.content.as_structured()).cloned(),
            };

            if let Some(callback) = &task.callback {
                callback(&task_output);
            }
            output.tasks_output.push(task_output);
        }

        Ok(output)
    }
}

fn task_prompt(description: &str, expected: &str, context: &[&str]) -> String {
    let mut prompt = format!(
        "{}\n\nThis is the expected criteria for your final answer: {}",
        description, expected
    );
    if !context.is_empty() {
        prompt.push_str("\n\nThis is the context you're working with:\n");
        prompt.push_str(&context.join("\n\n"));
    }
    prompt
}

/// Replace `{key}` placeholders with input values
///
/// Only identifier-like keys are placeholders, so JSON snippets in a
/// description are left alone. A placeholder without an input is an error.
pub fn interpolate(template: &str, inputs: &HashMap<String, String>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let key_len = after
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let key = &after[..key_len];

        if key_len > 0 && after[key_len..].starts_with('}') {
            let value = inputs.get(key).ok_or_else(|| {
                AgentError::ConfigError(format!("missing input for placeholder '{{{}}}'", key))
            })?;
            out.push_str(value);
            rest = &after[key_len + 1..];
        } else {
            out.push('{');
            rest = after;
        }
    }

    out.push_str(rest);
    Ok(out)
}
