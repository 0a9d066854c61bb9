//! Team construction

use crate::agent::{Agent, AgentRoster};
use crate::config::RunConfig;
use crate::errors::{AgentError, Result};
use crate::memory::MemoryBinding;
use crate::models::ChatModel;
use crate::selection::{
    HandoffSelector, ModelSelector, OrchestratorSelector, RoundRobinSelector, TurnSelector,
};
use crate::team::Team;
use crate::telemetry::TelemetryCollector;
use crate::termination::TerminationCondition;
use crate::types::USER_SOURCE;
use serde_json::Value;
use std::sync::Arc;

/// Selection strategy requested on the builder
enum SelectorChoice {
    RoundRobin,
    Model {
        model: Arc<dyn ChatModel>,
        allow_repeated_speaker: bool,
    },
    Handoff,
    Orchestrator(Arc<dyn ChatModel>),
    Custom(Box<dyn TurnSelector>),
}

/// Builder for [`Team`]
///
/// Errors (duplicate names, unknown handoff targets) are reported by
/// [`build`](Self::build). Handing off to `user` is always allowed; pair it
/// with a [`HandoffTo`](crate::termination::HandoffTo) condition to return
/// control to the caller.
pub struct TeamBuilder {
    agents: Vec<Arc<dyn Agent>>,
    selector: SelectorChoice,
    termination: Option<Box<dyn TerminationCondition>>,
    shared_memory: Vec<MemoryBinding>,
    output_schema: Option<Value>,
    config: RunConfig,
}

impl TeamBuilder {
    pub fn new() -> Self {
        Self {
            agents: Vec::new(),
            selector: SelectorChoice::RoundRobin,
            termination: None,
            shared_memory: Vec::new(),
            output_schema: None,
            config: RunConfig::default(),
        }
    }

    /// Add a participant; order matters for rotation and the first handoff turn
    pub fn agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.agents.push(agent);
        self
    }

    pub fn agents<I>(mut self, agents: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Agent>>,
    {
        self.agents.extend(agents);
        self
    }

    /// Fixed rotation (the default)
    pub fn round_robin(mut self) -> Self {
        self.selector = SelectorChoice::RoundRobin;
        self
    }

    /// A model picks each speaker; the previous speaker is excluded
    pub fn model_selector(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.selector = SelectorChoice::Model {
            model,
            allow_repeated_speaker: false,
        };
        self
    }

    /// Like [`model_selector`](Self::model_selector) but the previous speaker may go again
    pub fn model_selector_allow_repeat(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.selector = SelectorChoice::Model {
            model,
            allow_repeated_speaker: true,
        };
        self
    }

    /// Agents hand the turn to each other
    pub fn handoffs(mut self) -> Self {
        self.selector = SelectorChoice::Handoff;
        self
    }

    /// A controller model plans, assigns turns and detects stalls
    pub fn orchestrator(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.selector = SelectorChoice::Orchestrator(model);
        self
    }

    pub fn selector(mut self, selector: Box<dyn TurnSelector>) -> Self {
        self.selector = SelectorChoice::Custom(selector);
        self
    }

    pub fn termination<T>(mut self, condition: T) -> Self
    where
        T: TerminationCondition + 'static,
    {
        self.termination = Some(Box::new(condition));
        self
    }

    pub fn boxed_termination(mut self, condition: Option<Box<dyn TerminationCondition>>) -> Self {
        self.termination = condition;
        self
    }

    /// Memory consulted (and optionally written) on every agent's turn
    pub fn shared_memory(mut self, binding: MemoryBinding) -> Self {
        self.shared_memory.push(binding);
        self
    }

    /// Output schema handed to every agent's turn
    pub fn output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Team> {
        if self.agents.is_empty() {
            return Err(AgentError::ConfigError(
                "a team needs at least one agent".to_string(),
            ));
        }

        let mut roster = AgentRoster::new();
        for agent in self.agents {
            roster.add(agent)?;
        }

        for agent in roster.agents() {
            if let Some(missing) = agent
                .descriptor()
                .handoffs
                .iter()
                .find(|target| target.as_str() != USER_SOURCE && !roster.contains(target))
            {
                return Err(AgentError::ConfigError(format!(
                    "agent '{}' hands off to '{}', which is not in the team",
                    agent.name(),
                    missing
                )));
            }
        }

        let selector: Box<dyn TurnSelector> = match self.selector {
            SelectorChoice::RoundRobin => Box::new(RoundRobinSelector::new()),
            SelectorChoice::Model {
                model,
                allow_repeated_speaker,
            } => Box::new(
                ModelSelector::new(model)
                    .with_max_attempts(self.config.max_selector_attempts)
                    .with_allow_repeated_speaker(allow_repeated_speaker),
            ),
            SelectorChoice::Handoff => Box::new(HandoffSelector::new()),
            SelectorChoice::Orchestrator(model) => {
                Box::new(OrchestratorSelector::new(model).with_max_stalls(self.config.max_stalls))
            }
            SelectorChoice::Custom(selector) => selector,
        };

        if let Some(name) = selector.participant() {
            if roster.contains(name) {
                return Err(AgentError::DuplicateAgent(name.to_string()));
            }
        }

        Ok(Team {
            roster,
            selector,
            termination: self.termination,
            shared_memory: self.shared_memory,
            output_schema: self.output_schema,
            config: self.config,
            telemetry: TelemetryCollector::new(),
            last_run: Vec::new(),
        })
    }
}

impl Default for TeamBuilder {
    fn default() -> Self {
        Self::new()
    }
}
