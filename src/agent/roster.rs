//! Ordered set of uniquely named agents

use crate::agent::Agent;
use crate::errors::{AgentError, Result};
use crate::types::USER_SOURCE;
use std::fmt;
use std::sync::Arc;

/// Participants of a team, in registration order
#[derive(Clone, Default)]
pub struct AgentRoster {
    agents: Vec<Arc<dyn Agent>>,
}

impl AgentRoster {
    /// Create empty roster
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an agent, rejecting duplicate names and the task source name
    pub fn add(&mut self, agent: Arc<dyn Agent>) -> Result<()> {
        if agent.name() == USER_SOURCE {
            return Err(AgentError::ConfigError(format!(
                "'{}' is reserved for the task message",
                USER_SOURCE
            )));
        }
        if self.contains(agent.name()) {
            return Err(AgentError::DuplicateAgent(agent.name().to_string()));
        }
        self.agents.push(agent);
        Ok(())
    }

    /// Builder-style [`add`](Self::add)
    pub fn with_agent(mut self, agent: Arc<dyn Agent>) -> Result<Self> {
        self.add(agent)?;
        Ok(self)
    }

    /// Look up an agent by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Agent>> {
        self.agents.iter().find(|a| a.name() == name)
    }

    /// Agent at a registration index
    pub fn at(&self, index: usize) -> Option<&Arc<dyn Agent>> {
        self.agents.get(index)
    }

    /// Registration index of an agent
    pub fn position(&self, name: &str) -> Option<usize> {
        self.agents.iter().position(|a| a.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Agent names in registration order
    pub fn names(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.name().to_string()).collect()
    }

    /// All agents in registration order
    pub fn agents(&self) -> &[Arc<dyn Agent>] {
        &self.agents
    }

    /// "name: description" lines for selector prompts
    pub fn describe(&self) -> String {
        self.agents
            .iter()
            .map(|a| format!("{}: {}", a.name(), a.descriptor().description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl fmt::Debug for AgentRoster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.agents.iter().map(|a| a.name())).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentDescriptor, AgentReply, TurnContext};
    use async_trait::async_trait;

    struct Named(AgentDescriptor);

    #[async_trait]
    impl Agent for Named {
        fn descriptor(&self) -> &AgentDescriptor {
            &self.0
        }

        async fn respond(&self, _ctx: &TurnContext<'_>) -> Result<AgentReply> {
            Ok(AgentReply::default())
        }
    }

    fn agent(name: &str, description: &str) -> Arc<dyn Agent> {
        Arc::new(Named(AgentDescriptor::new(name, "").with_description(description)))
    }

    #[test]
    fn test_registration_order() {
        let roster = AgentRoster::new()
            .with_agent(agent("planner", "plans"))
            .unwrap()
            .with_agent(agent("writer", "writes"))
            .unwrap();

        assert_eq!(roster.names(), vec!["planner", "writer"]);
        assert_eq!(roster.position("writer"), Some(1));
        assert_eq!(roster.at(0).unwrap().name(), "planner");
        assert_eq!(roster.describe(), "planner: plans\nwriter: writes");
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut roster = AgentRoster::new();
        roster.add(agent("critic", "a")).unwrap();
        let result = roster.add(agent("critic", "b"));

        assert!(matches!(result, Err(AgentError::DuplicateAgent(name)) if name == "critic"));
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_task_source_rejected() {
        let mut roster = AgentRoster::new();
        let result = roster.add(agent(USER_SOURCE, "impersonates the task"));

        assert!(matches!(result, Err(AgentError::ConfigError(_))));
        assert!(roster.is_empty());
    }

    #[test]
    fn test_debug_lists_names() {
        let roster = AgentRoster::new().with_agent(agent("a", "")).unwrap();
        assert_eq!(format!("{:?}", roster), "[\"a\"]");
    }
}
