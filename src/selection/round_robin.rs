//! Fixed rotation over the roster

use crate::agent::AgentRoster;
use crate::conversation::Conversation;
use crate::errors::{AgentError, Result};
use crate::selection::{Selection, TurnSelector};
use async_trait::async_trait;

/// The k-th selection picks `roster[k mod N]`, ignoring message content
#[derive(Debug, Clone, Default)]
pub struct RoundRobinSelector {
    next_index: usize,
}

impl RoundRobinSelector {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TurnSelector for RoundRobinSelector {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    async fn select(&mut self, _conversation: &Conversation, roster: &AgentRoster) -> Result<Selection> {
        if roster.is_empty() {
            return Err(AgentError::NoEligibleAgent("roster is empty".to_string()));
        }

        let index = self.next_index % roster.len();
        self.next_index = self.next_index.wrapping_add(1);

        let agent = roster
            .at(index)
            .ok_or_else(|| AgentError::NoEligibleAgent(format!("no agent at index {}", index)))?;
        Ok(Selection::speaker(agent.name()))
    }

    fn reset(&mut self) {
        self.next_index = 0;
    }
}
