//! Handoff-driven selection
//!
//! Agents pick their successors. The target of the most recent handoff
//! message speaks next; before any handoff the first participant speaks.

use crate::agent::AgentRoster;
use crate::conversation::Conversation;
use crate::errors::{AgentError, Result};
use crate::selection::{Selection, TurnSelector};
use crate::types::MessageKind;
use async_trait::async_trait;

#[derive(Debug, Clone, Default)]
pub struct HandoffSelector;

impl HandoffSelector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TurnSelector for HandoffSelector {
    fn name(&self) -> &'static str {
        "handoff"
    }

    async fn select(&mut self, conversation: &Conversation, roster: &AgentRoster) -> Result<Selection> {
        let handoff = conversation
            .last_of_kind(MessageKind::Handoff)
            .and_then(|m| m.handoff_target.as_deref());

        match handoff {
            Some(target) if roster.contains(target) => Ok(Selection::speaker(target)),
            Some(target) => Err(AgentError::NoEligibleAgent(format!(
                "handoff target '{}' is not a participant",
                target
            ))),
            None => roster
                .at(0)
                .map(|agent| Selection::speaker(agent.name()))
                .ok_or_else(|| AgentError::NoEligibleAgent("roster is empty".to_string())),
        }
    }

    fn reset(&mut self) {}
}
