//! Turn selection
//!
//! A turn selector decides who speaks next. Four strategies are provided:
//! fixed rotation, a model choosing from the roster, handoffs declared by the
//! agents themselves, and an orchestrating controller that plans, assigns
//! work and watches for stalls.

pub mod handoff;
pub mod model;
pub mod orchestrator;
pub mod round_robin;

pub use handoff::HandoffSelector;
pub use model::{ModelSelector, DEFAULT_MAX_SELECTOR_ATTEMPTS};
pub use orchestrator::{OrchestratorSelector, DEFAULT_MAX_STALLS, ORCHESTRATOR_NAME};
pub use round_robin::RoundRobinSelector;

use crate::agent::AgentRoster;
use crate::conversation::Conversation;
use crate::errors::Result;
use crate::types::Message;
use async_trait::async_trait;

/// Outcome of a selection step
#[derive(Debug, Clone)]
pub enum Selection {
    /// `name` takes the next turn
    Speaker {
        name: String,

        /// Directive the speaker should follow this turn
        instruction: Option<String>,

        /// Selector messages appended before the speaker acts
        notes: Vec<Message>,
    },

    /// The selector considers the task done
    Finished { reason: String, notes: Vec<Message> },
}

impl Selection {
    /// Plain speaker selection
    pub fn speaker(name: impl Into<String>) -> Self {
        Selection::Speaker {
            name: name.into(),
            instruction: None,
            notes: Vec::new(),
        }
    }

    /// Selected speaker name, if any
    pub fn speaker_name(&self) -> Option<&str> {
        match self {
            Selection::Speaker { name, .. } => Some(name),
            Selection::Finished { .. } => None,
        }
    }
}

/// Strategy choosing the next speaker
#[async_trait]
pub trait TurnSelector: Send + Sync {
    /// Strategy name used in logs
    fn name(&self) -> &'static str;

    /// Extra conversation participant the selector speaks as, if it posts messages
    fn participant(&self) -> Option<&str> {
        None
    }

    /// Choose the next speaker
    async fn select(&mut self, conversation: &Conversation, roster: &AgentRoster) -> Result<Selection>;

    /// Messages written during a selection that returned an error
    ///
    /// The run appends these before failing so the history shows them.
    fn take_notes(&mut self) -> Vec<Message> {
        Vec::new()
    }

    /// Forget any state accumulated during a run
    fn reset(&mut self);
}
