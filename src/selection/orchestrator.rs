//! Orchestrator-driven selection
//!
//! A controller model writes a plan once, then before every turn fills in a
//! progress ledger: is the request satisfied, is progress being made, who
//! speaks next and with what instruction. Consecutive turns without progress
//! are counted; reaching the stall limit ends the run with
//! [`AgentError::Stalled`].

use crate::agent::AgentRoster;
use crate::conversation::Conversation;
use crate::errors::{AgentError, Result};
use crate::models::{ChatMessage, ChatModel, ModelRequest};
use crate::selection::{Selection, TurnSelector};
use crate::types::Message;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Participant name the orchestrator posts as
pub const ORCHESTRATOR_NAME: &str = "orchestrator";

/// Default stall limit
pub const DEFAULT_MAX_STALLS: u32 = 3;

/// Ledger field, accepted either flat or as `{"answer": .., "reason": ..}`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum LedgerField<T> {
    Nested {
        answer: T,
        #[serde(default)]
        reason: String,
    },
    Flat(T),
}

impl<T> LedgerField<T> {
    fn into_parts(self) -> (T, String) {
        match self {
            LedgerField::Nested { answer, reason } => (answer, reason),
            LedgerField::Flat(answer) => (answer, String::new()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawLedger {
    is_request_satisfied: LedgerField<bool>,
    is_progress_being_made: LedgerField<bool>,
    #[serde(default)]
    next_speaker: Option<LedgerField<String>>,
    #[serde(default)]
    instruction_or_question: Option<LedgerField<String>>,
    #[serde(default)]
    instruction: Option<LedgerField<String>>,
    #[serde(default)]
    reason: Option<String>,
}

/// Parsed progress ledger
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressLedger {
    pub is_request_satisfied: bool,
    pub is_progress_being_made: bool,
    pub next_speaker: String,
    pub instruction: String,
    pub reason: String,
}

impl ProgressLedger {
    /// Parse the first JSON object found in a model reply
    pub fn parse(reply: &str) -> Result<Self> {
        let start = reply.find('{');
        let end = reply.rfind('}');
        let json = match (start, end) {
            (Some(s), Some(e)) if s < e => &reply[s..=e],
            _ => {
                return Err(AgentError::Generic(format!(
                    "progress ledger is not JSON: {}",
                    reply
                )))
            }
        };

        let raw: RawLedger = serde_json::from_str(json)?;
        let (is_request_satisfied, satisfied_reason) = raw.is_request_satisfied.into_parts();
        let (is_progress_being_made, _) = raw.is_progress_being_made.into_parts();
        let next_speaker = raw
            .next_speaker
            .map(|f| f.into_parts().0)
            .unwrap_or_default();
        let instruction = raw
            .instruction
            .or(raw.instruction_or_question)
            .map(|f| f.into_parts().0)
            .unwrap_or_default();
        let reason = raw.reason.unwrap_or(satisfied_reason);

        Ok(Self {
            is_request_satisfied,
            is_progress_being_made,
            next_speaker: next_speaker.trim().to_string(),
            instruction,
            reason,
        })
    }
}

enum Decision {
    Speaker {
        name: String,
        instruction: Option<String>,
    },
    Finished {
        reason: String,
    },
}

/// Controller that plans, assigns turns and detects stalls
pub struct OrchestratorSelector {
    model: Arc<dyn ChatModel>,
    max_stalls: u32,
    stalls: u32,
    plan: Option<String>,
    /// Notes written by a selection step that then failed
    unposted: Vec<Message>,
}

impl OrchestratorSelector {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            max_stalls: DEFAULT_MAX_STALLS,
            stalls: 0,
            plan: None,
            unposted: Vec::new(),
        }
    }

    /// Consecutive turns without progress that end the run
    pub fn with_max_stalls(mut self, max_stalls: u32) -> Self {
        self.max_stalls = max_stalls.max(1);
        self
    }

    /// Current stall counter
    pub fn stalls(&self) -> u32 {
        self.stalls
    }

    /// Plan written on the first turn
    pub fn plan(&self) -> Option<&str> {
        self.plan.as_deref()
    }

    async fn write_plan(&self, conversation: &Conversation, roster: &AgentRoster) -> Result<String> {
        let prompt = format!(
            "We are working on the following request:\n\n{}\n\nThe team consists of:\n{}\n\n\
             Write a short bullet-point plan for addressing the request. Assign each step to a team member.",
            conversation.task().unwrap_or_default(),
            roster.describe()
        );
        let response = self
            .model
            .complete(ModelRequest::new(vec![ChatMessage::system(prompt)]))
            .await?;
        Ok(response.content.trim().to_string())
    }

    async fn ask_ledger(&self, conversation: &Conversation, roster: &AgentRoster) -> Result<ProgressLedger> {
        let prompt = format!(
            "Recall we are working on the following request:\n\n{task}\n\nThe team:\n{team}\n\nOur plan:\n{plan}\n\n\
             Conversation so far:\n{history}\n\n\
             Answer with a single JSON object and nothing else:\n\
             {{\"is_request_satisfied\": bool, \"is_progress_being_made\": bool, \
             \"next_speaker\": one of [{names}], \"instruction\": string, \"reason\": string}}",
            task = conversation.task().unwrap_or_default(),
            team = roster.describe(),
            plan = self.plan.as_deref().unwrap_or(""),
            history = conversation.transcript(),
            names = roster.names().join(", "),
        );
        let response = self
            .model
            .complete(ModelRequest::new(vec![ChatMessage::system(prompt)]))
            .await?;
        ProgressLedger::parse(&response.content)
    }

    /// One selection step; orchestrator messages are pushed to `notes` as they are written
    async fn decide(
        &mut self,
        conversation: &Conversation,
        roster: &AgentRoster,
        notes: &mut Vec<Message>,
    ) -> Result<Decision> {
        let first = roster
            .at(0)
            .map(|a| a.name().to_string())
            .ok_or_else(|| AgentError::NoEligibleAgent("roster is empty".to_string()))?;

        if self.plan.is_none() {
            let plan = self.write_plan(conversation, roster).await?;
            info!("orchestrator wrote plan");
            notes.push(Message::text(ORCHESTRATOR_NAME, format!("Plan:\n{}", plan)));
            self.plan = Some(plan);
        }

        let ledger = match self.ask_ledger(conversation, roster).await {
            Ok(ledger) => ledger,
            Err(e @ (AgentError::Generic(_) | AgentError::SerializationError(_))) => {
                warn!(error = %e, "unreadable progress ledger");
                self.record_stall()?;
                return Ok(Decision::Speaker {
                    name: first,
                    instruction: None,
                });
            }
            Err(e) => return Err(e),
        };

        debug!(?ledger, "progress ledger");

        if ledger.is_request_satisfied {
            return Ok(Decision::Finished {
                reason: ledger.reason,
            });
        }

        let known_speaker = roster.contains(&ledger.next_speaker);
        if ledger.is_progress_being_made && known_speaker {
            self.stalls = 0;
        } else {
            self.record_stall()?;
        }

        let name = if known_speaker { ledger.next_speaker } else { first };
        let instruction = if ledger.instruction.trim().is_empty() {
            None
        } else {
            notes.push(Message::text(ORCHESTRATOR_NAME, ledger.instruction.clone()));
            Some(ledger.instruction)
        };

        Ok(Decision::Speaker { name, instruction })
    }

    fn record_stall(&mut self) -> Result<()> {
        self.stalls += 1;
        warn!(stalls = self.stalls, max_stalls = self.max_stalls, "no progress this turn");
        if self.stalls >= self.max_stalls {
            return Err(AgentError::Stalled {
                stalls: self.stalls,
                max_stalls: self.max_stalls,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TurnSelector for OrchestratorSelector {
    fn name(&self) -> &'static str {
        "orchestrator"
    }

    fn participant(&self) -> Option<&str> {
        Some(ORCHESTRATOR_NAME)
    }

    async fn select(&mut self, conversation: &Conversation, roster: &AgentRoster) -> Result<Selection> {
        let mut notes = Vec::new();
        match self.decide(conversation, roster, &mut notes).await {
            Ok(Decision::Speaker { name, instruction }) => Ok(Selection::Speaker {
                name,
                instruction,
                notes,
            }),
            Ok(Decision::Finished { reason }) => Ok(Selection::Finished { reason, notes }),
            Err(e) => {
                self.unposted = notes;
                Err(e)
            }
        }
    }

    fn take_notes(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.unposted)
    }

    fn reset(&mut self) {
        self.stalls = 0;
        self.plan = None;
        self.unposted.clear();
    }
}
