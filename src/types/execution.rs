//! Run result types
//!
//! A run always hands back the conversation it accumulated, together with
//! why it stopped and (for structural failures) the error that ended it.

use crate::errors::AgentError;
use crate::telemetry::TelemetryStats;
use crate::types::messages::{Message, Usage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Why a run stopped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
    /// A message contained the termination marker
    TextMention { marker: String },

    /// Conversation reached the message limit
    MaxMessages { limit: usize },

    /// Agent turn limit reached
    MaxTurns { limit: usize },

    /// The designated speaker produced the latest message
    SourceMatch { source: String },

    /// Wall clock limit reached
    Timeout { elapsed_ms: u64 },

    /// Latest message handed off to the designated target
    Handoff { target: String },

    /// Several conditions fired together
    Composite { reasons: Vec<StopReason> },

    /// Orchestrator declared the request satisfied
    Completed { reason: String },

    /// Cancelled from outside between turns
    Cancelled,

    /// A structural failure ended the run
    Error { message: String },
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::TextMention { marker } => write!(f, "text '{}' mentioned", marker),
            StopReason::MaxMessages { limit } => write!(f, "maximum of {} messages reached", limit),
            StopReason::MaxTurns { limit } => write!(f, "maximum of {} turns reached", limit),
            StopReason::SourceMatch { source } => write!(f, "'{}' answered", source),
            StopReason::Timeout { elapsed_ms } => write!(f, "timed out after {}ms", elapsed_ms),
            StopReason::Handoff { target } => write!(f, "handoff to '{}'", target),
            StopReason::Composite { reasons } => {
                let parts: Vec<String> = reasons.iter().map(|r| r.to_string()).collect();
                write!(f, "{}", parts.join(" and "))
            }
            StopReason::Completed { reason } => write!(f, "completed: {}", reason),
            StopReason::Cancelled => write!(f, "cancelled"),
            StopReason::Error { message } => write!(f, "error: {}", message),
        }
    }
}

/// Result of a team run
#[derive(Debug)]
pub struct RunResult {
    /// Every message appended during the run, task seed first
    pub messages: Vec<Message>,

    /// Why the run stopped
    pub stop_reason: StopReason,

    /// Structural failure that ended the run, if any
    pub error: Option<AgentError>,

    /// Number of agent turns taken
    pub turns: usize,

    /// Wall clock duration
    pub duration: Duration,

    /// Run statistics
    pub stats: TelemetryStats,
}

impl RunResult {
    /// Whether the run ended without a structural failure
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Last message of the run
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Text of the last message, empty when the conversation is empty
    pub fn output(&self) -> String {
        self.last_message()
            .map(|m| m.text_content())
            .unwrap_or_default()
    }

    /// Total model usage across all messages
    pub fn usage(&self) -> Usage {
        let mut total = Usage::default();
        for usage in self.messages.iter().filter_map(|m| m.usage) {
            total += usage;
        }
        total
    }

    /// Get a human-readable summary of the run
    pub fn summary(&self) -> String {
        let status = if self.is_success() { "Success" } else { "Failed" };
        format!(
            "{} in {:.2}s ({} turns, {} messages, stop: {})",
            status,
            self.duration.as_secs_f64(),
            self.turns,
            self.messages.len(),
            self.stop_reason
        )
    }
}
