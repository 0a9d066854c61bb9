//! Run state machine
//!
//! Every run moves through the same phases: evaluate termination, select a
//! speaker, let it act, evaluate again. The machine is deterministic and every
//! path ends in one of three terminal states.

use crate::errors::{AgentError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Run loop states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunState {
    /// Conversation seeded, nothing evaluated yet
    Init,

    /// Checking cancellation and termination conditions
    Evaluating,

    /// Turn selector is choosing the next speaker
    Selecting,

    /// Selected agent is producing its turn
    Acting,

    /// Run stopped normally (terminal)
    Completed,

    /// Run ended by a structural failure (terminal)
    Failed,

    /// Run cancelled from outside (terminal)
    Cancelled,
}

/// Events that trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    /// Task seeded, run starts
    Start,

    /// No termination condition fired
    Continue,

    /// Selector named a speaker
    SpeakerSelected,

    /// Speaker finished (or skipped) its turn
    TurnComplete,

    /// A termination condition fired or the selector declared completion
    Stop,

    /// Cancellation requested
    Cancel,

    /// Structural failure
    Fail,
}

impl RunState {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Failed | RunState::Cancelled
        )
    }

    /// Attempt state transition with validation
    ///
    /// Valid transitions:
    /// 1.  Init       -> Evaluating (Start)
    /// 2.  Evaluating -> Selecting  (Continue)
    /// 3.  Evaluating -> Completed  (Stop)
    /// 4.  Evaluating -> Cancelled  (Cancel)
    /// 5.  Selecting  -> Acting     (SpeakerSelected)
    /// 6.  Selecting  -> Completed  (Stop)
    /// 7.  Acting     -> Evaluating (TurnComplete)
    /// 8.  any non-terminal -> Failed (Fail)
    /// 9.  terminal states loop on themselves
    pub fn transition(&self, event: StateEvent) -> Result<RunState> {
        use RunState::*;
        use StateEvent::*;

        if self.is_terminal() {
            return Ok(*self);
        }

        let next_state = match (self, event) {
            (_, Fail) => Failed,

            (Init, Start) => Evaluating,

            (Evaluating, Continue) => Selecting,
            (Evaluating, Stop) => Completed,
            (Evaluating, Cancel) => Cancelled,

            (Selecting, SpeakerSelected) => Acting,
            (Selecting, Stop) => Completed,

            (Acting, TurnComplete) => Evaluating,

            (from, event) => {
                return Err(AgentError::InvalidTransition {
                    from: format!("{:?}", from),
                    to: format!("(via {:?})", event),
                    reason: format!("No valid transition from {:?} on {:?}", from, event),
                });
            }
        };

        Ok(next_state)
    }

    /// Get all valid events from this state
    pub fn valid_events(&self) -> Vec<StateEvent> {
        use RunState::*;
        use StateEvent::*;

        match self {
            Init => vec![Start, Fail],
            Evaluating => vec![Continue, Stop, Cancel, Fail],
            Selecting => vec![SpeakerSelected, Stop, Fail],
            Acting => vec![TurnComplete, Fail],
            Completed | Failed | Cancelled => vec![],
        }
    }

    /// Human-readable state name
    pub fn display_name(&self) -> &'static str {
        match self {
            RunState::Init => "Initializing",
            RunState::Evaluating => "Evaluating",
            RunState::Selecting => "Selecting Speaker",
            RunState::Acting => "Acting",
            RunState::Completed => "Completed",
            RunState::Failed => "Failed",
            RunState::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
