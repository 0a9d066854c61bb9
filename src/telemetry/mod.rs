//! Telemetry for team runs
//!
//! Collects run events and keeps counters that end up in
//! [`RunResult::stats`](crate::types::RunResult). Also installs the tracing
//! subscriber used by the binary.

use crate::types::Usage;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Telemetry event types
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    // Loop events
    StateTransition {
        from: String,
        to: String,
        timestamp: Instant,
    },
    TurnStarted {
        agent: String,
        turn: usize,
        timestamp: Instant,
    },
    TurnCompleted {
        agent: String,
        messages: usize,
        duration_ms: u64,
        timestamp: Instant,
    },
    TurnSkipped {
        agent: String,
        reason: String,
        timestamp: Instant,
    },

    // Tool events
    ToolCompleted {
        tool: String,
        duration_ms: u64,
        success: bool,
        timestamp: Instant,
    },

    Handoff {
        from: String,
        to: String,
        timestamp: Instant,
    },
    Usage {
        agent: String,
        usage: Usage,
        timestamp: Instant,
    },
}

/// Run statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetryStats {
    pub turns: usize,
    pub skipped_turns: usize,
    pub messages: usize,
    pub tool_calls: usize,
    pub tool_failures: usize,
    pub handoffs: usize,
    pub state_transitions: usize,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TelemetryStats {
    /// Fraction of tool calls that succeeded
    pub fn tool_success_rate(&self) -> f64 {
        if self.tool_calls == 0 {
            1.0
        } else {
            (self.tool_calls - self.tool_failures) as f64 / self.tool_calls as f64
        }
    }
}

/// Telemetry collector
#[derive(Debug, Clone)]
pub struct TelemetryCollector {
    events: Arc<Mutex<Vec<TelemetryEvent>>>,
    stats: Arc<Mutex<TelemetryStats>>,
    start_time: Instant,
}

impl TelemetryCollector {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            stats: Arc::new(Mutex::new(TelemetryStats::default())),
            start_time: Instant::now(),
        }
    }

    /// Record an event
    pub fn record(&self, event: TelemetryEvent) {
        {
            let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
            match &event {
                TelemetryEvent::StateTransition { .. } => stats.state_transitions += 1,
                TelemetryEvent::TurnStarted { .. } => stats.turns += 1,
                TelemetryEvent::TurnCompleted { messages, .. } => stats.messages += messages,
                TelemetryEvent::TurnSkipped { .. } => stats.skipped_turns += 1,
                TelemetryEvent::ToolCompleted { success, .. } => {
                    stats.tool_calls += 1;
                    if !*success {
                        stats.tool_failures += 1;
                    }
                }
                TelemetryEvent::Handoff { .. } => stats.handoffs += 1,
                TelemetryEvent::Usage { usage, .. } => {
                    stats.prompt_tokens += usage.prompt_tokens;
                    stats.completion_tokens += usage.completion_tokens;
                }
            }
        }

        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }

    /// Current statistics
    pub fn stats(&self) -> TelemetryStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Time since the collector was created or last cleared
    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Last `n` events
    pub fn recent_events(&self, n: usize) -> Vec<TelemetryEvent> {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        let start = events.len().saturating_sub(n);
        events[start..].to_vec()
    }

    /// Drop all events and counters
    pub fn clear(&mut self) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clear();
        *self.stats.lock().unwrap_or_else(|e| e.into_inner()) = TelemetryStats::default();
        self.start_time = Instant::now();
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Install the global fmt subscriber
///
/// `RUST_LOG` takes precedence; otherwise `verbose` selects between `debug`
/// and `info` for this crate. Calling it twice is harmless.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "crewchat=debug" } else { "crewchat=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
