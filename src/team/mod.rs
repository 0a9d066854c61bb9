//! Teams and the run loop
//!
//! A [`Team`] owns a roster, a turn selector and a termination condition.
//! [`Team::run_stream`] drives one run lazily: nothing happens until the
//! stream is polled, and each poll advances the loop far enough to produce
//! the next event. The run always ends with a [`RunEvent::Finished`] carrying
//! the full (possibly partial) history.

pub mod builder;
mod driver;

pub use builder::TeamBuilder;

use crate::agent::{AgentRoster, RunState, TurnChunk};
use crate::config::RunConfig;
use crate::errors::AgentError;
use crate::memory::MemoryBinding;
use crate::selection::TurnSelector;
use crate::telemetry::{TelemetryCollector, TelemetryStats};
use crate::termination::TerminationCondition;
use crate::types::{Message, RunResult, StopReason};
use driver::RunDriver;
use futures_util::stream::{self, PollNext, Stream, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Event emitted while a run progresses
#[derive(Debug)]
pub enum RunEvent {
    /// A message was appended to the conversation
    Message(Message),

    /// Partial model output of the turn in progress
    ///
    /// Only emitted when [`RunConfig::stream_chunks`] is set. The chunks of a
    /// turn arrive before its messages; the messages carry the full text.
    Chunk { agent: String, text: String },

    /// The run state machine moved
    StateChanged { from: RunState, to: RunState },

    /// The run ended; always the last event
    Finished(RunResult),
}

/// A group of agents working on one task
pub struct Team {
    pub(crate) roster: AgentRoster,
    pub(crate) selector: Box<dyn TurnSelector>,
    pub(crate) termination: Option<Box<dyn TerminationCondition>>,
    pub(crate) shared_memory: Vec<MemoryBinding>,
    pub(crate) output_schema: Option<Value>,
    pub(crate) config: RunConfig,
    pub(crate) telemetry: TelemetryCollector,
    pub(crate) last_run: Vec<Message>,
}

impl Team {
    pub fn builder() -> TeamBuilder {
        TeamBuilder::new()
    }

    pub fn roster(&self) -> &AgentRoster {
        &self.roster
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Name of the turn selection strategy
    pub fn selector_name(&self) -> &'static str {
        self.selector.name()
    }

    /// Messages of the most recent run
    pub fn last_run(&self) -> &[Message] {
        &self.last_run
    }

    /// Statistics of the current or most recent run
    pub fn stats(&self) -> TelemetryStats {
        self.telemetry.stats()
    }

    /// Start a run and return its event stream
    ///
    /// Each run starts from a fresh conversation seeded with `task`; selector
    /// and termination state are reset first. Cancelling `cancel` stops the
    /// run before the next turn; a turn in progress is allowed to finish.
    pub fn run_stream<'a>(
        &'a mut self,
        task: impl Into<String>,
        cancel: CancellationToken,
    ) -> impl Stream<Item = RunEvent> + Send + 'a {
        self.selector.reset();
        if let Some(termination) = self.termination.as_mut() {
            termination.reset();
        }
        self.telemetry.clear();

        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel::<TurnChunk>();
        let chunk_tx = self.config.stream_chunks.then_some(chunk_tx);

        let driver = RunDriver::new(self, task.into(), cancel, chunk_tx);
        let events = stream::unfold(driver, |mut driver| async move {
            driver.next_event().await.map(|event| (event, driver))
        });

        // Ends once the driver, which owns the sender, is dropped
        let chunks = stream::unfold(chunk_rx, |mut rx| async move {
            rx.recv().await.map(|chunk| {
                (
                    RunEvent::Chunk {
                        agent: chunk.agent,
                        text: chunk.text,
                    },
                    rx,
                )
            })
        });

        // Waiting chunks go out before the next run event
        stream::select_with_strategy(events, chunks, |_: &mut ()| PollNext::Right)
    }

    /// Run to completion
    pub async fn run(&mut self, task: impl Into<String>) -> RunResult {
        self.run_with_cancel(task, CancellationToken::new()).await
    }

    /// Run to completion, stopping early if `cancel` fires
    pub async fn run_with_cancel(
        &mut self,
        task: impl Into<String>,
        cancel: CancellationToken,
    ) -> RunResult {
        let events = self.run_stream(task, cancel);
        futures_util::pin_mut!(events);

        let mut result = None;
        while let Some(event) = events.next().await {
            if let RunEvent::Finished(finished) = event {
                result = Some(finished);
            }
        }

        result.unwrap_or_else(|| RunResult {
            messages: Vec::new(),
            stop_reason: StopReason::Error {
                message: "run ended without a result".to_string(),
            },
            error: Some(AgentError::Generic("run ended without a result".to_string())),
            turns: 0,
            duration: Duration::ZERO,
            stats: TelemetryStats::default(),
        })
    }

    /// Forget the previous run and reset every agent
    pub async fn reset(&mut self) {
        self.selector.reset();
        if let Some(termination) = self.termination.as_mut() {
            termination.reset();
        }
        self.telemetry.clear();
        self.last_run.clear();

        for agent in self.roster.agents() {
            if let Err(e) = agent.reset().await {
                warn!(agent = agent.name(), error = %e, "agent reset failed");
            }
        }
    }
}

impl std::fmt::Debug for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Team")
            .field("roster", &self.roster)
            .field("selector", &self.selector.name())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, AgentDescriptor, AgentReply, TurnContext};
    use crate::config::HumanTimeoutPolicy;
    use crate::errors::Result;
    use crate::memory::{ListMemory, MemorySource};
    use crate::selection::testing::Parrot;
    use crate::termination::{MaxMessages, TextMention};
    use crate::types::MessageKind;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Agent that records what it saw and answers from a list
    struct Recorder {
        descriptor: AgentDescriptor,
        lines: Mutex<Vec<String>>,
        seen_memory: Mutex<Vec<usize>>,
        seen_instruction: Mutex<Vec<Option<String>>>,
    }

    impl Recorder {
        fn new(name: &str, lines: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                descriptor: AgentDescriptor::new(name, ""),
                lines: Mutex::new(lines.iter().rev().map(|s| s.to_string()).collect()),
                seen_memory: Mutex::new(Vec::new()),
                seen_instruction: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Agent for Recorder {
        fn descriptor(&self) -> &AgentDescriptor {
            &self.descriptor
        }

        async fn respond(&self, ctx: &TurnContext<'_>) -> Result<AgentReply> {
            self.seen_memory.lock().unwrap().push(ctx.memory_context.len());
            self.seen_instruction
                .lock()
                .unwrap()
                .push(ctx.instruction.map(str::to_string));
            let line = self.lines.lock().unwrap().pop().unwrap_or_else(|| "...".to_string());
            Ok(AgentReply::single(Message::text(&self.descriptor.name, line)))
        }
    }

    /// Agent whose turn always fails
    struct Broken {
        descriptor: AgentDescriptor,
        error: fn(&str) -> AgentError,
    }

    #[async_trait]
    impl Agent for Broken {
        fn descriptor(&self) -> &AgentDescriptor {
            &self.descriptor
        }

        async fn respond(&self, _ctx: &TurnContext<'_>) -> Result<AgentReply> {
            Err((self.error)(&self.descriptor.name))
        }
    }

    fn timeout_error(agent: &str) -> AgentError {
        AgentError::HumanInputTimeout {
            agent: agent.to_string(),
            duration_ms: 10,
        }
    }

    #[tokio::test]
    async fn test_round_robin_until_text_mention() {
        let mut team = Team::builder()
            .agent(Recorder::new("primary", &["Leaves fall", "Leaves drift"]))
            .agent(Recorder::new("critic", &["Try again", "APPROVE"]))
            .termination(TextMention::new("APPROVE"))
            .build()
            .unwrap();

        let result = team.run("Write a haiku").await;

        assert!(result.is_success());
        assert_eq!(result.turns, 4);
        let sources: Vec<&str> = result.messages.iter().map(|m| m.source.as_str()).collect();
        assert_eq!(sources, vec!["user", "primary", "critic", "primary", "critic"]);
        assert_eq!(result.output(), "APPROVE");
        assert_eq!(team.last_run().len(), 5);
    }

    #[tokio::test]
    async fn test_stream_events_in_order() {
        let mut team = Team::builder()
            .agent(Parrot::new("a", "hi"))
            .termination(MaxMessages::new(2))
            .build()
            .unwrap();

        let events: Vec<RunEvent> = team.run_stream("task", CancellationToken::new()).collect().await;

        assert!(matches!(&events[0], RunEvent::Message(m) if m.is_task()));
        assert!(matches!(
            events[1],
            RunEvent::StateChanged {
                from: RunState::Init,
                to: RunState::Evaluating
            }
        ));
        let appended = events
            .iter()
            .filter(|e| matches!(e, RunEvent::Message(_)))
            .count();
        assert_eq!(appended, 2);
        assert!(matches!(events.last(), Some(RunEvent::Finished(r)) if r.messages.len() == 2));
    }

    #[tokio::test]
    async fn test_stream_is_lazy() {
        let agent = Recorder::new("a", &["one"]);
        let mut team = Team::builder()
            .agent(agent.clone())
            .termination(MaxMessages::new(2))
            .build()
            .unwrap();

        {
            let _events = team.run_stream("task", CancellationToken::new());
        }
        assert!(agent.seen_memory.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let mut team = Team::builder().agent(Parrot::new("a", "hi")).build().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = team.run_with_cancel("task", cancel).await;

        assert_eq!(result.stop_reason, StopReason::Cancelled);
        assert!(result.error.is_none());
        assert_eq!(result.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_config_max_turns() {
        let mut team = Team::builder()
            .agent(Parrot::new("a", "hi"))
            .agent(Parrot::new("b", "hello"))
            .config(RunConfig::default().with_max_turns(3))
            .build()
            .unwrap();

        let result = team.run("task").await;

        assert_eq!(result.turns, 3);
        assert_eq!(result.stop_reason, StopReason::MaxTurns { limit: 3 });
    }

    #[tokio::test]
    async fn test_agent_error_keeps_partial_history() {
        let broken = Arc::new(Broken {
            descriptor: AgentDescriptor::new("b", ""),
            error: |_| AgentError::ModelApiError("HTTP 400: bad request".to_string()),
        });
        let mut team = Team::builder()
            .agent(Parrot::new("a", "first"))
            .agent(broken)
            .build()
            .unwrap();

        let result = team.run("task").await;

        assert!(matches!(result.error, Some(AgentError::ModelApiError(_))));
        assert!(matches!(result.stop_reason, StopReason::Error { .. }));
        assert_eq!(result.messages.len(), 2);
        assert_eq!(result.turns, 1);
    }

    #[tokio::test]
    async fn test_human_timeout_policies() {
        let build = |policy| {
            Team::builder()
                .agent(Arc::new(Broken {
                    descriptor: AgentDescriptor::new("user_proxy", ""),
                    error: timeout_error,
                }))
                .agent(Parrot::new("assistant", "still here"))
                .config(
                    RunConfig::default()
                        .with_max_turns(4)
                        .with_human_timeout_policy(policy),
                )
                .build()
                .unwrap()
        };

        let failed = build(HumanTimeoutPolicy::FailRun).run("task").await;
        assert!(matches!(failed.error, Some(AgentError::HumanInputTimeout { .. })));
        assert_eq!(failed.messages.len(), 1);

        let skipped = build(HumanTimeoutPolicy::SkipTurn).run("task").await;
        assert!(skipped.is_success());
        assert_eq!(skipped.turns, 4);
        assert_eq!(skipped.stats.skipped_turns, 2);
        assert!(skipped.messages[1..].iter().all(|m| m.source == "assistant"));
    }

    #[tokio::test]
    async fn test_shared_memory_written_and_read() {
        let store = Arc::new(ListMemory::new("team"));
        let a = Recorder::new("a", &["fact one"]);
        let b = Recorder::new("b", &["fact two"]);
        let mut team = Team::builder()
            .agent(a.clone())
            .agent(b.clone())
            .shared_memory(MemoryBinding::shared(store.clone()).write_on_completion())
            .termination(MaxMessages::new(3))
            .build()
            .unwrap();

        team.run("task").await;

        assert_eq!(*a.seen_memory.lock().unwrap(), vec![0]);
        assert_eq!(*b.seen_memory.lock().unwrap(), vec![1]);
        assert_eq!(store.query("").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reset_between_runs() {
        let mut team = Team::builder()
            .agent(Parrot::new("a", "APPROVE"))
            .agent(Parrot::new("b", "no"))
            .termination(TextMention::new("APPROVE"))
            .build()
            .unwrap();

        let first = team.run("task one").await;
        team.reset().await;
        assert!(team.last_run().is_empty());
        let second = team.run("task two").await;

        assert_eq!(first.turns, 1);
        assert_eq!(second.turns, 1);
        assert_eq!(second.messages[1].source, "a");
        assert!(second.messages.iter().all(|m| m.kind == MessageKind::Plain));
    }
}
