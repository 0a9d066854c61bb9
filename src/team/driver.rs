//! Step-wise execution of one run
//!
//! The driver advances the run state machine one phase at a time and queues
//! the events each phase produces. The team's event stream pulls from this
//! queue, so a phase only runs when the consumer asks for more.

use crate::agent::{gather_memory, record_completion, ChunkSender, RunState, StateEvent, TurnContext};
use crate::config::HumanTimeoutPolicy;
use crate::conversation::Conversation;
use crate::errors::AgentError;
use crate::selection::Selection;
use crate::team::{RunEvent, Team};
use crate::telemetry::TelemetryEvent;
use crate::types::{Message, MessageKind, RunResult, StopReason};
use std::collections::VecDeque;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Speaker chosen by the selector, waiting for its turn
struct PendingTurn {
    speaker: String,
    instruction: Option<String>,
}

pub(crate) struct RunDriver<'a> {
    team: &'a mut Team,
    conversation: Conversation,
    state: RunState,
    cancel: CancellationToken,
    chunks: Option<ChunkSender>,
    turns: usize,
    started: Instant,
    pending: Option<PendingTurn>,
    events: VecDeque<RunEvent>,
    stop_reason: Option<StopReason>,
    error: Option<AgentError>,
    finished: bool,
}

impl<'a> RunDriver<'a> {
    pub(crate) fn new(
        team: &'a mut Team,
        task: String,
        cancel: CancellationToken,
        chunks: Option<ChunkSender>,
    ) -> Self {
        let mut participants = team.roster.names();
        if let Some(name) = team.selector.participant() {
            participants.push(name.to_string());
        }

        let conversation = Conversation::with_task(participants, task);
        let mut events = VecDeque::new();
        if let Some(seed) = conversation.last() {
            events.push_back(RunEvent::Message(seed.clone()));
        }

        Self {
            team,
            conversation,
            state: RunState::Init,
            cancel,
            chunks,
            turns: 0,
            started: Instant::now(),
            pending: None,
            events,
            stop_reason: None,
            error: None,
            finished: false,
        }
    }

    /// Next event, running phases until one is available
    pub(crate) async fn next_event(&mut self) -> Option<RunEvent> {
        loop {
            if let Some(event) = self.events.pop_front() {
                return Some(event);
            }
            if self.finished {
                return None;
            }

            if self.state.is_terminal() {
                self.finish();
            } else {
                self.step().await;
            }
        }
    }

    async fn step(&mut self) {
        match self.state {
            RunState::Init => {
                info!(
                    selector = self.team.selector.name(),
                    agents = self.team.roster.len(),
                    "run started"
                );
                self.advance(StateEvent::Start);
            }
            RunState::Evaluating => self.evaluate(),
            RunState::Selecting => self.select().await,
            RunState::Acting => self.act().await,
            RunState::Completed | RunState::Failed | RunState::Cancelled => {}
        }
    }

    fn evaluate(&mut self) {
        if self.cancel.is_cancelled() {
            info!(turns = self.turns, "run cancelled");
            self.stop_reason = Some(StopReason::Cancelled);
            self.advance(StateEvent::Cancel);
            return;
        }

        let mut reason = self
            .team
            .termination
            .as_mut()
            .and_then(|t| t.check(&self.conversation, self.turns));

        if reason.is_none() {
            if let Some(limit) = self.team.config.max_turns {
                if self.turns >= limit {
                    reason = Some(StopReason::MaxTurns { limit });
                }
            }
        }

        match reason {
            Some(reason) => {
                info!(reason = %reason, turns = self.turns, "termination condition met");
                self.stop_reason = Some(reason);
                self.advance(StateEvent::Stop);
            }
            None => self.advance(StateEvent::Continue),
        }
    }

    async fn select(&mut self) {
        let selection = self
            .team
            .selector
            .select(&self.conversation, &self.team.roster)
            .await;

        match selection {
            Ok(Selection::Speaker {
                name,
                instruction,
                notes,
            }) => {
                if !self.append_all(notes) {
                    return;
                }
                debug!(speaker = %name, "speaker selected");
                self.pending = Some(PendingTurn {
                    speaker: name,
                    instruction,
                });
                self.advance(StateEvent::SpeakerSelected);
            }
            Ok(Selection::Finished { reason, notes }) => {
                if !self.append_all(notes) {
                    return;
                }
                info!(reason = %reason, "selector finished the run");
                self.stop_reason = Some(StopReason::Completed { reason });
                self.advance(StateEvent::Stop);
            }
            Err(e) => {
                let notes = self.team.selector.take_notes();
                if self.append_all(notes) {
                    self.fail(e);
                }
            }
        }
    }

    async fn act(&mut self) {
        let Some(turn) = self.pending.take() else {
            self.fail(AgentError::Generic("no speaker selected".to_string()));
            return;
        };
        let Some(agent) = self.team.roster.get(&turn.speaker).cloned() else {
            self.fail(AgentError::UnknownAgent(turn.speaker));
            return;
        };

        let turn_started = Instant::now();
        self.team.telemetry.record(TelemetryEvent::TurnStarted {
            agent: turn.speaker.clone(),
            turn: self.turns,
            timestamp: turn_started,
        });

        let bindings: Vec<_> = agent
            .descriptor()
            .memory
            .iter()
            .chain(self.team.shared_memory.iter())
            .cloned()
            .collect();
        let query = self
            .conversation
            .last()
            .map(|m| m.text_content())
            .unwrap_or_default();
        let memory = gather_memory(&bindings, &query).await;

        let reply = {
            let ctx = TurnContext::new(&self.conversation)
                .with_memory(&memory)
                .with_instruction(turn.instruction.as_deref())
                .with_turn(self.turns)
                .with_output_schema(self.team.output_schema.as_ref())
                .with_chunks(self.chunks.as_ref());
            agent.respond(&ctx).await
        };

        if self.chunks.is_some() {
            // Chunks sent while the reply completed are delivered before its messages
            tokio::task::yield_now().await;
        }

        match reply {
            Ok(reply) => {
                let count = reply.messages.len();
                let final_text = reply
                    .final_message()
                    .map(|m| m.text_content())
                    .unwrap_or_default();

                if !self.append_all(reply.messages) {
                    return;
                }
                record_completion(&bindings, &turn.speaker, &final_text).await;

                self.turns += 1;
                self.team.telemetry.record(TelemetryEvent::TurnCompleted {
                    agent: turn.speaker.clone(),
                    messages: count,
                    duration_ms: turn_started.elapsed().as_millis() as u64,
                    timestamp: Instant::now(),
                });
                debug!(agent = %turn.speaker, messages = count, "turn completed");
                self.advance(StateEvent::TurnComplete);
            }
            Err(e @ AgentError::HumanInputTimeout { .. })
                if self.team.config.human_timeout_policy == HumanTimeoutPolicy::SkipTurn =>
            {
                warn!(agent = %turn.speaker, error = %e, "skipping turn");
                self.turns += 1;
                self.team.telemetry.record(TelemetryEvent::TurnSkipped {
                    agent: turn.speaker,
                    reason: e.to_string(),
                    timestamp: Instant::now(),
                });
                self.advance(StateEvent::TurnComplete);
            }
            Err(e) => self.fail(e),
        }
    }

    /// Append messages in order, emitting each; false if the run failed
    fn append_all(&mut self, messages: Vec<Message>) -> bool {
        for message in messages {
            self.observe(&message);
            match self.conversation.append(message) {
                Ok(appended) => {
                    let appended = appended.clone();
                    self.events.push_back(RunEvent::Message(appended));
                }
                Err(e) => {
                    self.fail(e);
                    return false;
                }
            }
        }
        true
    }

    fn observe(&self, message: &Message) {
        let telemetry = &self.team.telemetry;
        for result in &message.tool_results {
            telemetry.record(TelemetryEvent::ToolCompleted {
                tool: result.tool.clone(),
                duration_ms: result.duration_ms,
                success: result.success,
                timestamp: Instant::now(),
            });
        }
        if message.kind == MessageKind::Handoff {
            if let Some(target) = &message.handoff_target {
                telemetry.record(TelemetryEvent::Handoff {
                    from: message.source.clone(),
                    to: target.clone(),
                    timestamp: Instant::now(),
                });
            }
        }
        if let Some(usage) = message.usage {
            telemetry.record(TelemetryEvent::Usage {
                agent: message.source.clone(),
                usage,
                timestamp: Instant::now(),
            });
        }
    }

    fn advance(&mut self, event: StateEvent) {
        let from = self.state;
        let to = match from.transition(event) {
            Ok(next) => next,
            Err(e) => {
                error!(error = %e, "invalid run state transition");
                self.error.get_or_insert(e);
                RunState::Failed
            }
        };
        self.set_state(from, to);
    }

    fn set_state(&mut self, from: RunState, to: RunState) {
        if from == to {
            return;
        }
        self.state = to;
        self.team.telemetry.record(TelemetryEvent::StateTransition {
            from: from.to_string(),
            to: to.to_string(),
            timestamp: Instant::now(),
        });
        self.events.push_back(RunEvent::StateChanged { from, to });
    }

    fn fail(&mut self, error: AgentError) {
        error!(error = %error, turns = self.turns, "run failed");
        self.error.get_or_insert(error);
        self.advance(StateEvent::Fail);
    }

    fn finish(&mut self) {
        let stop_reason = match (&self.error, self.stop_reason.take()) {
            (Some(e), _) => StopReason::Error {
                message: e.to_string(),
            },
            (None, Some(reason)) => reason,
            (None, None) => StopReason::Error {
                message: "run stopped without a reason".to_string(),
            },
        };

        let messages = self.conversation.messages().to_vec();
        self.team.last_run = messages.clone();

        let result = RunResult {
            messages,
            stop_reason,
            error: self.error.take(),
            turns: self.turns,
            duration: self.started.elapsed(),
            stats: self.team.telemetry.stats(),
        };
        info!(summary = %result.summary(), "run finished");

        self.events.push_back(RunEvent::Finished(result));
        self.finished = true;
    }
}
