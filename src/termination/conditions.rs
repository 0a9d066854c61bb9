//! Built-in termination conditions

use crate::conversation::Conversation;
use crate::termination::TerminationCondition;
use crate::types::{MessageKind, StopReason};
use std::time::{Duration, Instant};

/// Stop when a participant's message contains a marker
///
/// Only messages appended since the previous check are scanned and the task
/// seed is never examined, so the run stops on the exact turn the marker first
/// appears.
#[derive(Debug, Clone)]
pub struct TextMention {
    marker: String,
    sources: Option<Vec<String>>,
    cursor: usize,
}

impl TextMention {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            sources: None,
            cursor: 0,
        }
    }

    /// Only consider messages from these participants
    pub fn from_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = Some(sources.into_iter().map(Into::into).collect());
        self
    }
}

impl TerminationCondition for TextMention {
    fn name(&self) -> &'static str {
        "text_mention"
    }

    fn check(&mut self, conversation: &Conversation, _turns: usize) -> Option<StopReason> {
        let fresh = conversation.since(self.cursor);
        self.cursor = conversation.len();

        let hit = fresh.iter().filter(|m| !m.is_task()).any(|m| {
            let allowed = self
                .sources
                .as_ref()
                .map(|s| s.iter().any(|name| name == &m.source))
                .unwrap_or(true);
            allowed && m.content.contains(&self.marker)
        });

        hit.then(|| StopReason::TextMention {
            marker: self.marker.clone(),
        })
    }

    fn reset(&mut self) {
        self.cursor = 0;
    }
}

/// Stop once the conversation holds `limit` messages (task seed included)
#[derive(Debug, Clone, Copy)]
pub struct MaxMessages {
    limit: usize,
}

impl MaxMessages {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

impl TerminationCondition for MaxMessages {
    fn name(&self) -> &'static str {
        "max_messages"
    }

    fn check(&mut self, conversation: &Conversation, _turns: usize) -> Option<StopReason> {
        (conversation.len() >= self.limit).then_some(StopReason::MaxMessages { limit: self.limit })
    }

    fn reset(&mut self) {}
}

/// Stop after `limit` completed agent turns
#[derive(Debug, Clone, Copy)]
pub struct MaxTurns {
    limit: usize,
}

impl MaxTurns {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl TerminationCondition for MaxTurns {
    fn name(&self) -> &'static str {
        "max_turns"
    }

    fn check(&mut self, _conversation: &Conversation, turns: usize) -> Option<StopReason> {
        (turns >= self.limit).then_some(StopReason::MaxTurns { limit: self.limit })
    }

    fn reset(&mut self) {}
}

/// Stop when the latest message came from one of the named participants
///
/// Only the newest message counts; an earlier message from a named source in
/// the same turn does not fire the condition.
#[derive(Debug, Clone)]
pub struct SourceMatch {
    sources: Vec<String>,
    cursor: usize,
}

impl SourceMatch {
    pub fn new<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sources: sources.into_iter().map(Into::into).collect(),
            cursor: 0,
        }
    }
}

impl TerminationCondition for SourceMatch {
    fn name(&self) -> &'static str {
        "source_match"
    }

    fn check(&mut self, conversation: &Conversation, _turns: usize) -> Option<StopReason> {
        if conversation.len() <= self.cursor {
            return None;
        }
        self.cursor = conversation.len();

        conversation
            .last()
            .filter(|m| !m.is_task() && self.sources.contains(&m.source))
            .map(|m| StopReason::SourceMatch {
                source: m.source.clone(),
            })
    }

    fn reset(&mut self) {
        self.cursor = 0;
    }
}

/// Stop when wall-clock time since the first check exceeds a limit
#[derive(Debug, Clone)]
pub struct Timeout {
    limit: Duration,
    started: Option<Instant>,
}

impl Timeout {
    pub fn new(limit: Duration) -> Self {
        Self {
            limit,
            started: None,
        }
    }
}

impl TerminationCondition for Timeout {
    fn name(&self) -> &'static str {
        "timeout"
    }

    fn check(&mut self, _conversation: &Conversation, _turns: usize) -> Option<StopReason> {
        let started = *self.started.get_or_insert_with(Instant::now);
        let elapsed = started.elapsed();

        (elapsed >= self.limit).then(|| StopReason::Timeout {
            elapsed_ms: elapsed.as_millis() as u64,
        })
    }

    fn reset(&mut self) {
        self.started = None;
    }
}

/// Stop when a message hands off to `target` (e.g. back to the user)
#[derive(Debug, Clone)]
pub struct HandoffTo {
    target: String,
    cursor: usize,
}

impl HandoffTo {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            cursor: 0,
        }
    }
}

impl TerminationCondition for HandoffTo {
    fn name(&self) -> &'static str {
        "handoff"
    }

    fn check(&mut self, conversation: &Conversation, _turns: usize) -> Option<StopReason> {
        let fresh = conversation.since(self.cursor);
        self.cursor = conversation.len();

        fresh
            .iter()
            .any(|m| m.kind == MessageKind::Handoff && m.handoff_target.as_deref() == Some(self.target.as_str()))
            .then(|| StopReason::Handoff {
                target: self.target.clone(),
            })
    }

    fn reset(&mut self) {
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    fn conv() -> Conversation {
        Conversation::with_task(["primary", "critic", "user_proxy", "Alice"], "Write a poem. Reply APPROVE when done.")
    }

    #[test]
    fn test_text_mention_ignores_task() {
        let mut cond = TextMention::new("APPROVE");
        let conv = conv();
        assert!(cond.check(&conv, 0).is_none());
    }

    #[test]
    fn test_text_mention_fires_on_exact_turn() {
        let mut cond = TextMention::new("APPROVE");
        let mut conv = conv();

        conv.append(Message::text("primary", "Leaves fall")).unwrap();
        assert!(cond.check(&conv, 1).is_none());

        conv.append(Message::text("critic", "Looks good. APPROVE")).unwrap();
        assert!(cond.check(&conv, 2).is_some());
    }

    #[test]
    fn test_text_mention_source_filter() {
        let mut cond = TextMention::new("APPROVE").from_sources(["user_proxy"]);
        let mut conv = conv();

        conv.append(Message::text("critic", "APPROVE")).unwrap();
        assert!(cond.check(&conv, 1).is_none());

        conv.append(Message::text("user_proxy", "APPROVE")).unwrap();
        assert!(cond.check(&conv, 2).is_some());
    }

    #[test]
    fn test_max_messages_counts_task() {
        let mut cond = MaxMessages::new(2);
        let mut conv = conv();
        assert!(cond.check(&conv, 0).is_none());

        conv.append(Message::text("primary", "one")).unwrap();
        assert_eq!(cond.check(&conv, 1), Some(StopReason::MaxMessages { limit: 2 }));
    }

    #[test]
    fn test_max_turns() {
        let mut cond = MaxTurns::new(3);
        let conv = conv();
        assert!(cond.check(&conv, 2).is_none());
        assert!(cond.check(&conv, 3).is_some());
    }

    #[test]
    fn test_source_match() {
        let mut cond = SourceMatch::new(["critic"]);
        let mut conv = conv();
        conv.append(Message::text("primary", "draft")).unwrap();
        assert!(cond.check(&conv, 1).is_none());

        conv.append(Message::text("critic", "ok")).unwrap();
        assert_eq!(
            cond.check(&conv, 2),
            Some(StopReason::SourceMatch {
                source: "critic".into()
            })
        );
    }

    #[test]
    fn test_source_match_uses_latest_speaker() {
        let mut cond = SourceMatch::new(["orchestrator"]);
        let mut conv = Conversation::with_task(["orchestrator", "coder"], "Fix the build");
        conv.append(Message::text("orchestrator", "plan: ask the coder")).unwrap();
        conv.append(Message::text("coder", "done")).unwrap();
        assert!(cond.check(&conv, 1).is_none());

        // No new messages since the last check
        assert!(cond.check(&conv, 1).is_none());

        conv.append(Message::text("orchestrator", "wrap up")).unwrap();
        assert!(cond.check(&conv, 2).is_some());
        assert!(cond.check(&conv, 2).is_none());
    }

    #[test]
    fn test_timeout() {
        let mut cond = Timeout::new(Duration::ZERO);
        assert!(cond.check(&conv(), 0).is_some());

        let mut cond = Timeout::new(Duration::from_secs(3600));
        assert!(cond.check(&conv(), 0).is_none());
    }

    #[test]
    fn test_handoff_to_user() {
        let mut cond = HandoffTo::new("user");
        let mut conv = conv();
        conv.append(Message::handoff("Alice", "user", "need input")).unwrap();

        assert_eq!(
            cond.check(&conv, 1),
            Some(StopReason::Handoff {
                target: "user".into()
            })
        );
    }
}
