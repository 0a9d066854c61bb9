//! Append-only conversation log
//!
//! The conversation is the single point of synchronization between agents:
//! every participant reads it, only the run loop appends to it, and nothing
//! is ever reordered or removed.

use crate::errors::{AgentError, Result};
use crate::types::{Message, MessageKind, USER_SOURCE};
use std::collections::HashSet;

/// Ordered log of messages exchanged during a run
#[derive(Debug, Clone)]
pub struct Conversation {
    /// Messages in append order
    messages: Vec<Message>,

    /// Participant names allowed as message sources
    participants: HashSet<String>,
}

impl Conversation {
    /// Create conversation accepting messages from `participants` and the task seed
    pub fn new<I, S>(participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut participants: HashSet<String> = participants.into_iter().map(Into::into).collect();
        participants.insert(USER_SOURCE.to_string());

        Self {
            messages: Vec::new(),
            participants,
        }
    }

    /// Create conversation seeded with the task message
    pub fn with_task<I, S>(participants: I, task: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut conversation = Self::new(participants);
        conversation.messages.push(Message::task(task));
        conversation
    }

    /// Append a message
    ///
    /// Rejects messages whose source is not a participant of this run.
    pub fn append(&mut self, message: Message) -> Result<&Message> {
        if !self.participants.contains(&message.source) {
            return Err(AgentError::UnknownAgent(message.source));
        }

        self.messages.push(message);
        Ok(&self.messages[self.messages.len() - 1])
    }

    /// Get all messages
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Get the most recent message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Messages appended at or after `index`
    pub fn since(&self, index: usize) -> &[Message] {
        let start = index.min(self.messages.len());
        &self.messages[start..]
    }

    /// Get the task text that seeded the conversation
    pub fn task(&self) -> Option<String> {
        self.messages
            .iter()
            .find(|m| m.is_task())
            .map(|m| m.text_content())
    }

    /// Most recent message from a participant (the task seed is skipped)
    pub fn last_speaker(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| !m.is_task())
            .map(|m| m.source.as_str())
    }

    /// Most recent message of a specific kind
    pub fn last_of_kind(&self, kind: MessageKind) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.kind == kind)
    }

    /// Whether `name` is accepted as a message source
    pub fn is_participant(&self, name: &str) -> bool {
        self.participants.contains(name)
    }

    /// Count total messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if conversation is empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Calculate total token estimate for all messages
    pub fn total_tokens(&self) -> usize {
        self.messages.iter().map(|m| m.estimate_tokens()).sum()
    }

    /// Render the conversation as a transcript
    pub fn transcript(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}: {}", m.source, m.text_content()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Consume the conversation, returning its messages
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}
