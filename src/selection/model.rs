//! Model-driven speaker selection
//!
//! A chat model reads the roster and the conversation and names the next
//! speaker. Replies that do not name exactly one eligible participant are
//! answered with a corrective prompt; when attempts run out the run fails with
//! [`AgentError::Selection`].

use crate::agent::AgentRoster;
use crate::conversation::Conversation;
use crate::errors::{AgentError, Result};
use crate::models::{ChatMessage, ChatModel, ModelRequest};
use crate::selection::{Selection, TurnSelector};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default number of attempts before selection fails
pub const DEFAULT_MAX_SELECTOR_ATTEMPTS: u32 = 3;

/// Selector that asks a model who speaks next
pub struct ModelSelector {
    model: Arc<dyn ChatModel>,
    max_attempts: u32,
    allow_repeated_speaker: bool,
    prompt_template: String,
}

const DEFAULT_PROMPT: &str = "You are coordinating a team working on a task. The following roles are available:
{roles}

Read the following conversation. Then select the next role from {participants} to play. Only return the role.

{history}

Read the above conversation. Then select the next role from {participants} to play. Only return the role.";

impl ModelSelector {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            max_attempts: DEFAULT_MAX_SELECTOR_ATTEMPTS,
            allow_repeated_speaker: false,
            prompt_template: DEFAULT_PROMPT.to_string(),
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Let the previous speaker be chosen again
    pub fn with_allow_repeated_speaker(mut self, allow: bool) -> Self {
        self.allow_repeated_speaker = allow;
        self
    }

    /// Replace the selection prompt; `{roles}`, `{participants}` and `{history}` are filled in
    pub fn with_prompt(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = template.into();
        self
    }

    fn candidates(&self, conversation: &Conversation, roster: &AgentRoster) -> Vec<String> {
        let mut names = roster.names();
        if !self.allow_repeated_speaker && names.len() > 1 {
            if let Some(previous) = conversation.last_speaker() {
                names.retain(|n| n != previous);
            }
        }
        names
    }

    fn render_prompt(&self, conversation: &Conversation, roster: &AgentRoster, candidates: &[String]) -> String {
        let roles = roster
            .agents()
            .iter()
            .filter(|a| candidates.iter().any(|c| c == a.name()))
            .map(|a| format!("{}: {}", a.name(), a.descriptor().description))
            .collect::<Vec<_>>()
            .join("\n");

        self.prompt_template
            .replace("{roles}", &roles)
            .replace("{participants}", &format!("[{}]", candidates.join(", ")))
            .replace("{history}", &conversation.transcript())
    }
}

#[async_trait]
impl TurnSelector for ModelSelector {
    fn name(&self) -> &'static str {
        "model"
    }

    async fn select(&mut self, conversation: &Conversation, roster: &AgentRoster) -> Result<Selection> {
        let candidates = self.candidates(conversation, roster);

        match candidates.len() {
            0 => return Err(AgentError::NoEligibleAgent("roster is empty".to_string())),
            1 => return Ok(Selection::speaker(candidates[0].clone())),
            _ => {}
        }

        let mut messages = vec![ChatMessage::system(self.render_prompt(conversation, roster, &candidates))];
        let mut last_reply = String::new();

        for attempt in 1..=self.max_attempts {
            let response = self.model.complete(ModelRequest::new(messages.clone())).await?;
            let reply = response.content.trim().to_string();

            if let Some(name) = parse_speaker(&reply, &candidates) {
                debug!(speaker = %name, attempt, "model selected speaker");
                return Ok(Selection::speaker(name));
            }

            warn!(reply = %reply, attempt, "selector reply did not name one eligible agent");
            messages.push(ChatMessage::assistant(reply.clone()));
            messages.push(ChatMessage::user(format!(
                "'{}' is not a valid choice. Reply with exactly one name from [{}].",
                reply,
                candidates.join(", ")
            )));
            last_reply = reply;
        }

        Err(AgentError::Selection {
            attempts: self.max_attempts,
            last_reply,
        })
    }

    fn reset(&mut self) {}
}

/// Resolve a model reply to a candidate name
///
/// An exact (trimmed) match wins; otherwise the reply must mention exactly one
/// candidate as a whole word.
pub fn parse_speaker(reply: &str, candidates: &[String]) -> Option<String> {
    let trimmed = reply.trim().trim_matches(|c: char| c == '"' || c == '\'' || c == '.' || c == '`');
    if let Some(exact) = candidates.iter().find(|c| c.as_str() == trimmed) {
        return Some(exact.clone());
    }

    let mentioned: Vec<&String> = candidates.iter().filter(|c| mentions(reply, c)).collect();
    match mentioned.as_slice() {
        [only] => Some((*only).clone()),
        _ => None,
    }
}

fn mentions(text: &str, name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let is_word = |c: char| c.is_alphanumeric() || c == '_';

    text.match_indices(name).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + name.len()..].chars().next();
        !before.map(is_word).unwrap_or(false) && !after.map(is_word).unwrap_or(false)
    })
}
