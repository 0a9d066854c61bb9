//! Human-proxy agent
//!
//! Takes its turn by asking a person. Without a timeout the run waits as long
//! as it takes; with one, a late answer aborts the turn with
//! [`AgentError::HumanInputTimeout`] and the run's timeout policy decides what
//! happens next.

use crate::agent::{Agent, AgentDescriptor, AgentReply, TurnContext};
use crate::errors::{AgentError, Result};
use crate::human::InputProvider;
use crate::types::Message;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Agent backed by a human
pub struct HumanProxyAgent {
    descriptor: AgentDescriptor,
    input: Arc<dyn InputProvider>,
    timeout: Option<Duration>,
}

impl HumanProxyAgent {
    pub fn new(name: impl Into<String>, input: Arc<dyn InputProvider>) -> Self {
        let descriptor = AgentDescriptor::new(name, "").with_description("A human user.");
        Self {
            descriptor,
            input,
            timeout: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.descriptor = self.descriptor.with_description(description);
        self
    }

    /// Abort the turn if no answer arrives in time
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Agent for HumanProxyAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn respond(&self, ctx: &TurnContext<'_>) -> Result<AgentReply> {
        let prompt = ctx.prompt();
        info!(agent = %self.descriptor.name, "waiting for human input");

        let answer = match self.timeout {
            None => self.input.read_input(&prompt).await?,
            Some(limit) => tokio::time::timeout(limit, self.input.read_input(&prompt))
                .await
                .map_err(|_| AgentError::HumanInputTimeout {
                    agent: self.descriptor.name.clone(),
                    duration_ms: limit.as_millis() as u64,
                })??,
        };

        Ok(AgentReply::single(Message::text(&self.descriptor.name, answer)))
    }
}
