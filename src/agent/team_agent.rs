//! A whole team acting as one participant
//!
//! The inner team runs to completion on every turn with the turn prompt as
//! its task. Its final message becomes this agent's reply.

use crate::agent::{Agent, AgentDescriptor, AgentReply, TurnContext};
use crate::errors::{AgentError, Result};
use crate::team::Team;
use crate::types::Message;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

pub struct TeamAgent {
    descriptor: AgentDescriptor,
    team: Mutex<Team>,
}

impl TeamAgent {
    pub fn new(name: impl Into<String>, description: impl Into<String>, team: Team) -> Self {
        Self {
            descriptor: AgentDescriptor::new(name, "").with_description(description),
            team: Mutex::new(team),
        }
    }
}

#[async_trait]
impl Agent for TeamAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn respond(&self, ctx: &TurnContext<'_>) -> Result<AgentReply> {
        let mut team = self.team.lock().await;
        let result = team.run(ctx.prompt()).await;
        debug!(agent = %self.descriptor.name, summary = %result.summary(), "inner team finished");

        if let Some(e) = &result.error {
            return Err(AgentError::Generic(format!(
                "inner team of '{}' failed: {}",
                self.descriptor.name, e
            )));
        }

        let usage = result.usage();
        let message = match result.last_message().and_then(|m| m.content.as_structured()) {
            Some(value) => Message::structured(&self.descriptor.name, value.clone()),
            None => Message::text(&self.descriptor.name, result.output()),
        };
        Ok(AgentReply::single(message.with_usage(usage)))
    }

    async fn reset(&self) -> Result<()> {
        self.team.lock().await.reset().await;
        Ok(())
    }
}
