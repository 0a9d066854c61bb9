//! Human input collaborators
//!
//! A human-proxy agent blocks the run loop until its [`InputProvider`]
//! answers. Providers decide where the answer comes from: the console, or a
//! channel fed by another task (a UI, a web socket, a test).

use crate::errors::{AgentError, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};
use tokio::sync::{mpsc, Mutex};

/// Source of human replies
#[async_trait]
pub trait InputProvider: Send + Sync {
    /// Show `prompt` and wait for one reply
    async fn read_input(&self, prompt: &str) -> Result<String>;
}

/// Reads replies from standard input, one line each
pub struct ConsoleInput {
    reader: Mutex<BufReader<Stdin>>,
}

impl ConsoleInput {
    pub fn new() -> Self {
        Self {
            reader: Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }
}

impl Default for ConsoleInput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InputProvider for ConsoleInput {
    async fn read_input(&self, prompt: &str) -> Result<String> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(format!("{}\n> ", prompt).as_bytes()).await?;
        stdout.flush().await?;

        let mut line = String::new();
        let read = self.reader.lock().await.read_line(&mut line).await?;
        if read == 0 {
            return Err(AgentError::Generic("standard input closed".to_string()));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Receives replies from an in-process channel
pub struct ChannelInput {
    receiver: Mutex<mpsc::Receiver<String>>,
    prompts: Option<mpsc::UnboundedSender<String>>,
}

impl ChannelInput {
    /// Create provider and the sender that feeds it
    pub fn new(buffer: usize) -> (Self, mpsc::Sender<String>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (
            Self {
                receiver: Mutex::new(rx),
                prompts: None,
            },
            tx,
        )
    }

    /// Forward every prompt to `prompts` before waiting
    pub fn with_prompt_sink(mut self, prompts: mpsc::UnboundedSender<String>) -> Self {
        self.prompts = Some(prompts);
        self
    }
}

#[async_trait]
impl InputProvider for ChannelInput {
    async fn read_input(&self, prompt: &str) -> Result<String> {
        if let Some(sink) = &self.prompts {
            // A dropped sink only means nobody is watching prompts.
            let _ = sink.send(prompt.to_string());
        }

        self.receiver
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| AgentError::Generic("human input channel closed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_input() {
        let (input, tx) = ChannelInput::new(4);
        tx.send("APPROVE".to_string()).await.unwrap();

        assert_eq!(input.read_input("Review the poem").await.unwrap(), "APPROVE");
    }

    #[tokio::test]
    async fn test_channel_forwards_prompts() {
        let (prompt_tx, mut prompt_rx) = mpsc::unbounded_channel();
        let (input, tx) = ChannelInput::new(1);
        let input = input.with_prompt_sink(prompt_tx);
        tx.send("yes".to_string()).await.unwrap();

        input.read_input("Proceed?").await.unwrap();
        assert_eq!(prompt_rx.recv().await.unwrap(), "Proceed?");
    }

    #[tokio::test]
    async fn test_closed_channel_errors() {
        let (input, tx) = ChannelInput::new(1);
        drop(tx);
        assert!(input.read_input("anyone?").await.is_err());
    }
}
