//! Deterministic scripted model
//!
//! Replays a queue of canned responses and records every request it receives.
//! Used for tests and for replaying a run with the same inputs.

use crate::errors::{AgentError, Result};
use crate::models::{ChatModel, ModelRequest, ModelResponse};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// One scripted answer and the pieces it streams as
#[derive(Debug, Clone)]
struct Entry {
    response: ModelResponse,
    chunks: Vec<String>,
}

impl Entry {
    fn whole(response: ModelResponse) -> Self {
        Self {
            response,
            chunks: Vec::new(),
        }
    }
}

/// Model that answers from a script
#[derive(Debug, Default)]
pub struct ScriptedModel {
    name: String,
    script: Mutex<VecDeque<Entry>>,
    fallback: Option<ModelResponse>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Model that replies with the given texts in order
    pub fn with_replies<I, S>(name: impl Into<String>, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let model = Self::new(name);
        for reply in replies {
            model.push(ModelResponse::text(reply));
        }
        model
    }

    /// Queue a response
    pub fn push(&self, response: ModelResponse) {
        self.push_entry(Entry::whole(response));
    }

    /// Queue a text reply that streams as `chunks`
    ///
    /// [`complete`](ChatModel::complete) returns the chunks joined.
    pub fn push_chunks<I, S>(&self, chunks: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let chunks: Vec<String> = chunks.into_iter().map(Into::into).collect();
        self.push_entry(Entry {
            response: ModelResponse::text(chunks.concat()),
            chunks,
        });
    }

    /// Builder-style [`push_chunks`](Self::push_chunks)
    pub fn then_chunks<I, S>(self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_chunks(chunks);
        self
    }

    fn push_entry(&self, entry: Entry) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(entry);
    }

    /// Builder-style [`push`](Self::push)
    pub fn then(self, response: ModelResponse) -> Self {
        self.push(response);
        self
    }

    /// Response used once the script is exhausted
    pub fn with_fallback(mut self, response: ModelResponse) -> Self {
        self.fallback = Some(response);
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of completions served
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Responses still queued
    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn model_name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse> {
        Ok(self.next(request)?.response)
    }

    async fn complete_stream(
        &self,
        request: ModelRequest,
        on_chunk: &(dyn for<'a> Fn(&'a str) + Send + Sync),
    ) -> Result<ModelResponse> {
        let entry = self.next(request)?;
        if entry.chunks.is_empty() {
            if !entry.response.content.is_empty() {
                on_chunk(&entry.response.content);
            }
        } else {
            for chunk in &entry.chunks {
                on_chunk(chunk);
                tokio::task::yield_now().await;
            }
        }
        Ok(entry.response)
    }
}

impl ScriptedModel {
    fn next(&self, request: ModelRequest) -> Result<Entry> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);

        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        next.or_else(|| self.fallback.clone().map(Entry::whole)).ok_or_else(|| {
            AgentError::ModelApiError(format!("script for '{}' is exhausted", self.name))
        })
    }
}
