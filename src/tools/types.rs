//! Tool invocation types
//!
//! Schemas, handlers, results and per-executor statistics.

use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Result of a tool invocation
///
/// Failures are data, not errors: a failed invocation is handed back to the
/// invoking agent so it can retry or give up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Id of the call this result answers
    pub call_id: String,

    /// Tool name that was invoked
    pub tool: String,

    /// Handler output rendered as text
    pub output: String,

    /// Whether the invocation succeeded
    pub success: bool,

    /// Invocation duration in milliseconds
    pub duration_ms: u64,

    /// Error message if the invocation failed
    pub error: Option<String>,
}

impl ToolResult {
    /// Create successful result
    pub fn success(
        call_id: impl Into<String>,
        tool: impl Into<String>,
        output: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool: tool.into(),
            output: output.into(),
            success: true,
            duration_ms: duration.as_millis() as u64,
            error: None,
        }
    }

    /// Create failed result
    pub fn failure(
        call_id: impl Into<String>,
        tool: impl Into<String>,
        error: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool: tool.into(),
            output: String::new(),
            success: false,
            duration_ms: duration.as_millis() as u64,
            error: Some(error.into()),
        }
    }

    /// Text handed back to the model for this result
    pub fn render(&self) -> String {
        if self.success {
            self.output.clone()
        } else {
            format!(
                "Error: {}",
                self.error.as_deref().unwrap_or("tool invocation failed")
            )
        }
    }
}

/// Tool schema definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name (unique within a registry)
    pub name: String,

    /// Tool description shown to the model
    pub description: String,

    /// Input schema (JSON Schema)
    pub parameters: serde_json::Value,

    /// Output schema, when the output is structured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,

    /// Whether the tool wraps a stateful collaborator (never run concurrently)
    #[serde(default)]
    pub stateful: bool,
}

impl ToolSchema {
    /// Create new stateless tool schema
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            output: None,
            stateful: false,
        }
    }

    /// Declare an output schema
    pub fn with_output(mut self, output: serde_json::Value) -> Self {
        self.output = Some(output);
        self
    }

    /// Mark the tool as wrapping a stateful collaborator
    pub fn stateful(mut self) -> Self {
        self.stateful = true;
        self
    }
}

/// Callable behind a registered tool
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Invoke the tool with already-validated arguments
    async fn call(&self, args: serde_json::Value) -> Result<serde_json::Value>;
}

/// Adapter turning an async closure into a [`ToolHandler`]
pub struct FnHandler<F>(F);

impl<F, Fut> FnHandler<F>
where
    F: Fn(serde_json::Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<serde_json::Value>> + Send,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(serde_json::Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<serde_json::Value>> + Send,
{
    async fn call(&self, args: serde_json::Value) -> Result<serde_json::Value> {
        (self.0)(args).await
    }
}

/// Counters kept by one executor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolStats {
    pub calls: u64,
    pub failures: u64,

    /// Summed handler time, validation included
    pub busy_ms: u64,

    /// Batches dispatched concurrently
    pub parallel_batches: u64,

    /// Batches forced to run one call at a time
    pub serialized_batches: u64,
}

impl ToolStats {
    pub fn record(&mut self, result: &ToolResult) {
        self.calls += 1;
        if !result.success {
            self.failures += 1;
        }
        self.busy_ms += result.duration_ms;
    }

    pub fn mean_duration(&self) -> Duration {
        match self.calls {
            0 => Duration::ZERO,
            n => Duration::from_millis(self.busy_ms / n),
        }
    }

    pub fn failure_rate(&self) -> f64 {
        if self.calls == 0 {
            return 0.0;
        }
        self.failures as f64 / self.calls as f64
    }
}
