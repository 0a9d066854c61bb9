//! Tool executor
//!
//! Runs the tool calls an agent requested in one turn. Calls run concurrently
//! (at most four at a time) only when parallel calls are enabled and every
//! requested tool is stateless; a batch touching any stateful collaborator
//! runs one call at a time. Results always come back in request order.
//!
//! Invocation never fails: an unknown tool, arguments rejected by the input
//! schema, a handler error and a panicking handler all become failed
//! [`ToolResult`]s for the agent to read on its next step.

use crate::errors::AgentError;
use crate::tools::registry::ToolRegistry;
use crate::tools::types::{ToolResult, ToolStats};
use crate::tools::validation::validate_arguments;
use crate::types::ToolCallRequest;
use futures_util::future::join_all;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Maximum concurrent tool calls
pub const MAX_PARALLEL_TOOL_CALLS: usize = 4;

/// Executor for tool calls
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    /// Semaphore for concurrency control
    semaphore: Arc<Semaphore>,

    /// Tool registry
    registry: Arc<ToolRegistry>,

    /// Whether independent calls may run concurrently
    parallel: bool,

    /// Execution statistics
    stats: Arc<Mutex<ToolStats>>,
}

impl ToolExecutor {
    /// Create executor over a registry
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(MAX_PARALLEL_TOOL_CALLS)),
            registry,
            parallel: true,
            stats: Arc::new(Mutex::new(ToolStats::default())),
        }
    }

    /// Enable or disable concurrent dispatch
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Invoke a single tool call
    pub async fn invoke(&self, call: &ToolCallRequest) -> ToolResult {
        let start = Instant::now();

        let Some(entry) = self.registry.get(&call.name) else {
            let result = ToolResult::failure(
                &call.id,
                &call.name,
                AgentError::UnknownTool(call.name.clone()).to_string(),
                start.elapsed(),
            );
            self.record(&result);
            return result;
        };

        if let Err(e) = validate_arguments(&call.name, &entry.validator, &call.arguments) {
            debug!(tool = %call.name, error = %e, "tool arguments rejected");
            let result = ToolResult::failure(&call.id, &call.name, e.to_string(), start.elapsed());
            self.record(&result);
            return result;
        }

        // Spawned so that a panicking handler surfaces as a JoinError.
        let handler = entry.handler.clone();
        let args = call.arguments.clone();
        let joined = tokio::spawn(async move { handler.call(args).await }).await;

        let result = match joined {
            Ok(Ok(value)) => {
                let output = match value {
                    serde_json::Value::String(text) => text,
                    other => other.to_string(),
                };
                ToolResult::success(&call.id, &call.name, output, start.elapsed())
            }
            Ok(Err(e)) => {
                let err = AgentError::ToolHandler {
                    tool: call.name.clone(),
                    reason: e.to_string(),
                };
                ToolResult::failure(&call.id, &call.name, err.to_string(), start.elapsed())
            }
            Err(join_error) => {
                warn!(tool = %call.name, "tool handler panicked");
                let err = AgentError::ToolHandler {
                    tool: call.name.clone(),
                    reason: format!("handler panicked: {}", join_error),
                };
                ToolResult::failure(&call.id, &call.name, err.to_string(), start.elapsed())
            }
        };

        debug!(
            tool = %call.name,
            success = result.success,
            duration_ms = result.duration_ms,
            "tool call finished"
        );
        self.record(&result);
        result
    }

    /// Execute a batch of calls from one turn
    pub async fn execute_batch(&self, calls: &[ToolCallRequest]) -> Vec<ToolResult> {
        if self.can_parallelize(calls) {
            self.with_stats(|s| s.parallel_batches += 1);
            let futures = calls.iter().map(|call| async move {
                // The semaphore is never closed.
                let _permit = self.semaphore.acquire().await.ok();
                self.invoke(call).await
            });
            join_all(futures).await
        } else {
            if calls.len() > 1 {
                self.with_stats(|s| s.serialized_batches += 1);
            }
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                results.push(self.invoke(call).await);
            }
            results
        }
    }

    /// Whether concurrent dispatch is enabled
    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Whether this batch may run concurrently
    pub fn can_parallelize(&self, calls: &[ToolCallRequest]) -> bool {
        self.parallel
            && calls.len() > 1
            && calls.iter().all(|call| !self.registry.is_stateful(&call.name))
    }

    /// Get registry reference
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Snapshot of execution statistics
    pub fn stats(&self) -> ToolStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Get current parallelism limit
    pub fn max_parallel_operations(&self) -> usize {
        MAX_PARALLEL_TOOL_CALLS
    }

    fn record(&self, result: &ToolResult) {
        self.with_stats(|s| s.record(result));
    }

    fn with_stats(&self, f: impl FnOnce(&mut ToolStats)) {
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut stats);
    }
}
