//! Tool execution system
//!
//! Provides:
//! - Tool schemas with JSON Schema argument validation
//! - A registry shared by the agents of a team
//! - An executor that runs stateless calls in parallel (4 concurrent calls)
//!   and serializes batches touching stateful tools
//! - Agents and teams wrapped as stateful tools

pub mod agent_tool;
pub mod executor;
pub mod registry;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use agent_tool::{AgentTool, TeamTool};
pub use executor::{ToolExecutor, MAX_PARALLEL_TOOL_CALLS};
pub use registry::{ToolEntry, ToolRegistry};
pub use types::{FnHandler, ToolHandler, ToolResult, ToolSchema, ToolStats};
