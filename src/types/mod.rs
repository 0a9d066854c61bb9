//! Type definitions module
//!
//! Core types for conversation messages and run results.

pub mod messages;

// Re-export commonly used types
pub use messages::{Message, MessageContent, MessageKind, ToolCallRequest, Usage, USER_SOURCE};

// Run result types
pub mod execution;
pub use execution::{RunResult, StopReason};
