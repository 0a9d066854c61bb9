//! Error types for crewchat
//!
//! Separates recoverable tool-level failures (which re-enter the conversation
//! as error-tagged tool results) from structural orchestration failures that
//! end a run.

use thiserror::Error;

/// Main error type for the orchestration system
#[derive(Error, Debug)]
pub enum AgentError {
    /// Run state machine transition errors
    #[error("Invalid state transition from {from:?} to {to:?}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    /// Turn selector could not produce a speaker
    #[error("No eligible agent: {0}")]
    NoEligibleAgent(String),

    /// Model-driven selection returned unknown names until attempts ran out
    #[error("Speaker selection failed after {attempts} attempts: {last_reply}")]
    Selection { attempts: u32, last_reply: String },

    /// Orchestrator detected no progress for too many consecutive turns
    #[error("Run stalled after {stalls} consecutive turns without progress (limit {max_stalls})")]
    Stalled { stalls: u32, max_stalls: u32 },

    /// Human-proxy collaborator did not answer in time
    #[error("Human input for '{agent}' timed out after {duration_ms}ms")]
    HumanInputTimeout { agent: String, duration_ms: u64 },

    /// Tool arguments rejected by the declared input schema
    #[error("Invalid arguments for tool '{tool}': {reason}")]
    SchemaValidation { tool: String, reason: String },

    /// Tool handler reported a failure
    #[error("Tool '{tool}' failed: {reason}")]
    ToolHandler { tool: String, reason: String },

    /// Tool name not present in the registry
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Agent name not present in the roster
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    /// Agent name registered twice
    #[error("Duplicate agent name: {0}")]
    DuplicateAgent(String),

    /// Tool name registered twice
    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),

    /// Model endpoint errors
    #[error("Model API error: {0}")]
    ModelApiError(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Model request exceeded the client timeout
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Generic errors with context
    #[error("Agent error: {0}")]
    Generic(String),
}

impl AgentError {
    /// Transient failures worth retrying with backoff
    pub fn is_retryable(&self) -> bool {
        match self {
            AgentError::HttpError(e) => e.is_timeout() || e.is_connect(),
            AgentError::Timeout { .. } => true,
            AgentError::ModelApiError(msg) => {
                msg.contains("HTTP 429") || msg.contains("HTTP 5")
            }
            _ => false,
        }
    }
}

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Convert anyhow errors to AgentError
impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Generic(err.to_string())
    }
}
