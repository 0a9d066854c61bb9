//! crewchat - multi-agent task orchestration
//!
//! A team of agents works on a task by taking turns in a shared, append-only
//! conversation until a termination condition fires.
//!
//! # Architecture
//!
//! - **Agents**: model-backed, human-backed, or whole teams nested as one participant
//! - **Selection**: round-robin, model-driven, handoff-driven, orchestrator-driven
//! - **Termination**: composable stop conditions checked once per turn
//! - **Tools**: schema-validated, parallel when stateless, serialized when stateful
//! - **Memory**: per-agent and shared context sources
//! - **Crews**: sequential task pipelines on top of single-turn teams

// Core types
pub mod errors;
pub mod types;
pub mod conversation;
pub mod config;

// Participants and their collaborators
pub mod agent;
pub mod models;
pub mod tools;
pub mod memory;
pub mod human;

// Run loop
pub mod selection;
pub mod termination;
pub mod team;
pub mod crew;

pub mod telemetry;

// Config-driven team assembly for the binary
pub mod execution;

// Re-export commonly used types
pub use errors::{AgentError, Result};
pub use team::{RunEvent, Team, TeamBuilder};
pub use types::{Message, RunResult, StopReason};
