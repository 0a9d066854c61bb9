//! Shared helpers for integration tests

#![allow(dead_code)]

use crewchat::agent::{Agent, AgentDescriptor, ModelAgent};
use crewchat::models::{ModelResponse, ScriptedModel};
use crewchat::tools::ToolRegistry;
use std::sync::Arc;

/// Model agent answering from `replies`, then repeating `"..."`
pub fn scripted_agent(name: &str, replies: &[&str]) -> Arc<dyn Agent> {
    let model = ScriptedModel::with_replies(name, replies.iter().copied())
        .with_fallback(ModelResponse::text("..."));
    Arc::new(ModelAgent::new(
        AgentDescriptor::new(name, format!("You are {}.", name)),
        Arc::new(model),
    ))
}

/// Model agent with tools drawn from `registry`
pub fn tool_agent(
    name: &str,
    tools: &[&str],
    model: Arc<ScriptedModel>,
    registry: Arc<ToolRegistry>,
) -> Arc<dyn Agent> {
    let descriptor = AgentDescriptor::new(name, "Use your tools.").with_tools(tools.iter().copied());
    let agent = ModelAgent::new(descriptor, model)
        .with_registry(registry)
        .expect("tools are registered");
    Arc::new(agent)
}

/// Progress ledger reply for an orchestrator controller
pub fn ledger(satisfied: bool, progress: bool, speaker: &str, instruction: &str) -> String {
    serde_json::json!({
        "is_request_satisfied": satisfied,
        "is_progress_being_made": progress,
        "next_speaker": speaker,
        "instruction": instruction,
        "reason": if satisfied { "the request is answered" } else { "work remains" }
    })
    .to_string()
}
