//! Agent descriptors
//!
//! A descriptor is an agent's static identity: its name, how it presents
//! itself to selectors, its role prompt, which tools it may call, the memory it
//! reads, whom it may hand off to and the shape its final answer must take.

use crate::memory::MemoryBinding;
use serde_json::Value;

/// Static description of an agent
#[derive(Debug, Clone)]
pub struct AgentDescriptor {
    /// Unique name within a roster
    pub name: String,

    /// One-line description shown to selectors and as tool description
    pub description: String,

    /// System prompt describing the agent's role
    pub role_prompt: String,

    /// Names of registry tools the agent may call
    pub tools: Vec<String>,

    /// Memory sources queried before each turn
    pub memory: Vec<MemoryBinding>,

    /// Agents this one may hand the conversation to
    pub handoffs: Vec<String>,

    /// JSON Schema the agent's final answer must satisfy
    pub output_schema: Option<Value>,
}

impl AgentDescriptor {
    /// Create descriptor with a name and role prompt
    pub fn new(name: impl Into<String>, role_prompt: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            description: format!("An agent named {}.", name),
            name,
            role_prompt: role_prompt.into(),
            tools: Vec::new(),
            memory: Vec::new(),
            handoffs: Vec::new(),
            output_schema: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_role_prompt(mut self, role_prompt: impl Into<String>) -> Self {
        self.role_prompt = role_prompt.into();
        self
    }

    /// Allow the named registry tools
    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools.extend(tools.into_iter().map(Into::into));
        self
    }

    pub fn with_memory(mut self, binding: MemoryBinding) -> Self {
        self.memory.push(binding);
        self
    }

    /// Allow handing off to the named agents
    pub fn with_handoffs<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.handoffs.extend(targets.into_iter().map(Into::into));
        self
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Name of the tool that hands off to `target`
    pub fn handoff_tool_name(target: &str) -> String {
        format!("transfer_to_{}", target)
    }

    /// Target named by a handoff tool, if `tool` is one of this agent's handoff tools
    pub fn handoff_target(&self, tool: &str) -> Option<&str> {
        let target = tool.strip_prefix("transfer_to_")?;
        self.handoffs
            .iter()
            .find(|h| h.as_str() == target)
            .map(|h| h.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_builder() {
        let descriptor = AgentDescriptor::new("travel_agent", "You are a helpful travel agent.")
            .with_description("Books trips")
            .with_tools(["lookup_hotel", "lookup_flight"])
            .with_handoffs(["flights_refunder", "user"])
            .with_output_schema(json!({"type": "object"}));

        assert_eq!(descriptor.name, "travel_agent");
        assert_eq!(descriptor.description, "Books trips");
        assert_eq!(descriptor.tools.len(), 2);
        assert!(descriptor.output_schema.is_some());
    }

    #[test]
    fn test_default_description() {
        let descriptor = AgentDescriptor::new("critic", "Provide feedback.");
        assert!(descriptor.description.contains("critic"));
    }

    #[test]
    fn test_handoff_target() {
        let descriptor = AgentDescriptor::new("Alice", "").with_handoffs(["Bob"]);

        assert_eq!(AgentDescriptor::handoff_tool_name("Bob"), "transfer_to_Bob");
        assert_eq!(descriptor.handoff_target("transfer_to_Bob"), Some("Bob"));
        assert_eq!(descriptor.handoff_target("transfer_to_Carol"), None);
        assert_eq!(descriptor.handoff_target("lookup_hotel"), None);
    }
}
