//! Tool registry
//!
//! Maps a tool name to a handler record carrying the declared schema, the
//! compiled input validator and the callable. Names are unique and schemas
//! are compiled when a tool is registered, so a bad schema never reaches a run.

use crate::errors::{AgentError, Result};
use crate::tools::types::{ToolHandler, ToolSchema};
use crate::tools::validation::compile_schema;
use jsonschema::Validator;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A registered tool
#[derive(Clone)]
pub struct ToolEntry {
    pub schema: ToolSchema,
    pub handler: Arc<dyn ToolHandler>,
    pub(crate) validator: Arc<Validator>,
}

impl fmt::Debug for ToolEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolEntry")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Tool registry
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    /// Map of tool name to entry
    tools: HashMap<String, ToolEntry>,

    /// Registration order
    order: Vec<String>,
}

impl ToolRegistry {
    /// Create empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool
    pub fn register(&mut self, schema: ToolSchema, handler: Arc<dyn ToolHandler>) -> Result<()> {
        if self.tools.contains_key(&schema.name) {
            return Err(AgentError::DuplicateTool(schema.name));
        }

        let validator = compile_schema(&schema.name, &schema.parameters)?;
        let name = schema.name.clone();

        self.tools.insert(
            name.clone(),
            ToolEntry {
                schema,
                handler,
                validator: Arc::new(validator),
            },
        );
        self.order.push(name);
        Ok(())
    }

    /// Builder-style registration
    pub fn with_tool(mut self, schema: ToolSchema, handler: Arc<dyn ToolHandler>) -> Result<Self> {
        self.register(schema, handler)?;
        Ok(self)
    }

    /// Get tool entry by name
    pub fn get(&self, name: &str) -> Option<&ToolEntry> {
        self.tools.get(name)
    }

    /// Get tool schema by name
    pub fn schema(&self, name: &str) -> Option<&ToolSchema> {
        self.tools.get(name).map(|entry| &entry.schema)
    }

    /// Check if tool exists
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get all tool names in registration order
    pub fn tool_names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Get all tool schemas in registration order
    pub fn schemas(&self) -> Vec<&ToolSchema> {
        self.order
            .iter()
            .filter_map(|name| self.schema(name))
            .collect()
    }

    /// Schemas for the given names, skipping unknown ones
    pub fn schemas_for(&self, names: &[String]) -> Vec<ToolSchema> {
        names
            .iter()
            .filter_map(|name| self.schema(name).cloned())
            .collect()
    }

    /// Names of tools that wrap stateful collaborators
    pub fn stateful_tools(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|name| self.schema(name).map(|s| s.stateful).unwrap_or(false))
            .cloned()
            .collect()
    }

    /// Whether the named tool is stateful (unknown tools count as stateful)
    pub fn is_stateful(&self, name: &str) -> bool {
        self.schema(name).map(|s| s.stateful).unwrap_or(true)
    }

    /// Get total number of tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::types::FnHandler;
    use serde_json::json;

    fn echo() -> Arc<dyn ToolHandler> {
        Arc::new(FnHandler::new(|args: serde_json::Value| async move { Ok::<_, AgentError>(args) }))
    }

    fn schema(name: &str) -> ToolSchema {
        ToolSchema::new(
            name,
            "test tool",
            json!({"type": "object", "properties": {"q": {"type": "string"}}}),
        )
    }

    #[test]
    fn test_registry_creation() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(schema("lookup_hotel"), echo()).unwrap();
        registry.register(schema("lookup_flight"), echo()).unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("lookup_hotel"));
        assert_eq!(registry.tool_names(), vec!["lookup_hotel", "lookup_flight"]);
        assert_eq!(registry.schema("lookup_flight").unwrap().name, "lookup_flight");
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(schema("book_trip"), echo()).unwrap();
        let result = registry.register(schema("book_trip"), echo());

        assert!(matches!(result, Err(AgentError::DuplicateTool(name)) if name == "book_trip"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_invalid_schema_rejected_at_registration() {
        let mut registry = ToolRegistry::new();
        let bad = ToolSchema::new("bad", "broken", json!({"type": "not-a-type"}));

        assert!(registry.register(bad, echo()).is_err());
        assert!(!registry.contains("bad"));
    }

    #[test]
    fn test_stateful_classification() {
        let registry = ToolRegistry::new()
            .with_tool(schema("sum"), echo())
            .unwrap()
            .with_tool(schema("writer").stateful(), echo())
            .unwrap();

        assert_eq!(registry.stateful_tools(), vec!["writer"]);
        assert!(!registry.is_stateful("sum"));
        assert!(registry.is_stateful("writer"));
        assert!(registry.is_stateful("nonexistent_tool"));
    }

    #[test]
    fn test_schemas_for_subset() {
        let registry = ToolRegistry::new()
            .with_tool(schema("a"), echo())
            .unwrap()
            .with_tool(schema("b"), echo())
            .unwrap();

        let subset = registry.schemas_for(&["b".to_string(), "zzz".to_string()]);
        assert_eq!(subset.len(), 1);
        assert_eq!(subset[0].name, "b");
    }
}
