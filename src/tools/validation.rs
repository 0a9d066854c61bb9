//! JSON Schema argument validation

use crate::errors::{AgentError, Result};
use jsonschema::Validator;
use serde_json::Value;

/// Compile a tool's input schema
pub fn compile_schema(tool: &str, schema: &Value) -> Result<Validator> {
    Validator::new(schema)
        .map_err(|e| AgentError::ConfigError(format!("invalid input schema for tool '{}': {}", tool, e)))
}

/// Validate `args` against a compiled schema, collecting every violation
pub fn validate_arguments(tool: &str, validator: &Validator, args: &Value) -> Result<()> {
    if validator.is_valid(args) {
        return Ok(());
    }

    let errors: Vec<String> = validator.iter_errors(args).map(|e| e.to_string()).collect();
    Err(AgentError::SchemaValidation {
        tool: tool.to_string(),
        reason: errors.join("; "),
    })
}

/// Validate a value against an uncompiled schema (structured agent output)
pub fn validate_value(label: &str, schema: &Value, value: &Value) -> Result<()> {
    let validator = compile_schema(label, schema)?;
    validate_arguments(label, &validator, value)
}
