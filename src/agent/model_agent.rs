//! Model-backed agent
//!
//! Prompts a [`ChatModel`] with its role, retrieved memory and the
//! conversation, runs the tools it asks for and hands their results back,
//! until the model answers in text or hands off to another agent.

use crate::agent::{Agent, AgentDescriptor, AgentReply, ChunkSender, TurnChunk, TurnContext};
use crate::errors::{AgentError, Result};
use crate::memory::render_memory_context;
use crate::models::{ChatMessage, ChatModel, ModelRequest, ModelResponse, RetryPolicy};
use crate::tools::validation::validate_value;
use crate::tools::{ToolExecutor, ToolRegistry, ToolResult, ToolSchema};
use crate::types::{Message, ToolCallRequest, Usage};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default number of tool round trips per turn
pub const DEFAULT_MAX_TOOL_ITERATIONS: usize = 5;

/// Last line of a plan the model considers complete
const PLAN_READY: &str = "READY";

/// Last line of a plan that needs another pass
const PLAN_NOT_READY: &str = "NOT READY";

/// Agent driven by a chat model
pub struct ModelAgent {
    descriptor: AgentDescriptor,
    model: Arc<dyn ChatModel>,
    executor: ToolExecutor,
    retry: RetryPolicy,
    max_tool_iterations: usize,
    temperature: Option<f32>,
    /// Plan refinements allowed before each turn; `None` disables planning
    reasoning: Option<usize>,
}

impl ModelAgent {
    /// Create agent without tools
    pub fn new(descriptor: AgentDescriptor, model: Arc<dyn ChatModel>) -> Self {
        Self {
            descriptor,
            model,
            executor: ToolExecutor::new(Arc::new(ToolRegistry::new())),
            retry: RetryPolicy::default(),
            max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
            temperature: None,
            reasoning: None,
        }
    }

    /// Use tools from `registry`; every tool the descriptor names must be registered
    pub fn with_registry(mut self, registry: Arc<ToolRegistry>) -> Result<Self> {
        if let Some(missing) = self.descriptor.tools.iter().find(|t| !registry.contains(t)) {
            return Err(AgentError::UnknownTool(missing.clone()));
        }
        self.executor = ToolExecutor::new(registry).with_parallel(self.executor.is_parallel());
        Ok(self)
    }

    /// Allow or forbid concurrent tool calls within one step
    pub fn with_parallel_tool_calls(mut self, parallel: bool) -> Self {
        self.executor = self.executor.with_parallel(parallel);
        self
    }

    pub fn with_max_tool_iterations(mut self, iterations: usize) -> Self {
        self.max_tool_iterations = iterations;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Write a plan before answering, refining it at most `max_attempts` times
    ///
    /// The plan is placed at the top of the system prompt of the turn.
    pub fn with_reasoning(mut self, max_attempts: usize) -> Self {
        self.reasoning = Some(max_attempts);
        self
    }

    /// Tool executor used by this agent
    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    fn system_prompt(&self, ctx: &TurnContext<'_>) -> String {
        let mut prompt = self.descriptor.role_prompt.clone();

        if let Some(memory) = render_memory_context(ctx.memory_context) {
            if !prompt.is_empty() {
                prompt.push_str("\n\n");
            }
            prompt.push_str(&memory);
        }

        if let Some(instruction) = ctx.instruction {
            if !prompt.is_empty() {
                prompt.push_str("\n\n");
            }
            prompt.push_str("Instruction for this turn: ");
            prompt.push_str(instruction);
        }

        prompt
    }

    fn history(&self, ctx: &TurnContext<'_>) -> Vec<ChatMessage> {
        ctx.conversation
            .messages()
            .iter()
            .map(|m| {
                if m.source == self.descriptor.name {
                    ChatMessage::assistant(m.text_content())
                } else {
                    ChatMessage::user(m.text_content()).with_name(sanitize_name(&m.source))
                }
            })
            .collect()
    }

    fn exposed_tools(&self) -> Vec<ToolSchema> {
        let mut tools = self.executor.registry().schemas_for(&self.descriptor.tools);
        for target in &self.descriptor.handoffs {
            tools.push(ToolSchema::new(
                AgentDescriptor::handoff_tool_name(target),
                format!("Hand the conversation over to {}.", target),
                json!({
                    "type": "object",
                    "properties": {"message": {"type": "string"}}
                }),
            ));
        }
        tools
    }

    /// Parallel flag sent to the model; stateful tools force `false`
    fn parallel_flag(&self, tools: &[ToolSchema]) -> Option<bool> {
        if tools.is_empty() {
            return None;
        }
        Some(self.executor.is_parallel() && tools.iter().all(|t| !t.stateful))
    }

    async fn complete(&self, request: &ModelRequest, chunks: Option<&ChunkSender>) -> Result<ModelResponse> {
        let model = self.model.model_name();
        let Some(sender) = chunks else {
            return self.retry.call(model, || self.model.complete(request.clone())).await;
        };

        let forward = |text: &str| {
            // A closed receiver means nobody is watching the stream
            let _ = sender.send(TurnChunk {
                agent: self.descriptor.name.clone(),
                text: text.to_string(),
            });
        };
        self.retry
            .call(model, || self.model.complete_stream(request.clone(), &forward))
            .await
    }

    /// Ask the model for a plan until it marks one ready or attempts run out
    async fn plan(
        &self,
        system: &str,
        history: &[ChatMessage],
        max_attempts: usize,
        usage: &mut Usage,
    ) -> Result<String> {
        let mut prompt = Vec::with_capacity(history.len() + 2);
        if !system.is_empty() {
            prompt.push(ChatMessage::system(system));
        }
        prompt.extend_from_slice(history);
        prompt.push(ChatMessage::user(format!(
            "Before you answer, write a short step-by-step plan for your reply. \
             End with a line containing only {} if the plan is complete, or {} if it needs more work.",
            PLAN_READY, PLAN_NOT_READY
        )));

        let mut refinements = 0;
        loop {
            let request = ModelRequest::new(prompt.clone()).with_temperature(self.temperature);
            let response = self.complete(&request, None).await?;
            if let Some(step_usage) = response.usage {
                *usage += step_usage;
            }

            let (plan, ready) = split_plan(&response.content);
            if ready || refinements >= max_attempts {
                debug!(agent = %self.descriptor.name, refinements, ready, "plan written");
                return Ok(plan);
            }

            refinements += 1;
            prompt.push(ChatMessage::assistant(response.content));
            prompt.push(ChatMessage::user(format!(
                "Refine the plan: fill any gaps and fix any mistakes. End with {} or {} as before.",
                PLAN_READY, PLAN_NOT_READY
            )));
        }
    }

    /// Run the tool calls of one model step
    async fn run_tools(&self, calls: &[ToolCallRequest]) -> (Vec<ToolResult>, Option<(String, String)>) {
        let mut handoff = None;
        let mut executable = Vec::new();

        for call in calls {
            if let Some(target) = self.descriptor.handoff_target(&call.name) {
                if handoff.is_none() {
                    let text = call.arguments["message"]
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("Transferred to {}, adopting the role of {} immediately.", target, target));
                    handoff = Some((target.to_string(), text));
                }
            } else if self.descriptor.tools.contains(&call.name) {
                executable.push(call.clone());
            }
        }

        let mut executed = self.executor.execute_batch(&executable).await.into_iter();

        // Assemble results in request order
        let results = calls
            .iter()
            .map(|call| {
                if let Some(target) = self.descriptor.handoff_target(&call.name) {
                    ToolResult::success(&call.id, &call.name, format!("Transferred to {}", target), Duration::ZERO)
                } else if self.descriptor.tools.contains(&call.name) {
                    executed.next().unwrap_or_else(|| {
                        ToolResult::failure(&call.id, &call.name, "tool result missing", Duration::ZERO)
                    })
                } else {
                    ToolResult::failure(
                        &call.id,
                        &call.name,
                        format!("Tool '{}' is not available to {}", call.name, self.descriptor.name),
                        Duration::ZERO,
                    )
                }
            })
            .collect();

        (results, handoff)
    }
}

#[async_trait]
impl Agent for ModelAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn respond(&self, ctx: &TurnContext<'_>) -> Result<AgentReply> {
        let name = self.descriptor.name.clone();
        let output_schema = ctx.output_schema.or(self.descriptor.output_schema.as_ref());

        let mut usage = Usage::default();
        let mut system = self.system_prompt(ctx);
        let history = self.history(ctx);

        if let Some(max_attempts) = self.reasoning {
            let plan = self.plan(&system, &history, max_attempts, &mut usage).await?;
            system = if system.is_empty() {
                format!("Plan:\n{}", plan)
            } else {
                format!("Plan:\n{}\n\n{}", plan, system)
            };
        }

        let mut prompt = Vec::new();
        if !system.is_empty() {
            prompt.push(ChatMessage::system(system));
        }
        prompt.extend(history);

        let tools = self.exposed_tools();
        let parallel = self.parallel_flag(&tools);

        let mut messages = Vec::new();
        let mut tool_rounds = 0;
        let mut schema_retry_used = false;

        loop {
            let offer_tools = tool_rounds < self.max_tool_iterations;
            let request = ModelRequest::new(prompt.clone())
                .with_tools(if offer_tools { tools.clone() } else { Vec::new() })
                .with_parallel_tool_calls(if offer_tools { parallel } else { None })
                .with_response_schema(output_schema.cloned())
                .with_temperature(self.temperature);

            let response = self.complete(&request, ctx.chunks).await?;
            if let Some(step_usage) = response.usage {
                usage += step_usage;
            }

            if response.has_tool_calls() && offer_tools {
                tool_rounds += 1;
                debug!(agent = %name, calls = response.tool_calls.len(), round = tool_rounds, "model requested tools");

                messages.push(Message::tool_call(&name, response.tool_calls.clone()));
                let (results, handoff) = self.run_tools(&response.tool_calls).await;

                prompt.push(ChatMessage::assistant_tool_calls(response.tool_calls.clone()));
                for result in &results {
                    prompt.push(ChatMessage::tool(&result.call_id, result.render()));
                }
                messages.push(Message::tool_result(&name, results));

                if let Some((target, text)) = handoff {
                    messages.push(Message::handoff(&name, target, text).with_usage(usage));
                    return Ok(AgentReply::new(messages));
                }
                continue;
            }

            let content = response.content;
            let Some(schema) = output_schema else {
                messages.push(Message::text(&name, content).with_usage(usage));
                return Ok(AgentReply::new(messages));
            };

            match parse_structured(&content).and_then(|value| {
                validate_value(&name, schema, &value)?;
                Ok(value)
            }) {
                Ok(value) => {
                    messages.push(Message::structured(&name, value).with_usage(usage));
                    return Ok(AgentReply::new(messages));
                }
                Err(e) if !schema_retry_used => {
                    schema_retry_used = true;
                    debug!(agent = %name, error = %e, "structured output rejected, retrying");
                    prompt.push(ChatMessage::assistant(content));
                    prompt.push(ChatMessage::user(format!(
                        "Your reply did not match the required JSON schema: {}. Reply again with JSON only.",
                        e
                    )));
                }
                Err(e) => {
                    warn!(agent = %name, error = %e, "structured output invalid, returning text");
                    messages.push(Message::text(&name, content).with_usage(usage));
                    return Ok(AgentReply::new(messages));
                }
            }
        }
    }
}

/// Split the readiness marker off a plan
///
/// A plan without a marker counts as ready.
fn split_plan(reply: &str) -> (String, bool) {
    let trimmed = reply.trim();
    let (body, last) = match trimmed.rsplit_once('\n') {
        Some((body, last)) => (body, last.trim()),
        None => ("", trimmed),
    };

    let last_upper = last.trim_matches(|c: char| !c.is_ascii_alphabetic()).to_ascii_uppercase();
    if last_upper == PLAN_NOT_READY {
        (body.trim_end().to_string(), false)
    } else if last_upper == PLAN_READY {
        (body.trim_end().to_string(), true)
    } else {
        (trimmed.to_string(), true)
    }
}

/// Parse a JSON reply, tolerating a surrounding markdown fence
fn parse_structured(content: &str) -> Result<Value> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);
    Ok(serde_json::from_str(body.trim())?)
}

/// Names in prompts may only contain letters, digits, '_' and '-'
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Conversation;
    use crate::memory::MemoryItem;
    use crate::models::ScriptedModel;
    use crate::tools::FnHandler;
    use crate::types::MessageKind;

    fn sum_registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                ToolSchema::new(
                    "sum",
                    "Add numbers",
                    json!({
                        "type": "object",
                        "properties": {"values": {"type": "array", "items": {"type": "integer"}}},
                        "required": ["values"]
                    }),
                ),
                Arc::new(FnHandler::new(|args: Value| async move {
                    let values: Vec<i64> = serde_json::from_value(args["values"].clone())?;
                    Ok::<_, AgentError>(json!(values.iter().sum::<i64>()))
                })),
            )
            .unwrap();
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_plain_reply() {
        let model = Arc::new(ScriptedModel::with_replies("m", ["Leaves drift down"]));
        let agent = ModelAgent::new(AgentDescriptor::new("primary", "You are a poet."), model.clone());

        let conv = Conversation::with_task(["primary"], "Write a haiku");
        let reply = agent.respond(&TurnContext::new(&conv)).await.unwrap();

        assert_eq!(reply.messages.len(), 1);
        assert_eq!(reply.messages[0].text_content(), "Leaves drift down");
        assert_eq!(reply.messages[0].source, "primary");

        let request = &model.requests()[0];
        assert_eq!(request.messages[0].content, "You are a poet.");
        assert_eq!(request.messages[1].content, "Write a haiku");
    }

    #[tokio::test]
    async fn test_tool_loop_produces_call_and_result_messages() {
        let model = Arc::new(
            ScriptedModel::new("m")
                .then(ModelResponse::tool_calls(vec![ToolCallRequest::new(
                    "c1",
                    "sum",
                    json!({"values": [1, 2, 3]}),
                )]))
                .then(ModelResponse::text("The sum is 6").with_usage(Usage::new(5, 2))),
        );
        let agent = ModelAgent::new(
            AgentDescriptor::new("calc", "Use tools.").with_tools(["sum"]),
            model.clone(),
        )
        .with_registry(sum_registry())
        .unwrap();

        let conv = Conversation::with_task(["calc"], "Add 1, 2 and 3");
        let reply = agent.respond(&TurnContext::new(&conv)).await.unwrap();

        let kinds: Vec<MessageKind> = reply.messages.iter().map(|m| m.kind).collect();
        assert_eq!(kinds, vec![MessageKind::ToolCall, MessageKind::ToolResult, MessageKind::Plain]);
        assert_eq!(reply.messages[1].tool_results[0].output, "6");

        // The second request carries the tool exchange
        let second = &model.requests()[1];
        let tool_msg = second.messages.last().unwrap();
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("c1"));
        assert_eq!(tool_msg.content, "6");
    }

    #[tokio::test]
    async fn test_invalid_arguments_surface_as_error_result() {
        let model = Arc::new(
            ScriptedModel::new("m")
                .then(ModelResponse::tool_calls(vec![ToolCallRequest::new(
                    "c1",
                    "sum",
                    json!({"values": "three"}),
                )]))
                .then(ModelResponse::text("Sorry, let me fix that")),
        );
        let agent = ModelAgent::new(AgentDescriptor::new("calc", "").with_tools(["sum"]), model)
            .with_registry(sum_registry())
            .unwrap();

        let conv = Conversation::with_task(["calc"], "Add things");
        let reply = agent.respond(&TurnContext::new(&conv)).await.unwrap();

        let result = &reply.messages[1].tool_results[0];
        assert!(!result.success);
        assert!(result.render().starts_with("Error:"));
        assert_eq!(reply.final_message().unwrap().text_content(), "Sorry, let me fix that");
    }

    #[tokio::test]
    async fn test_tool_not_allowed_for_agent() {
        let model = Arc::new(
            ScriptedModel::new("m")
                .then(ModelResponse::tool_calls(vec![ToolCallRequest::new("c1", "sum", json!({"values": [1]}))]))
                .then(ModelResponse::text("ok")),
        );
        let agent = ModelAgent::new(AgentDescriptor::new("plain", ""), model)
            .with_registry(sum_registry())
            .unwrap();

        let conv = Conversation::with_task(["plain"], "task");
        let reply = agent.respond(&TurnContext::new(&conv)).await.unwrap();
        assert!(!reply.messages[1].tool_results[0].success);
    }

    #[tokio::test]
    async fn test_handoff_call_produces_handoff_message() {
        let model = Arc::new(ScriptedModel::new("m").then(ModelResponse::tool_calls(vec![
            ToolCallRequest::new("c1", "transfer_to_Bob", json!({})),
        ])));
        let agent = ModelAgent::new(
            AgentDescriptor::new("Alice", "Transfer to Bob.").with_handoffs(["Bob"]),
            model.clone(),
        );

        let conv = Conversation::with_task(["Alice", "Bob"], "What is Bob's birthday?");
        let reply = agent.respond(&TurnContext::new(&conv)).await.unwrap();

        let last = reply.final_message().unwrap();
        assert_eq!(last.kind, MessageKind::Handoff);
        assert_eq!(last.handoff_target.as_deref(), Some("Bob"));
        assert_eq!(model.requests()[0].tools[0].name, "transfer_to_Bob");
    }

    #[tokio::test]
    async fn test_tool_iterations_are_bounded() {
        let looping = ModelResponse::tool_calls(vec![ToolCallRequest::new("c", "sum", json!({"values": [1]}))]);
        let model = Arc::new(
            ScriptedModel::new("m")
                .then(looping.clone())
                .then(looping.clone())
                .then(ModelResponse::text("giving up")),
        );
        let agent = ModelAgent::new(AgentDescriptor::new("calc", "").with_tools(["sum"]), model.clone())
            .with_registry(sum_registry())
            .unwrap()
            .with_max_tool_iterations(2);

        let conv = Conversation::with_task(["calc"], "loop");
        let reply = agent.respond(&TurnContext::new(&conv)).await.unwrap();

        assert_eq!(reply.final_message().unwrap().text_content(), "giving up");
        assert!(model.requests()[2].tools.is_empty());
    }

    #[tokio::test]
    async fn test_structured_output_validated() {
        let schema = json!({
            "type": "object",
            "properties": {"response": {"enum": ["happy", "sad", "neutral"]}},
            "required": ["response"]
        });
        let model = Arc::new(
            ScriptedModel::new("m")
                .then(ModelResponse::text("I feel great"))
                .then(ModelResponse::text("```json\n{\"response\": \"happy\"}\n```")),
        );
        let agent = ModelAgent::new(
            AgentDescriptor::new("classifier", "Categorize.").with_output_schema(schema),
            model.clone(),
        );

        let conv = Conversation::with_task(["classifier"], "I am happy.");
        let reply = agent.respond(&TurnContext::new(&conv)).await.unwrap();

        let value = reply.messages[0].content.as_structured().unwrap();
        assert_eq!(value["response"], "happy");
        assert_eq!(model.call_count(), 2);
        assert!(model.requests()[0].response_schema.is_some());
    }

    #[tokio::test]
    async fn test_structured_output_falls_back_to_text() {
        let model = Arc::new(ScriptedModel::with_replies("m", ["nope", "still nope"]));
        let agent = ModelAgent::new(
            AgentDescriptor::new("classifier", "").with_output_schema(json!({"type": "object"})),
            model,
        );

        let conv = Conversation::with_task(["classifier"], "task");
        let reply = agent.respond(&TurnContext::new(&conv)).await.unwrap();
        assert_eq!(reply.messages[0].text_content(), "still nope");
    }

    #[tokio::test]
    async fn test_memory_and_instruction_in_system_prompt() {
        let model = Arc::new(ScriptedModel::with_replies("m", ["21 degrees"]));
        let agent = ModelAgent::new(AgentDescriptor::new("assistant", "You are helpful."), model.clone());

        let conv = Conversation::with_task(["assistant"], "Weather in New York?");
        let memory = vec![MemoryItem::new("The weather should be in metric units")];
        let ctx = TurnContext::new(&conv)
            .with_memory(&memory)
            .with_instruction(Some("Answer in one line"));
        agent.respond(&ctx).await.unwrap();

        let system = &model.requests()[0].messages[0].content;
        assert!(system.contains("metric units"));
        assert!(system.contains("Answer in one line"));
    }

    #[tokio::test]
    async fn test_reasoning_refines_plan_until_ready() {
        let model = Arc::new(ScriptedModel::with_replies(
            "m",
            [
                "1. Read each message\nNOT READY",
                "1. Read each message\n2. Label its sentiment\nREADY",
                "great: positive\nslow: negative",
            ],
        ));
        let agent = ModelAgent::new(AgentDescriptor::new("analyst", "Classify feedback."), model.clone())
            .with_reasoning(2);

        let conv = Conversation::with_task(["analyst"], "Classify: great, slow");
        let reply = agent.respond(&TurnContext::new(&conv)).await.unwrap();

        assert_eq!(reply.messages.len(), 1);
        assert_eq!(reply.messages[0].text_content(), "great: positive\nslow: negative");

        let requests = model.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[1].messages.iter().any(|m| m.content.starts_with("Refine the plan")));
        assert_eq!(
            requests[2].messages[0].content,
            "Plan:\n1. Read each message\n2. Label its sentiment\n\nClassify feedback."
        );
        assert!(requests[2].messages.iter().all(|m| !m.content.contains("NOT READY")));
    }

    #[tokio::test]
    async fn test_reasoning_attempts_are_bounded() {
        let model = Arc::new(ScriptedModel::with_replies(
            "m",
            ["draft one\nNOT READY", "draft two\nNOT READY", "answer"],
        ));
        let agent = ModelAgent::new(AgentDescriptor::new("analyst", ""), model.clone()).with_reasoning(1);

        let conv = Conversation::with_task(["analyst"], "task");
        let reply = agent.respond(&TurnContext::new(&conv)).await.unwrap();

        assert_eq!(reply.messages[0].text_content(), "answer");
        assert_eq!(model.call_count(), 3);
        assert_eq!(model.requests()[2].messages[0].content, "Plan:\ndraft two");
    }

    #[tokio::test]
    async fn test_reply_streams_chunks() {
        let model = Arc::new(ScriptedModel::new("m").then_chunks(["Leaves ", "drift ", "down"]));
        let agent = ModelAgent::new(AgentDescriptor::new("poet", ""), model);

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let conv = Conversation::with_task(["poet"], "Write a haiku");
        let reply = agent
            .respond(&TurnContext::new(&conv).with_chunks(Some(&tx)))
            .await
            .unwrap();

        assert_eq!(reply.messages[0].text_content(), "Leaves drift down");
        let mut streamed = Vec::new();
        while let Ok(chunk) = rx.try_recv() {
            assert_eq!(chunk.agent, "poet");
            streamed.push(chunk.text);
        }
        assert_eq!(streamed, vec!["Leaves ", "drift ", "down"]);
    }

    #[test]
    fn test_split_plan_markers() {
        assert_eq!(split_plan("a\nb\nREADY"), ("a\nb".to_string(), true));
        assert_eq!(split_plan("a\n**Not ready.**"), ("a".to_string(), false));
        assert_eq!(split_plan("just a plan"), ("just a plan".to_string(), true));
    }

    #[test]
    fn test_unknown_registry_tool_rejected() {
        let model = Arc::new(ScriptedModel::new("m"));
        let result = ModelAgent::new(AgentDescriptor::new("a", "").with_tools(["missing"]), model)
            .with_registry(Arc::new(ToolRegistry::new()));
        assert!(matches!(result, Err(AgentError::UnknownTool(_))));
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("travel agent!"), "travel_agent_");
        assert_eq!(sanitize_name("flights_refunder"), "flights_refunder");
    }

    #[test]
    fn test_parse_structured_fence() {
        assert_eq!(parse_structured("```json\n{\"a\": 1}\n```").unwrap(), json!({"a": 1}));
        assert!(parse_structured("not json").is_err());
    }
}
