//! Team assembly from configuration
//!
//! Turns the `[team]` section of the config file into a runnable [`Team`].
//! Used by the binary; the model and the human input source are passed in so
//! the same wiring runs against scripted collaborators in tests.

use crate::agent::{Agent, AgentDescriptor, HumanProxyAgent, ModelAgent};
use crate::config::{AgentConfig, Config, ModelConfig, TeamConfig, TeamMode, TerminationConfig};
use crate::errors::Result;
use crate::human::InputProvider;
use crate::models::{ChatModel, OpenAiClient};
use crate::team::Team;
use std::sync::Arc;
use tracing::info;

/// Team used when the config file defines none
pub fn default_team_config() -> TeamConfig {
    TeamConfig {
        mode: TeamMode::RoundRobin,
        termination: TerminationConfig {
            text_mention: Some("TERMINATE".to_string()),
            max_messages: Some(10),
            ..Default::default()
        },
        agents: vec![AgentConfig {
            name: "assistant".to_string(),
            description: Some("A helpful assistant.".to_string()),
            system_message: "You are a helpful assistant. Reply with TERMINATE when the task is done."
                .to_string(),
            ..Default::default()
        }],
    }
}

/// HTTP model client for the configured endpoint
pub fn build_model(config: &ModelConfig) -> Result<Arc<dyn ChatModel>> {
    let client = OpenAiClient::with_config(&config.base_url, &config.model, config.timeout())?
        .with_api_key(config.api_key());
    Ok(Arc::new(client))
}

fn build_agent(
    agent: &AgentConfig,
    config: &Config,
    model: &Arc<dyn ChatModel>,
    input: &Arc<dyn InputProvider>,
) -> Arc<dyn Agent> {
    if agent.human {
        let mut human = HumanProxyAgent::new(&agent.name, input.clone())
            .with_timeout(config.run.human_input_timeout());
        if let Some(description) = &agent.description {
            human = human.with_description(description);
        }
        return Arc::new(human);
    }

    let mut descriptor = AgentDescriptor::new(&agent.name, &agent.system_message)
        .with_handoffs(agent.handoffs.iter().cloned());
    if let Some(description) = &agent.description {
        descriptor = descriptor.with_description(description);
    }

    let mut model_agent = ModelAgent::new(descriptor, model.clone())
        .with_parallel_tool_calls(config.run.parallel_tool_calls)
        .with_max_tool_iterations(config.run.max_tool_iterations)
        .with_temperature(config.model.temperature);
    if let Some(attempts) = agent.max_reasoning_attempts {
        model_agent = model_agent.with_reasoning(attempts);
    }
    Arc::new(model_agent)
}

/// Build the configured team (or the default one)
pub fn build_team(
    config: &Config,
    model: Arc<dyn ChatModel>,
    input: Arc<dyn InputProvider>,
) -> Result<Team> {
    let team_config = config.team.clone().unwrap_or_else(default_team_config);

    let agents = team_config
        .agents
        .iter()
        .map(|agent| build_agent(agent, config, &model, &input));

    let builder = Team::builder()
        .agents(agents)
        .boxed_termination(team_config.termination.build())
        .config(config.run.clone());

    let builder = match team_config.mode {
        TeamMode::RoundRobin => builder.round_robin(),
        TeamMode::Selector => builder.model_selector(model.clone()),
        TeamMode::Swarm => builder.handoffs(),
        TeamMode::Orchestrator => builder.orchestrator(model.clone()),
    };

    let team = builder.build()?;
    info!(
        mode = ?team_config.mode,
        agents = team.roster().len(),
        "team assembled"
    );
    Ok(team)
}
