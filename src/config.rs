//! Configuration file and per-run settings
//!
//! `~/.crewchat/config.toml` holds the model endpoint, run limits and an
//! optional team definition for the binary. Library users construct
//! [`RunConfig`] directly and hand it to the team; nothing is read from
//! global state during a run.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::client::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::selection::{DEFAULT_MAX_SELECTOR_ATTEMPTS, DEFAULT_MAX_STALLS};
use crate::agent::DEFAULT_MAX_TOOL_ITERATIONS;
use crate::termination::{
    Composite, HandoffTo, MaxMessages, SourceMatch, TerminationCondition, TextMention, Timeout,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub run: RunConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<TeamConfig>,
}

/// Model endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub base_url: String,
    pub model: String,

    /// Environment variable holding the API key
    pub api_key_env: Option<String>,
    pub temperature: Option<f32>,
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: None,
            temperature: None,
            timeout_secs: 300,
        }
    }
}

impl ModelConfig {
    /// API key read from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        self.api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// What happens when a human-proxy agent does not answer in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HumanTimeoutPolicy {
    /// The run ends with the timeout error
    #[default]
    FailRun,

    /// The turn is skipped and the loop continues
    SkipTurn,
}

/// Settings for a single team run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Hard limit on agent turns, on top of the team's termination condition
    pub max_turns: Option<usize>,

    /// Run stateless tool calls of one turn concurrently
    pub parallel_tool_calls: bool,
    pub max_selector_attempts: u32,
    pub max_stalls: u32,
    pub human_input_timeout_secs: Option<u64>,
    pub human_timeout_policy: HumanTimeoutPolicy,
    pub max_tool_iterations: usize,

    /// Forward model output to the event stream as it is generated
    pub stream_chunks: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_turns: None,
            parallel_tool_calls: true,
            max_selector_attempts: DEFAULT_MAX_SELECTOR_ATTEMPTS,
            max_stalls: DEFAULT_MAX_STALLS,
            human_input_timeout_secs: None,
            human_timeout_policy: HumanTimeoutPolicy::FailRun,
            max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
            stream_chunks: false,
        }
    }
}

impl RunConfig {
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    pub fn with_stream_chunks(mut self, stream_chunks: bool) -> Self {
        self.stream_chunks = stream_chunks;
        self
    }

    pub fn with_human_timeout_policy(mut self, policy: HumanTimeoutPolicy) -> Self {
        self.human_timeout_policy = policy;
        self
    }

    pub fn human_input_timeout(&self) -> Option<Duration> {
        self.human_input_timeout_secs.map(Duration::from_secs)
    }
}

/// How the configured team picks speakers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamMode {
    #[default]
    RoundRobin,

    /// Model-driven selection
    Selector,

    /// Handoff-driven selection
    Swarm,
    Orchestrator,
}

/// Team described in the config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamConfig {
    #[serde(default)]
    pub mode: TeamMode,

    #[serde(default)]
    pub termination: TerminationConfig,

    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

/// One agent of a configured team
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub system_message: String,

    #[serde(default)]
    pub handoffs: Vec<String>,

    /// Backed by console input instead of the model
    #[serde(default)]
    pub human: bool,

    /// Plan before each turn, refining the plan at most this many times
    #[serde(default)]
    pub max_reasoning_attempts: Option<usize>,
}

/// Termination settings; every configured condition is OR-combined
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TerminationConfig {
    pub text_mention: Option<String>,
    pub max_messages: Option<usize>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_match: Vec<String>,
    pub timeout_secs: Option<u64>,
    pub handoff_to: Option<String>,
}

impl TerminationConfig {
    /// Build the condition, `None` when nothing is configured
    pub fn build(&self) -> Option<Box<dyn TerminationCondition>> {
        let mut conditions: Vec<Box<dyn TerminationCondition>> = Vec::new();

        if let Some(marker) = &self.text_mention {
            conditions.push(Box::new(TextMention::new(marker.clone())));
        }
        if let Some(limit) = self.max_messages {
            conditions.push(Box::new(MaxMessages::new(limit)));
        }
        if !self.source_match.is_empty() {
            conditions.push(Box::new(SourceMatch::new(self.source_match.clone())));
        }
        if let Some(secs) = self.timeout_secs {
            conditions.push(Box::new(Timeout::new(Duration::from_secs(secs))));
        }
        if let Some(target) = &self.handoff_to {
            conditions.push(Box::new(HandoffTo::new(target.clone())));
        }

        match conditions.len() {
            0 => None,
            1 => conditions.pop(),
            _ => Some(Box::new(Composite::any(conditions))),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load from an explicit path, creating it with defaults if missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Config::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, toml_string).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;

        Ok(home.join(".crewchat").join("config.toml"))
    }
}
