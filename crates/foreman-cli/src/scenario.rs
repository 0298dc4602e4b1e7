//! Scenario files
//!
//! A scenario wires a supervisor to scripted collaborators so a whole
//! conversation can be replayed from one TOML file:
//!
//! ```toml
//! input = "Write a haiku about rust"
//!
//! [supervisor]
//! output_mode = "last_message"
//!
//! [[tools]]
//! name = "search"
//! output = "rust: a reddish-brown iron oxide"
//!
//! [[agents]]
//! name = "Poet"
//! replies = ["Red flakes on iron..."]
//!
//! [[turns]]
//! [[turns.tool_calls]]
//! id = "h1"
//! name = "transfer_to_poet"
//! arguments = { task = "haiku", reason = "poetry" }
//!
//! [[turns]]
//! text = "Here is your haiku."
//! ```
//!
//! Model retries are opt-in with a `[retry]` table (`preset` is `default`,
//! `aggressive` or `gentle`; the other keys override it). `transient_failures`
//! makes the scripted model answer HTTP 503 that many times first.

use foreman_core::ai::{RetryConfig, RetryPreset, RetryingModel};
use foreman_core::testing::{FailingTool, ScriptedAgent, ScriptedModel, ScriptedTurn, StaticTool};
use foreman_core::{ChatModel, Message, SetupError, SubAgent, Supervisor, SupervisorConfig, Tool};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse scenario: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Setup(#[from] SetupError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub output: String,
    /// Fail every call with this message instead of returning `output`
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Assistant turns appended on every run
    #[serde(default)]
    pub replies: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RetrySpec {
    pub preset: RetryPreset,
    pub max_retries: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub jitter: Option<bool>,
}

impl RetrySpec {
    pub fn config(&self) -> RetryConfig {
        let mut config = self.preset.config();
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(ms) = self.initial_delay_ms {
            config.initial_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.max_delay_ms {
            config.max_delay = Duration::from_millis(ms);
        }
        if let Some(jitter) = self.jitter {
            config.jitter = jitter;
        }
        config
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub input: Option<String>,
    pub supervisor: SupervisorConfig,
    pub tools: Vec<ToolSpec>,
    pub agents: Vec<AgentSpec>,
    /// Model turns, replayed in order
    pub turns: Vec<ScriptedTurn>,
    /// Wrap the model in a retrying decorator
    pub retry: Option<RetrySpec>,
    pub transient_failures: u32,
}

impl Scenario {
    pub fn from_toml_str(s: &str) -> Result<Self, ScenarioError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Build the supervisor around a fresh scripted model
    pub fn build(&self) -> Result<Supervisor, ScenarioError> {
        let scripted =
            ScriptedModel::new(self.turns.clone()).with_transient_failures(self.transient_failures);
        let model: Arc<dyn ChatModel> = match &self.retry {
            Some(spec) => Arc::new(RetryingModel::new(scripted).with_config(spec.config())),
            None => Arc::new(scripted),
        };

        let tools: Vec<Arc<dyn Tool>> = self.tools.iter().map(build_tool).collect();
        let agents: Vec<Arc<dyn SubAgent>> = self.agents.iter().map(build_agent).collect();

        let supervisor = Supervisor::builder(model)
            .with_config(&self.supervisor)
            .tools(tools)
            .agents(agents)
            .build()?;
        Ok(supervisor)
    }
}

fn build_tool(spec: &ToolSpec) -> Arc<dyn Tool> {
    if let Some(error) = &spec.error {
        return Arc::new(FailingTool::new(&spec.name, error));
    }
    let tool = StaticTool::new(&spec.name, &spec.output);
    match &spec.description {
        Some(description) => Arc::new(tool.with_description(description)),
        None => Arc::new(tool),
    }
}

fn build_agent(spec: &AgentSpec) -> Arc<dyn SubAgent> {
    let mut agent = ScriptedAgent::new(&spec.name)
        .with_description(&spec.description)
        .with_replies(spec.replies.iter().map(Message::assistant).collect());
    if let Some(prompt) = &spec.system_prompt {
        agent = agent.with_system_prompt(prompt);
    }
    if let Some(error) = &spec.error {
        agent = agent.failing(error);
    }
    Arc::new(agent)
}
