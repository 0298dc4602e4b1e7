//! Supervisor configuration
//!
//! Loaded from TOML. Every field is optional; missing values fall back to the
//! builder defaults.
//!
//! ```toml
//! name = "supervisor"
//! system_prompt = ["You coordinate a small team.", "Be brief."]
//! output_mode = "last_message"
//! add_handoff_back_messages = true
//! max_iterations = 12
//! tool_timeout_secs = 30
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::agent::constants::{defaults, timeouts};
use crate::agent::handoff::OutputMode;
use crate::ai::types::Message;
use crate::error::ConfigError;

/// One or many system prompt texts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SystemPrompt {
    One(String),
    Many(Vec<String>),
}

impl SystemPrompt {
    /// System messages prepended to every model query
    pub fn into_messages(self) -> Vec<Message> {
        match self {
            SystemPrompt::One(text) => vec![Message::system(text)],
            SystemPrompt::Many(texts) => texts.into_iter().map(Message::system).collect(),
        }
    }
}

impl From<&str> for SystemPrompt {
    fn from(text: &str) -> Self {
        SystemPrompt::One(text.to_string())
    }
}

impl From<String> for SystemPrompt {
    fn from(text: String) -> Self {
        SystemPrompt::One(text)
    }
}

impl From<Vec<String>> for SystemPrompt {
    fn from(texts: Vec<String>) -> Self {
        SystemPrompt::Many(texts)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub name: String,
    pub description: String,
    /// `None` keeps the default prompt
    pub system_prompt: Option<SystemPrompt>,
    pub add_handoff_back_messages: bool,
    /// `full_history` or `last_message`
    pub output_mode: String,
    pub max_iterations: Option<usize>,
    /// Per tool call; 0 disables the timeout
    pub tool_timeout_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            name: defaults::SUPERVISOR_NAME.to_string(),
            description: String::new(),
            system_prompt: None,
            add_handoff_back_messages: defaults::ADD_HANDOFF_BACK_MESSAGES,
            output_mode: OutputMode::default().to_string(),
            max_iterations: None,
            tool_timeout_secs: timeouts::TOOL_EXECUTION.as_secs(),
        }
    }
}

impl SupervisorConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: SupervisorConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.output_mode()?;
        Ok(())
    }

    pub fn output_mode(&self) -> Result<OutputMode, ConfigError> {
        Ok(self.output_mode.parse::<OutputMode>()?)
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        match self.tool_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}
