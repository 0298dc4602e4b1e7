//! Error taxonomy
//!
//! Setup errors are fatal and raised while building a supervisor. Per-call
//! tool and handoff problems never show up here: they become tool messages
//! the model can react to. Collaborator failures (model, sub-agent) end the
//! current run as `SupervisorError`.

use thiserror::Error;

use crate::ai::model::ModelError;

/// Invalid supervisor construction
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Duplicate tool or agent name found: {0}. Names must be unique.")]
    DuplicateName(String),

    #[error("At least one agent or tool must be provided")]
    NoAgentsOrTools,

    #[error("Supervisor only supports tool-calling models ({0} does not support tool calls)")]
    ModelLacksToolCalling(String),

    #[error("output_mode must be either 'full_history' or 'last_message', got '{0}'")]
    InvalidOutputMode(String),

    #[error("no model configured")]
    MissingModel,

    #[error("agent name '{0}' is empty after normalization")]
    InvalidAgentName(String),
}

/// Failure that ends a supervisor run
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("model call failed: {0}")]
    Model(#[from] ModelError),

    #[error("agent {agent} failed: {source}")]
    Agent {
        agent: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("iteration limit of {0} model calls reached without a final answer")]
    IterationLimit(usize),
}

/// Invalid configuration file or value
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Setup(#[from] SetupError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_error_messages() {
        assert_eq!(
            SetupError::NoAgentsOrTools.to_string(),
            "At least one agent or tool must be provided"
        );
        assert!(SetupError::DuplicateName("search".into())
            .to_string()
            .contains("search"));
    }

    #[test]
    fn test_agent_error_keeps_source() {
        let err = SupervisorError::Agent {
            agent: "researcher".into(),
            source: anyhow::anyhow!("network down"),
        };
        assert_eq!(err.to_string(), "agent researcher failed: network down");
        assert!(std::error::Error::source(&err).is_some());
    }
}
