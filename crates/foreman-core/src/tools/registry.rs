//! Registry of callable tools and delegate agents
//!
//! Built once per supervisor. Every agent gets a synthetic handoff tool, and
//! all names (tools and handoff tools) must be unique at construction time.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::handoff::{
    handoff_tool_definition, handoff_tool_name, normalize_agent_name, HANDOFF_TOOL_PREFIX,
};
use crate::agent::subagent::SubAgent;
use crate::ai::types::AiTool;
use crate::error::SetupError;

/// Failure raised by a tool implementation
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("{0}")]
    Failed(String),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("tool panicked: {0}")]
    Panicked(String),
}

impl From<anyhow::Error> for ToolError {
    fn from(err: anyhow::Error) -> Self {
        ToolError::Failed(err.to_string())
    }
}

/// Parse tool parameters into a typed struct
pub fn parse_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, ToolError> {
    serde_json::from_value(params).map_err(|e| ToolError::InvalidParameters(e.to_string()))
}

/// Trait for tool implementations
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (id)
    fn name(&self) -> &str;

    /// Tool description for the model
    fn description(&self) -> &str;

    /// JSON schema for parameters
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the model-supplied keyword arguments
    async fn execute(&self, params: Value) -> Result<String, ToolError>;
}

type ToolFn = dyn Fn(Value) -> BoxFuture<'static, Result<String, ToolError>> + Send + Sync;

/// Tool backed by a closure
pub struct FunctionTool {
    name: String,
    description: String,
    schema: Value,
    func: Box<ToolFn>,
}

impl FunctionTool {
    /// Wrap an async closure
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
        func: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            func: Box::new(move |params| Box::pin(func(params))),
        }
    }

    /// Wrap a synchronous closure
    pub fn sync<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
        func: F,
    ) -> Self
    where
        F: Fn(Value) -> Result<String, ToolError> + Send + Sync + 'static,
    {
        let func = Arc::new(func);
        Self::new(name, description, schema, move |params| {
            let func = func.clone();
            async move { func(params) }
        })
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.schema.clone()
    }

    async fn execute(&self, params: Value) -> Result<String, ToolError> {
        (self.func)(params).await
    }
}

/// Registered agent named by a handoff call
#[derive(Clone)]
pub struct HandoffTarget {
    /// Normalized agent name
    pub agent_key: String,
    pub agent: Arc<dyn SubAgent>,
}

/// What a call name refers to
#[derive(Clone)]
pub enum Resolution {
    Regular(Arc<dyn Tool>),
    Handoff(HandoffTarget),
    /// Handoff-shaped name with no agent registered behind it
    UnknownAgent(String),
    NotFound,
}

/// Fixed set of tools and agents for one supervisor
pub struct Registry {
    tools: Vec<Arc<dyn Tool>>,
    tools_by_name: HashMap<String, Arc<dyn Tool>>,
    agents: Vec<(String, Arc<dyn SubAgent>)>,
    agents_by_name: HashMap<String, Arc<dyn SubAgent>>,
    /// handoff tool name -> normalized agent name
    handoff_tools: HashMap<String, String>,
    ai_tools: Vec<AiTool>,
}

impl Registry {
    /// Validate and index tools and agents
    pub fn new(
        tools: Vec<Arc<dyn Tool>>,
        agents: Vec<Arc<dyn SubAgent>>,
    ) -> Result<Self, SetupError> {
        if tools.is_empty() && agents.is_empty() {
            return Err(SetupError::NoAgentsOrTools);
        }

        let mut agents_by_name = HashMap::new();
        let mut ordered_agents = Vec::with_capacity(agents.len());
        for agent in agents {
            let key = normalize_agent_name(agent.name());
            if key.is_empty() {
                return Err(SetupError::InvalidAgentName(agent.name().to_string()));
            }
            if agents_by_name.contains_key(&key) {
                return Err(SetupError::DuplicateName(key));
            }
            agents_by_name.insert(key.clone(), agent.clone());
            ordered_agents.push((key, agent));
        }

        let mut tools_by_name = HashMap::new();
        for tool in &tools {
            let name = tool.name().to_string();
            if tools_by_name.insert(name.clone(), tool.clone()).is_some() {
                return Err(SetupError::DuplicateName(name));
            }
        }

        let mut handoff_tools = HashMap::new();
        let mut ai_tools: Vec<AiTool> = tools
            .iter()
            .map(|t| AiTool {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.parameters_schema(),
            })
            .collect();

        for (key, agent) in &ordered_agents {
            let tool_name = handoff_tool_name(key);
            if tools_by_name.contains_key(&tool_name) {
                return Err(SetupError::DuplicateName(tool_name));
            }
            ai_tools.push(handoff_tool_definition(agent.as_ref(), &tool_name));
            handoff_tools.insert(tool_name, key.clone());
        }

        debug!(
            tools = tools.len(),
            agents = ordered_agents.len(),
            "Registry built"
        );

        Ok(Self {
            tools,
            tools_by_name,
            agents: ordered_agents,
            agents_by_name,
            handoff_tools,
            ai_tools,
        })
    }

    /// Resolve a call name
    ///
    /// Names carrying the handoff prefix that match no registered agent
    /// resolve to `UnknownAgent`, so the missing agent can be reported.
    pub fn resolve(&self, name: &str) -> Resolution {
        if let Some(tool) = self.tools_by_name.get(name) {
            return Resolution::Regular(tool.clone());
        }
        let handoff = self
            .handoff_tools
            .get(name)
            .and_then(|key| Some((key, self.agents_by_name.get(key)?)));
        if let Some((key, agent)) = handoff {
            return Resolution::Handoff(HandoffTarget {
                agent_key: key.clone(),
                agent: agent.clone(),
            });
        }
        if let Some(key) = name.strip_prefix(HANDOFF_TOOL_PREFIX) {
            return Resolution::UnknownAgent(key.to_string());
        }
        Resolution::NotFound
    }

    /// Regular tool by name
    pub fn tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools_by_name.get(name).cloned()
    }

    /// Agent by normalized name
    pub fn agent(&self, key: &str) -> Option<Arc<dyn SubAgent>> {
        self.agents_by_name.get(key).cloned()
    }

    /// Definitions for the model: regular tools, then handoff tools
    pub fn ai_tools(&self) -> &[AiTool] {
        &self.ai_tools
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Normalized agent names in registration order
    pub fn agent_names(&self) -> Vec<&str> {
        self.agents.iter().map(|(key, _)| key.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedAgent, StaticTool};
    use serde_json::json;

    fn tool(name: &str) -> Arc<dyn Tool> {
        Arc::new(StaticTool::new(name, "ok"))
    }

    fn agent(name: &str) -> Arc<dyn SubAgent> {
        Arc::new(ScriptedAgent::new(name))
    }

    #[test]
    fn test_empty_registry_rejected() {
        let result = Registry::new(vec![], vec![]);
        assert!(matches!(result, Err(SetupError::NoAgentsOrTools)));
    }

    #[test]
    fn test_duplicate_tool_names_rejected() {
        let result = Registry::new(vec![tool("search"), tool("search")], vec![]);
        assert!(matches!(result, Err(SetupError::DuplicateName(n)) if n == "search"));
    }

    #[test]
    fn test_agents_colliding_after_normalization_rejected() {
        let result = Registry::new(vec![], vec![agent("Math Expert"), agent("math_expert")]);
        assert!(matches!(result, Err(SetupError::DuplicateName(n)) if n == "math_expert"));
    }

    #[test]
    fn test_tool_colliding_with_handoff_tool_rejected() {
        let result = Registry::new(vec![tool("transfer_to_writer")], vec![agent("Writer")]);
        assert!(matches!(result, Err(SetupError::DuplicateName(n)) if n == "transfer_to_writer"));
    }

    #[test]
    fn test_blank_agent_name_rejected() {
        let result = Registry::new(vec![], vec![agent("   ")]);
        assert!(matches!(result, Err(SetupError::InvalidAgentName(_))));
    }

    #[test]
    fn test_resolve_variants() {
        let registry = Registry::new(vec![tool("search")], vec![agent("Research Agent")]).unwrap();

        assert!(matches!(registry.resolve("search"), Resolution::Regular(_)));
        match registry.resolve("transfer_to_research_agent") {
            Resolution::Handoff(target) => {
                assert_eq!(target.agent_key, "research_agent");
                assert_eq!(target.agent.name(), "Research Agent");
            }
            _ => panic!("expected handoff"),
        }
        match registry.resolve("transfer_to_nobody") {
            Resolution::UnknownAgent(key) => assert_eq!(key, "nobody"),
            _ => panic!("expected unknown agent"),
        }
        assert!(matches!(registry.resolve("send_email"), Resolution::NotFound));
    }

    #[test]
    fn test_ai_tools_lists_regular_then_handoff() {
        let registry = Registry::new(
            vec![tool("search"), tool("calc")],
            vec![agent("Writer"), agent("Critic")],
        )
        .unwrap();

        let names: Vec<&str> = registry.ai_tools().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["search", "calc", "transfer_to_writer", "transfer_to_critic"]
        );
        assert_eq!(registry.agent_names(), vec!["writer", "critic"]);
        assert_eq!(registry.tool_names(), vec!["search", "calc"]);
    }

    #[tokio::test]
    async fn test_function_tool_sync_and_async() {
        let upper = FunctionTool::sync("upper", "Uppercase", json!({}), |params| {
            let text: String = params
                .get("text")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ToolError::InvalidParameters("missing text".into()))?
                .to_string();
            Ok(text.to_uppercase())
        });
        assert_eq!(upper.execute(json!({"text": "hi"})).await.unwrap(), "HI");
        assert!(matches!(
            upper.execute(json!({})).await,
            Err(ToolError::InvalidParameters(_))
        ));

        let add = FunctionTool::new("add", "Add", json!({}), |params| async move {
            #[derive(serde::Deserialize)]
            struct Args {
                a: i64,
                b: i64,
            }
            let args: Args = parse_params(params)?;
            Ok((args.a + args.b).to_string())
        });
        assert_eq!(add.execute(json!({"a": 2, "b": 3})).await.unwrap(), "5");
    }
}
