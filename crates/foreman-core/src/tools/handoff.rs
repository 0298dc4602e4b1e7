//! Synthetic handoff tools
//!
//! Each agent is exposed to the model as a `transfer_to_<agent>` tool taking
//! a task and a reason.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use crate::agent::subagent::SubAgent;
use crate::ai::types::{AiTool, AiToolCall, Message};

/// Prefix of every agent handoff tool
pub const HANDOFF_TOOL_PREFIX: &str = "transfer_to_";

/// Prefix of the synthetic tool call recorded when control returns
pub const HANDOFF_BACK_TOOL_PREFIX: &str = "transfer_back_to_";

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Slug used for agent lookup and tool names
///
/// Trims, replaces every whitespace run with `_`, and lowercases:
/// `"Research  Agent"` becomes `"research_agent"`.
pub fn normalize_agent_name(name: &str) -> String {
    WHITESPACE.replace_all(name.trim(), "_").to_lowercase()
}

pub fn handoff_tool_name(agent_key: &str) -> String {
    format!("{}{}", HANDOFF_TOOL_PREFIX, agent_key)
}

/// Parameter schema shared by all handoff tools
pub fn handoff_parameters_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "task": {
                "type": "string",
                "description": "The task the agent should carry out"
            },
            "reason": {
                "type": "string",
                "description": "Why this agent is the right one for the task"
            }
        },
        "required": ["task", "reason"]
    })
}

/// Tool definition advertised to the model for `agent`
pub fn handoff_tool_definition(agent: &dyn SubAgent, tool_name: &str) -> AiTool {
    let description = match agent.description().trim() {
        "" => format!("Ask agent '{}' for help", agent.name()),
        desc => format!("Transfer control to agent '{}': {}", agent.name(), desc),
    };
    AiTool {
        name: tool_name.to_string(),
        description,
        input_schema: handoff_parameters_schema(),
    }
}

/// Arguments of a handoff call
///
/// Missing values are kept as `None` rather than rejected; the transfer
/// message reports them as-is. Non-string values are rendered as JSON.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandoffArgs {
    pub task: Option<String>,
    pub reason: Option<String>,
}

impl HandoffArgs {
    pub fn from_call(call: &AiToolCall) -> Self {
        Self {
            task: render_arg(call.arguments.get("task")),
            reason: render_arg(call.arguments.get("reason")),
        }
    }

    pub fn task_or_none(&self) -> &str {
        self.task.as_deref().unwrap_or("None")
    }

    pub fn reason_or_none(&self) -> &str {
        self.reason.as_deref().unwrap_or("None")
    }
}

fn render_arg(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Correlated result announcing a transfer
pub fn transfer_message(call: &AiToolCall, agent_name: &str, args: &HandoffArgs) -> Message {
    Message::tool_result(
        &call.id,
        &call.name,
        format!(
            "Successfully transferred to {} for task: {}, reason: {}",
            agent_name,
            args.task_or_none(),
            args.reason_or_none()
        ),
    )
}

/// Assistant/tool pair recording that control returned to the supervisor
pub fn create_handoff_back_messages(agent_name: &str, supervisor_name: &str) -> [Message; 2] {
    let call_id = uuid::Uuid::new_v4().to_string();
    let tool_name = format!(
        "{}{}",
        HANDOFF_BACK_TOOL_PREFIX,
        normalize_agent_name(supervisor_name)
    );

    let mut announce = Message::assistant_with_tool_calls(
        format!("Transferring back to {}", supervisor_name),
        vec![AiToolCall::new(&call_id, &tool_name, json!({}))],
    );
    announce.tool_name = Some(agent_name.to_string());

    let result = Message::tool_result(
        call_id,
        tool_name,
        format!("Successfully transferred back to {}", supervisor_name),
    );

    [announce, result]
}
