//! Scripted collaborators
//!
//! Deterministic stand-ins for a model, tools and sub-agents. Used by the
//! unit tests and by the CLI's scenario runner.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use tokio::sync::mpsc;

use crate::agent::subagent::{HandoffContext, SubAgent};
use crate::ai::model::{ChatModel, ModelError};
use crate::ai::streaming::StreamPart;
use crate::ai::types::{AiTool, AiToolCall, FinishReason, Message};
use crate::memory::Memory;
use crate::tools::registry::{Tool, ToolError};

/// One model turn to replay
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ScriptedTurn {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub tool_calls: Vec<AiToolCall>,
}

impl ScriptedTurn {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn calls(tool_calls: Vec<AiToolCall>) -> Self {
        Self {
            text: String::new(),
            tool_calls,
        }
    }
}

/// Model that replays queued turns
///
/// Text is streamed word by word, followed by one `ToolCallComplete` per
/// call. Querying past the end of the script is an error.
pub struct ScriptedModel {
    name: String,
    tool_calling: bool,
    /// HTTP 503 responses still owed before the script resumes
    transient_failures: AtomicU32,
    turns: Mutex<VecDeque<ScriptedTurn>>,
    seen_messages: Mutex<Vec<Vec<Message>>>,
    seen_tools: Mutex<Vec<Vec<String>>>,
}

impl ScriptedModel {
    pub fn new(turns: Vec<ScriptedTurn>) -> Self {
        Self {
            name: "scripted".to_string(),
            tool_calling: true,
            transient_failures: AtomicU32::new(0),
            turns: Mutex::new(turns.into()),
            seen_messages: Mutex::new(Vec::new()),
            seen_tools: Mutex::new(Vec::new()),
        }
    }

    pub fn without_tool_calls(mut self) -> Self {
        self.tool_calling = false;
        self
    }

    /// Fail the next `count` queries with a retryable HTTP 503
    pub fn with_transient_failures(self, count: u32) -> Self {
        self.transient_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Turns not yet replayed
    pub fn remaining(&self) -> usize {
        self.turns.lock().len()
    }

    /// Message lists of every query, in order
    pub fn seen_messages(&self) -> Vec<Vec<Message>> {
        self.seen_messages.lock().clone()
    }

    /// Tool names offered on every query, in order
    pub fn seen_tools(&self) -> Vec<Vec<String>> {
        self.seen_tools.lock().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_tool_calls(&self) -> bool {
        self.tool_calling
    }

    async fn stream_with_tools(
        &self,
        messages: &[Message],
        tools: &[AiTool],
    ) -> Result<mpsc::UnboundedReceiver<StreamPart>, ModelError> {
        if self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ModelError::Http {
                status: 503,
                message: "scripted outage".into(),
                retry_after: None,
            });
        }

        self.seen_messages.lock().push(messages.to_vec());
        self.seen_tools
            .lock()
            .push(tools.iter().map(|t| t.name.clone()).collect());

        let turn = self
            .turns
            .lock()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("scripted model has no turns left"))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(StreamPart::Start {
            model: self.name.clone(),
        });
        for word in turn.text.split_inclusive(' ') {
            let _ = tx.send(StreamPart::TextDelta {
                delta: word.to_string(),
            });
        }
        let reason = if turn.tool_calls.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolCalls
        };
        for tool_call in turn.tool_calls {
            let _ = tx.send(StreamPart::ToolCallComplete { tool_call });
        }
        let _ = tx.send(StreamPart::Finish { reason });
        Ok(rx)
    }
}

/// Tool that always returns the same output
pub struct StaticTool {
    name: String,
    description: String,
    output: String,
}

impl StaticTool {
    pub fn new(name: impl Into<String>, output: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            description: format!("Returns a fixed result for {}", name),
            name,
            output: output.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[async_trait]
impl Tool for StaticTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _params: Value) -> Result<String, ToolError> {
        Ok(self.output.clone())
    }
}

/// Tool that always fails
pub struct FailingTool {
    name: String,
    message: String,
}

impl FailingTool {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _params: Value) -> Result<String, ToolError> {
        Err(ToolError::Failed(self.message.clone()))
    }
}

/// Sub-agent that appends fixed replies to whatever memory it receives
pub struct ScriptedAgent {
    name: String,
    description: String,
    system_prompt: Option<String>,
    replies: Vec<Message>,
    failure: Option<String>,
    runs: AtomicUsize,
    seen: Mutex<Vec<Memory>>,
}

impl ScriptedAgent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            system_prompt: None,
            replies: Vec::new(),
            failure: None,
            runs: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_replies(mut self, replies: Vec<Message>) -> Self {
        self.replies = replies;
        self
    }

    /// Make every run fail with `message`
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// Memories received, in run order
    pub fn seen_memories(&self) -> Vec<Memory> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl SubAgent for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    async fn run(&self, _ctx: &HandoffContext, mut memory: Memory) -> anyhow::Result<Memory> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(memory.clone());
        if let Some(message) = &self.failure {
            anyhow::bail!("{}", message);
        }
        memory.extend(self.replies.iter().cloned());
        Ok(memory)
    }
}
