//! Tool dispatch with a failure boundary
//!
//! Tools are untrusted collaborators. Whatever a tool does (returns an
//! error, hangs past the timeout, panics) the caller gets exactly one
//! correlated tool message per request, in request order.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

use super::registry::{Registry, ToolError};
use crate::agent::constants::timeouts;
use crate::ai::types::{AiToolCall, Message};

/// Why a single request produced an error message
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Tool {0} does not exist")]
    NotFound(String),

    #[error("Encountered error in tool call: {0}")]
    Tool(#[from] ToolError),
}

/// Executes regular tool calls against a registry
#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<Registry>,
    timeout: Option<Duration>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            timeout: Some(timeouts::TOOL_EXECUTION),
        }
    }

    /// Per-call timeout; `None` waits indefinitely
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Execute one request
    pub async fn dispatch_one(&self, call: &AiToolCall) -> Result<Message, DispatchError> {
        let tool = self
            .registry
            .tool(&call.name)
            .ok_or_else(|| DispatchError::NotFound(call.name.clone()))?;

        let start = Instant::now();
        let execution = AssertUnwindSafe(tool.execute(call.arguments.clone())).catch_unwind();

        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, execution).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(
                        tool = %call.name,
                        timeout_ms = limit.as_millis() as u64,
                        "Tool execution timed out"
                    );
                    return Err(ToolError::TimedOut(limit).into());
                }
            },
            None => execution.await,
        };

        let result = match outcome {
            Ok(result) => result,
            Err(panic) => Err(ToolError::Panicked(panic_message(panic.as_ref()))),
        };

        info!(
            tool = %call.name,
            call_id = %call.id,
            duration_ms = start.elapsed().as_millis() as u64,
            is_error = result.is_err(),
            "Tool executed"
        );

        let output = result?;
        Ok(Message::tool_result(&call.id, &call.name, output))
    }

    /// Execute a batch, folding every failure into its result message
    pub async fn dispatch(&self, calls: &[AiToolCall]) -> Vec<Message> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            let message = match self.dispatch_one(call).await {
                Ok(message) => message,
                Err(e) => {
                    warn!(tool = %call.name, call_id = %call.id, error = %e, "Tool call failed");
                    Message::tool_result(&call.id, &call.name, e.to_string())
                }
            };
            results.push(message);
        }
        results
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
