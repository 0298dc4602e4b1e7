//! Incremental model output
//!
//! Models push `StreamPart`s through an unbounded channel; the supervisor
//! folds them into a finalized `ModelResponse` with `StreamAccumulator`.

use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::types::{AiToolCall, FinishReason, Message};

/// One event from a streaming model call
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPart {
    /// Stream opened
    Start { model: String },
    /// Incremental assistant text
    TextDelta { delta: String },
    /// A tool call began; arguments follow as deltas
    ToolCallStart { id: String, name: String },
    /// Raw JSON fragment of a tool call's arguments
    ToolCallDelta { id: String, delta: String },
    /// A fully parsed tool call
    ToolCallComplete { tool_call: AiToolCall },
    Finish { reason: FinishReason },
    /// Provider-side failure mid-stream
    Error { error: String },
}

/// Finalized model turn
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    pub message: Message,
    pub finish_reason: FinishReason,
}

impl ModelResponse {
    /// Tool calls requested by this turn (possibly none)
    pub fn tool_calls(&self) -> &[AiToolCall] {
        &self.message.tool_calls
    }
}

#[derive(Debug, Default)]
struct PartialToolCall {
    name: String,
    arguments: String,
}

/// Folds stream parts into a finalized response
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    text: String,
    tool_calls: Vec<AiToolCall>,
    /// Calls started but not completed, keyed by id, in start order
    partial: HashMap<String, PartialToolCall>,
    partial_order: Vec<String>,
    finish_reason: Option<FinishReason>,
    error: Option<String>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one part, returning the text delta it carried (if any)
    pub fn push(&mut self, part: StreamPart) -> Option<String> {
        match part {
            StreamPart::Start { model } => {
                debug!(model = %model, "Model stream started");
                None
            }
            StreamPart::TextDelta { delta } => {
                self.text.push_str(&delta);
                Some(delta)
            }
            StreamPart::ToolCallStart { id, name } => {
                debug!(id = %id, name = %name, "Tool call started");
                self.partial_order.push(id.clone());
                self.partial.insert(
                    id,
                    PartialToolCall {
                        name,
                        arguments: String::new(),
                    },
                );
                None
            }
            StreamPart::ToolCallDelta { id, delta } => {
                if let Some(call) = self.partial.get_mut(&id) {
                    call.arguments.push_str(&delta);
                } else {
                    warn!(id = %id, "Argument delta for unknown tool call");
                }
                None
            }
            StreamPart::ToolCallComplete { tool_call } => {
                self.partial.remove(&tool_call.id);
                self.partial_order.retain(|id| id != &tool_call.id);
                self.tool_calls.push(tool_call);
                None
            }
            StreamPart::Finish { reason } => {
                self.finish_reason = Some(reason);
                None
            }
            StreamPart::Error { error } => {
                self.error = Some(error);
                None
            }
        }
    }

    /// Provider error reported in-stream, if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Build the finalized assistant turn
    ///
    /// Calls that were started but never completed are parsed from their
    /// accumulated argument fragments; unparseable fragments become `{}`.
    pub fn finish(mut self) -> ModelResponse {
        for id in std::mem::take(&mut self.partial_order) {
            if let Some(call) = self.partial.remove(&id) {
                let arguments = if call.arguments.trim().is_empty() {
                    Value::Object(Default::default())
                } else {
                    serde_json::from_str(&call.arguments).unwrap_or_else(|e| {
                        warn!(id = %id, error = %e, "Unparseable tool call arguments");
                        Value::Object(Default::default())
                    })
                };
                self.tool_calls.push(AiToolCall::new(id, call.name, arguments));
            }
        }

        let finish_reason = self.finish_reason.unwrap_or(if self.tool_calls.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolCalls
        });

        ModelResponse {
            message: Message::assistant_with_tool_calls(self.text, self.tool_calls),
            finish_reason,
        }
    }
}
