//! Model capability consumed by the supervisor
//!
//! Provider plumbing lives outside this crate. A model only has to accept a
//! message list plus tool definitions and stream back `StreamPart`s.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use super::streaming::{ModelResponse, StreamAccumulator, StreamPart};
use super::types::{AiTool, Message};

/// Failure opening or consuming a model stream
#[derive(Debug, Error)]
pub enum ModelError {
    /// Provider answered with an HTTP error status
    #[error("model provider returned HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    },

    /// Provider reported an error inside the stream
    #[error("model stream failed: {0}")]
    Stream(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Tool-aware streaming chat model
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier, used for logging
    fn name(&self) -> &str;

    /// Whether the model can emit tool calls
    ///
    /// Supervisors refuse to build around a model that cannot.
    fn supports_tool_calls(&self) -> bool;

    /// Start a streaming completion over `messages` with `tools` available
    async fn stream_with_tools(
        &self,
        messages: &[Message],
        tools: &[AiTool],
    ) -> Result<mpsc::UnboundedReceiver<StreamPart>, ModelError>;
}

/// Drain a model stream into a finalized response
///
/// Every text delta is handed to `on_delta` as it arrives. The stream ends at
/// `Finish` or when the sender is dropped.
pub async fn collect_response<F>(
    mut rx: mpsc::UnboundedReceiver<StreamPart>,
    mut on_delta: F,
) -> Result<ModelResponse, ModelError>
where
    F: FnMut(&str),
{
    let mut acc = StreamAccumulator::new();

    while let Some(part) = rx.recv().await {
        let finished = matches!(part, StreamPart::Finish { .. });
        if let Some(delta) = acc.push(part) {
            on_delta(&delta);
        }
        if let Some(error) = acc.error() {
            return Err(ModelError::Stream(error.to_string()));
        }
        if finished {
            break;
        }
    }

    let response = acc.finish();
    debug!(
        chars = response.message.content.len(),
        tool_calls = response.tool_calls().len(),
        finish_reason = ?response.finish_reason,
        "Model response finalized"
    );
    Ok(response)
}
