//! Retry support for model calls
//!
//! The supervisor loop never retries on its own: a failed model call ends the
//! run. Callers that want retries wrap their model in `RetryingModel`.

mod backoff;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::model::{ChatModel, ModelError};
use super::streaming::StreamPart;
use super::types::{AiTool, Message};

pub use backoff::{is_retryable_status, with_retry, IsRetryable, RetryConfig, RetryPreset};

/// `ChatModel` decorator that retries opening the stream
///
/// Only the request is retried. Once a stream is open its parts are passed
/// through untouched.
pub struct RetryingModel<M> {
    inner: M,
    config: RetryConfig,
}

impl<M: ChatModel> RetryingModel<M> {
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            config: RetryConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RetryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }
}

#[async_trait]
impl<M: ChatModel> ChatModel for RetryingModel<M> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn supports_tool_calls(&self) -> bool {
        self.inner.supports_tool_calls()
    }

    async fn stream_with_tools(
        &self,
        messages: &[Message],
        tools: &[AiTool],
    ) -> Result<mpsc::UnboundedReceiver<StreamPart>, ModelError> {
        with_retry(&self.config, || self.inner.stream_with_tools(messages, tools)).await
    }
}
