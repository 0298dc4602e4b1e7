//! Exponential backoff with jitter
//!
//! Retries transient model failures such as rate limiting (429) or an
//! overloaded provider (5xx).

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use tracing::warn;

use crate::ai::model::ModelError;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Add up to one second of random jitter to each delay
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(32),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Many attempts with long waits, for providers with tight rate limits
    pub fn aggressive() -> Self {
        Self {
            max_retries: 8,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            jitter: true,
        }
    }

    /// Few attempts with short waits
    pub fn gentle() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter: true,
        }
    }

    /// Delay before retry number `attempt` (0-based), without jitter
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Named `RetryConfig`, selectable from configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryPreset {
    #[default]
    Default,
    Aggressive,
    Gentle,
}

impl RetryPreset {
    pub fn config(self) -> RetryConfig {
        match self {
            RetryPreset::Default => RetryConfig::default(),
            RetryPreset::Aggressive => RetryConfig::aggressive(),
            RetryPreset::Gentle => RetryConfig::gentle(),
        }
    }
}

/// Errors that may be worth retrying
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;

    /// Server-specified wait, if any
    fn retry_after(&self) -> Option<Duration>;
}

/// HTTP status codes that should trigger retry
pub const RETRYABLE_STATUS_CODES: &[u16] = &[429, 500, 502, 503, 504, 529];

pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUS_CODES.contains(&status)
}

impl IsRetryable for ModelError {
    fn is_retryable(&self) -> bool {
        match self {
            ModelError::Http { status, .. } => is_retryable_status(*status),
            ModelError::Stream(_) | ModelError::Other(_) => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            ModelError::Http { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or retries run out
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                let wait = e.retry_after().unwrap_or_else(|| config.delay_for(attempt));
                let wait = if config.jitter {
                    wait + Duration::from_millis(rand::thread_rng().gen_range(0..1000))
                } else {
                    wait
                };

                warn!(
                    attempt = attempt + 1,
                    max_retries = config.max_retries,
                    delay_ms = wait.as_millis() as u64,
                    "Retrying model call after error: {}",
                    e
                );

                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_status_codes() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(529));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(401));
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let config = RetryConfig {
            max_retries: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            jitter: false,
        };
        assert_eq!(config.delay_for(0), Duration::from_millis(100));
        assert_eq!(config.delay_for(1), Duration::from_millis(200));
        assert_eq!(config.delay_for(2), Duration::from_millis(350));
        assert_eq!(config.delay_for(40), Duration::from_millis(350));
    }

    #[test]
    fn test_model_error_classification() {
        let limited = ModelError::Http {
            status: 429,
            message: "slow down".into(),
            retry_after: Some(Duration::from_secs(3)),
        };
        assert!(limited.is_retryable());
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(3)));

        let stream = ModelError::Stream("bad".into());
        assert!(!stream.is_retryable());
    }

    #[test]
    fn test_presets_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            preset: RetryPreset,
        }
        let parsed: Wrapper = toml::from_str(r#"preset = "gentle""#).unwrap();
        assert_eq!(parsed.preset, RetryPreset::Gentle);
        assert_eq!(parsed.preset.config().max_retries, 3);
        assert_eq!(RetryPreset::Aggressive.config().max_retries, 8);
        assert_eq!(RetryPreset::default().config().max_retries, 5);
        assert!(toml::from_str::<Wrapper>(r#"preset = "eager""#).is_err());
    }
}
