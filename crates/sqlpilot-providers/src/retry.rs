//! Retry with exponential backoff for generation calls

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use sqlpilot_core::{CapabilitySet, GenerationError};

use crate::backend::{GenerationBackend, GenerationOutput};
use crate::message::ChatMessage;

/// Retry behavior configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first)
    pub max_attempts: u32,
    /// Initial retry interval
    pub initial_interval: Duration,
    /// Maximum retry interval
    pub max_interval: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_max_interval(self.max_interval)
            .with_multiplier(self.multiplier)
            .with_max_elapsed_time(None)
            .build()
    }
}

/// Whether an error is worth retrying.
pub fn is_transient(error: &GenerationError) -> bool {
    matches!(
        error,
        GenerationError::RateLimitExceeded
            | GenerationError::NetworkError(_)
            | GenerationError::Timeout(_)
    )
}

/// Run an operation with exponential backoff on transient errors.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, GenerationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GenerationError>>,
{
    let mut backoff = config.build_backoff();

    for attempt in 1..=config.max_attempts {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(operation = operation_name, attempt, "succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if is_transient(&e) && attempt < config.max_attempts => {
                let wait = backoff
                    .next_backoff()
                    .unwrap_or(config.initial_interval);
                warn!(
                    operation = operation_name,
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    error = %e,
                    "retrying after backoff"
                );
                tokio::time::sleep(wait).await;
            }
            Err(e) => {
                debug!(operation = operation_name, attempt, error = %e, "giving up");
                return Err(e);
            }
        }
    }

    unreachable!("retry loop always returns within max_attempts")
}

/// Backend wrapper that retries transient failures.
pub struct RetryBackend<B> {
    inner: B,
    config: RetryConfig,
}

impl<B> RetryBackend<B> {
    pub fn new(inner: B, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }
}

#[async_trait]
impl<B: GenerationBackend> GenerationBackend for RetryBackend<B> {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        capabilities: &CapabilitySet,
        temperature: f32,
    ) -> Result<GenerationOutput, GenerationError> {
        with_retry(&self.config, "generate", || {
            self.inner.generate(messages, capabilities, temperature)
        })
        .await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let config = RetryConfig::new(3)
            .with_initial_interval(Duration::from_millis(5))
            .with_max_interval(Duration::from_millis(20));

        let result: Result<u32, GenerationError> = with_retry(&config, "test", || {
            let attempts = attempts_clone.clone();
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(GenerationError::RateLimitExceeded)
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_auth_errors() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let config = RetryConfig::new(3);

        let result: Result<(), GenerationError> = with_retry(&config, "test", || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(GenerationError::AuthenticationFailed("bad key".into()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let config = RetryConfig::new(2).with_initial_interval(Duration::from_millis(1));

        let result: Result<(), GenerationError> = with_retry(&config, "test", || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(GenerationError::NetworkError("down".into()))
            }
        })
        .await;

        assert!(matches!(result, Err(GenerationError::NetworkError(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
