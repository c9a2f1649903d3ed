//! Retry policy for provider calls: a plain value (attempts, backoff,
//! retryable-error predicate) built on the `backoff` crate's
//! `ExponentialBackoff`, passed to the one call site that needs it
//! (`ProviderClient::chat`) rather than hidden behind a decorator.

use std::time::Duration;

use backoff::{backoff::Backoff, ExponentialBackoff};

use crate::error::PipelineError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(16),
            multiplier: 2.0,
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            multiplier: self.multiplier,
            max_elapsed_time: Some(self.max_interval * self.max_attempts),
            ..Default::default()
        }
    }

    /// Runs `operation`, retrying on [`PipelineError::ProviderRetryable`]
    /// with exponential backoff, up to `max_attempts` total tries. Any
    /// other error, or exhaustion of the backoff schedule, is returned
    /// immediately (§4.G step 8, §5).
    pub async fn run<F, Fut, T>(&self, mut operation: F) -> Result<T, PipelineError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, PipelineError>>,
    {
        let mut backoff = self.backoff();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let call = tokio::time::timeout(self.request_timeout, operation());

            let outcome = match call.await {
                Ok(result) => result,
                Err(_elapsed) => Err(PipelineError::ProviderRetryable(format!(
                    "request timed out after {:?}",
                    self.request_timeout
                ))),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(PipelineError::ProviderRetryable(message)) => {
                    if attempt >= self.max_attempts {
                        return Err(PipelineError::ProviderRetryable(message));
                    }
                    match backoff.next_backoff() {
                        Some(delay) => tokio::time::sleep(delay).await,
                        None => return Err(PipelineError::ProviderRetryable(message)),
                    }
                }
                Err(other) => return Err(other),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn retries_until_success() {
        let policy = RetryPolicy {
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(2),
            ..Default::default()
        };
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result = policy
            .run(move || {
                let attempts = attempts_clone.clone();
                async move {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(PipelineError::ProviderRetryable("not yet".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let policy = RetryPolicy::default();
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<(), PipelineError> = policy
            .run(move || {
                let attempts = attempts_clone.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(PipelineError::ProviderFatal("bad request".to_string()))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
