//! Retry coordination for provider calls.
//!
//! Wraps a single adapter call with a per-request timeout, bounded retries
//! with backoff for transient failures, and the courtesy delay that keeps a
//! run under the gateways' rate limits.

use super::provider::{EvalRequest, ProviderConfig, ProviderResponse, VisionProvider};
use crate::config::{BackoffStrategy, RunConfig};
use crate::error::{ProviderError, ProviderResult};
use std::time::Duration;

/// Ceiling on a single backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// How many times to try a request and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: BackoffStrategy,
}

impl RetryPolicy {
    pub fn from_config(run: &RunConfig) -> Self {
        Self {
            max_attempts: run.retry_attempts.max(1),
            base_delay: Duration::from_millis(run.retry_delay_ms),
            backoff: run.backoff,
        }
    }

    /// Wait after failed attempt number `attempt` (1-based).
    ///
    /// Linear: `base * attempt`. Exponential: `base * 2^(attempt - 1)`.
    /// Both are capped at 30 seconds.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let factor = match self.backoff {
            BackoffStrategy::Linear => attempt,
            BackoffStrategy::Exponential => 2u32.saturating_pow(attempt - 1),
        };
        self.base_delay.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RunConfig::default())
    }
}

/// Result of a coordinated call.
#[derive(Debug)]
pub struct Attempted {
    pub result: ProviderResult<ProviderResponse>,
    /// Attempts made, the first one included
    pub attempts: u32,
}

/// Drives one request through its attempts.
#[derive(Debug, Clone, Default)]
pub struct RetryCoordinator {
    policy: RetryPolicy,
}

impl RetryCoordinator {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Call the provider until it answers, fails terminally, or the attempt
    /// budget runs out.
    ///
    /// Only transient failures and timeouts are retried. Any normalized
    /// response is returned as is, whatever it contains. The inter-request
    /// delay is slept after every attempt that reached the provider.
    pub async fn call(
        &self,
        provider: &dyn VisionProvider,
        request: &EvalRequest,
        config: &ProviderConfig,
    ) -> Attempted {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let result =
                match tokio::time::timeout(config.request_timeout, provider.evaluate(request, config))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout {
                        timeout_ms: config.request_timeout.as_millis() as u64,
                    }),
                };

            if !config.inter_request_delay.is_zero() {
                tokio::time::sleep(config.inter_request_delay).await;
            }

            match result {
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.policy.backoff_delay(attempt);
                    tracing::warn!(
                        "{} attempt {attempt}/{max_attempts} failed: {e}. Retrying in {delay:?}",
                        provider.name()
                    );
                    tokio::time::sleep(delay).await;
                }
                result => {
                    if let Err(e) = &result {
                        tracing::debug!(
                            "{} gave up after {attempt} attempt(s): {e}",
                            provider.name()
                        );
                    }
                    return Attempted {
                        result,
                        attempts: attempt,
                    };
                }
            }
        }
    }
}
