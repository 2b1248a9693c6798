//! Rate-limit retry for text generation.
//!
//! Only the text flows in `script` use this. Image, speech, and video calls
//! surface rate limits directly.

use std::future::Future;
use std::time::Duration;

use storyreel_common::config::RetryConfig;
use storyreel_common::Pacer;

use crate::error::ProviderError;

/// Bounded linear back-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,

    /// Retry `n` (1-based) waits `n * base_delay`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay * retry
    }
}

/// Run `operation`, retrying while it fails with a rate-limit signal.
///
/// Non-rate-limit errors return immediately. When the bound is reached the
/// result is [`ProviderError::RateLimitExhausted`].
pub async fn retry_on_rate_limit<T, F, Fut>(
    policy: RetryPolicy,
    pacer: &dyn Pacer,
    mut operation: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut retries = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_rate_limited() => {
                if retries >= policy.max_retries {
                    tracing::warn!(attempts = retries + 1, "Giving up after repeated rate limiting");
                    return Err(ProviderError::RateLimitExhausted {
                        attempts: retries + 1,
                    });
                }
                retries += 1;
                let delay = policy.delay_for(retries);
                tracing::info!(
                    retry = retries,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limited, backing off"
                );
                pacer.pause(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
