//! Bounded retry policy shared by every publish-side call.

use std::future::Future;
use std::time::Duration;

use tokenlist_shared::{BackoffKind, Result, RetryConfig};
use tracing::{info, warn};

/// Upper bound for a single exponential delay.
const MAX_DELAY_MS: u64 = 30_000;

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub backoff: BackoffKind,
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub const NONE: RetryPolicy = RetryPolicy {
        max_attempts: 1,
        delay: Duration::ZERO,
        backoff: BackoffKind::Fixed,
    };

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            BackoffKind::Fixed => self.delay,
            BackoffKind::Exponential => {
                let factor = 2u64.saturating_pow(attempt.saturating_sub(1).min(16));
                let ms = (self.delay.as_millis() as u64).saturating_mul(factor);
                Duration::from_millis(ms.min(MAX_DELAY_MS))
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: Duration::from_millis(config.delay_ms),
            backoff: config.backoff,
        }
    }
}

/// Run `operation` until it succeeds, fails with a non-transient error, or the
/// policy runs out of attempts. The last error is returned.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(label, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if !e.is_transient() || attempt >= policy.max_attempts => {
                warn!(label, attempt, error = %e, "giving up");
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay_after(attempt);
                warn!(label, attempt, error = %e, ?delay, "attempt failed, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}
