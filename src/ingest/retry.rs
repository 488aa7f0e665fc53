use anyhow::{Result, anyhow};
use std::time::Duration;
use tracing::warn;

use super::store::ErrorClass;
use crate::config::RetryConfig;

/// Bounded exponential backoff for store writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Wait before the first retry.
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
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
        }
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// attempt budget is spent.
///
/// Rate-limited failures wait `base_delay`, then twice that, and so on.
/// Any other failure is returned as-is on the spot. Running out of
/// attempts is an error of its own that should stop the batch.
pub fn with_backoff<T>(
    policy: &RetryPolicy,
    what: &str,
    mut op: impl FnMut() -> Result<T>,
    classify: impl Fn(&anyhow::Error) -> ErrorClass,
    sleep: &mut dyn FnMut(Duration),
) -> Result<T> {
    let mut delay = policy.base_delay;

    for attempt in 1..=policy.max_attempts {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) => {
                if classify(&err) != ErrorClass::RateLimited {
                    return Err(err);
                }
                if attempt == policy.max_attempts {
                    return Err(err.context(format!(
                        "Max retries exceeded for {} after {} attempts",
                        what, policy.max_attempts
                    )));
                }
                warn!(
                    "{} rate limited; retrying in {:.1}s (attempt {}/{})",
                    what,
                    delay.as_secs_f32(),
                    attempt,
                    policy.max_attempts
                );
                sleep(delay);
                delay = delay.saturating_mul(2);
            }
        }
    }

    Err(anyhow!("Max retries exceeded for {}", what))
}
