//! Retry policy shared by every per-item attempt

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::infrastructure::config::{BackoffKind, SchedulerConfig};

/// Wait between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `attempt * base`
    Linear { base: Duration },
    /// `base * 2^(attempt - 1)`, capped, optionally jittered into `[d/2, d]`
    Exponential {
        base: Duration,
        cap: Duration,
        jitter: bool,
    },
}

impl Backoff {
    /// Wait after failed attempt number `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::Linear { base } => base.saturating_mul(attempt),
            Self::Exponential { base, cap, jitter } => {
                let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
                let delay = base.saturating_mul(factor).min(cap);
                if jitter {
                    let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                    Duration::from_millis(fastrand::u64(millis / 2..=millis))
                } else {
                    delay
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        let base = Duration::from_millis(config.backoff_base_ms);
        let backoff = match config.backoff {
            BackoffKind::Linear => Backoff::Linear { base },
            BackoffKind::Exponential => Backoff::Exponential {
                base,
                cap: Duration::from_millis(config.backoff_cap_ms),
                jitter: config.backoff_jitter,
            },
        };
        Self {
            max_retries: config.max_retries,
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Run `op` until it succeeds or the policy is exhausted.
///
/// `op` receives the 1-based attempt number. Returns the last result and the
/// number of attempts made.
pub async fn retry_with_policy<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> (Result<T, E>, u32)
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("Succeeded on attempt {}", attempt);
                }
                return (Ok(value), attempt);
            }
            Err(error) if attempt >= policy.max_attempts() => {
                warn!("❌ Giving up after {} attempts: {}", attempt, error);
                return (Err(error), attempt);
            }
            Err(error) => {
                let delay = policy.backoff.delay(attempt);
                warn!(
                    "🔄 Attempt {}/{} failed: {} (retrying in {:?})",
                    attempt,
                    policy.max_attempts(),
                    error,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
