//! Bounded exponential backoff for retryable loads

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Retry budget and backoff curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Cap on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (zero-based): `base * 2^attempt`, capped
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = 1u64 << attempt.min(16);
        let base_ms = self.base_delay.as_millis().min(u64::MAX as u128) as u64;
        let max_ms = self.max_delay.as_millis().min(u64::MAX as u128) as u64;
        Duration::from_millis(base_ms.saturating_mul(exp).min(max_ms.max(base_ms)))
    }

    /// Run `op` until it succeeds, fails permanently or the budget is spent.
    ///
    /// `op` receives the zero-based attempt number. Returns the final result
    /// and the number of attempts made.
    pub fn run<T, E, F>(&self, is_retryable: impl Fn(&E) -> bool, mut op: F) -> (Result<T, E>, u32)
    where
        E: std::fmt::Display,
        F: FnMut(u32) -> Result<T, E>,
    {
        let mut attempt = 0;
        loop {
            match op(attempt) {
                Err(err) if is_retryable(&err) && attempt < self.max_retries => {
                    let delay = self.backoff(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retryable failure, backing off"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                result => return (result, attempt + 1),
            }
        }
    }
}
