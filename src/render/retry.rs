//! Exponential backoff for page fetches.
//!
//! Detail pages fail transiently (slow responses, 5xx, a tab that crashed).
//! [`with_backoff`] re-runs an operation while its error is transient.
//!
//! # Backoff Strategy
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..=max_jitter)
//! ```

use std::future::Future;
use std::time::{Duration, Instant};

use rand::{rng, Rng};
use tokio::time::sleep;
use tracing::{error, warn};

use crate::error::RenderError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: usize,
    /// Delay before the first retry; doubles on each further attempt.
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_jitter: Duration,
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based), without jitter.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(16) as u32;
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }
}

/// Run `op` until it succeeds, fails permanently, or retries run out.
///
/// `op` receives the 0-based attempt number.
pub async fn with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    url: &str,
    mut op: F,
) -> Result<T, RenderError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, RenderError>>,
{
    let total_t0 = Instant::now();
    let mut attempt = 0usize;

    loop {
        let attempt_t0 = Instant::now();
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                let elapsed_ms_attempt = attempt_t0.elapsed().as_millis();
                let elapsed_ms_total = total_t0.elapsed().as_millis();

                if !e.is_transient() || attempt > policy.max_retries {
                    error!(
                        %url,
                        attempt,
                        max = policy.max_retries,
                        elapsed_ms_attempt,
                        elapsed_ms_total,
                        error = %e,
                        transient = e.is_transient(),
                        "Fetch failed; giving up"
                    );
                    return Err(e);
                }

                let jitter_ms: u64 = rng().random_range(0..=policy.max_jitter.as_millis() as u64);
                let delay = policy.backoff(attempt) + Duration::from_millis(jitter_ms);
                warn!(
                    %url,
                    attempt,
                    max = policy.max_retries,
                    elapsed_ms_attempt,
                    elapsed_ms_total,
                    ?delay,
                    error = %e,
                    "Fetch attempt failed; backing off"
                );
                sleep(delay).await;
            }
        }
    }
}
