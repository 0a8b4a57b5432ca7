//! Bounded exponential backoff for rate-limited requests
//!
//! Only rate limiting is retried. The sleep after attempt `n` (counted from
//! zero) is `base_delay * 2^n`, so the defaults wait 1, 2, 4, 8 and 16
//! seconds. Running out of attempts is not an error: the caller gets `None`.

use super::SearchResult;
use crate::config::SearchConfig;
use crate::errors::SearchError;
use crate::metrics;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Retry parameters for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_secs(config.backoff_base_secs))
    }

    /// Sleep after the rate-limited attempt `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2_u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(1))
    }
}

/// What a single attempt produced
#[derive(Debug)]
pub enum AttemptOutcome<T> {
    /// Usable response
    Done(T),
    /// HTTP 429; sleep and try again
    RateLimited,
    /// Terminal failure; surfaced to the caller
    Failed(SearchError),
    /// Network-level failure; give up without a result
    Unreachable(String),
}

/// Drive `attempt` until it yields a response, a terminal failure, or the
/// attempts run out
pub async fn run_with_backoff<T, F, Fut>(policy: &RetryPolicy, mut attempt: F) -> SearchResult<Option<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = AttemptOutcome<T>>,
{
    for n in 0..policy.max_attempts {
        match attempt(n).await {
            AttemptOutcome::Done(value) => {
                metrics::record_search_request("success");
                return Ok(Some(value));
            }
            AttemptOutcome::RateLimited => {
                metrics::record_search_request("rate_limited");
                metrics::record_rate_limited();

                let delay = policy.delay_for(n);
                warn!(
                    attempt = n + 1,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limit hit, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            AttemptOutcome::Failed(err) => {
                metrics::record_search_request("error");
                error!(attempt = n + 1, error = %err, "Search request failed");
                return Err(err);
            }
            AttemptOutcome::Unreachable(reason) => {
                metrics::record_search_request("unreachable");
                error!(attempt = n + 1, reason = %reason, "Search request could not be completed");
                return Ok(None);
            }
        }
    }

    warn!(
        max_attempts = policy.max_attempts,
        "Rate limit retries exhausted, giving up"
    );
    Ok(None)
}
