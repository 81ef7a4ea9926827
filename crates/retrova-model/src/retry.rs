use serde::{Deserialize, Serialize};

/// Bounded retries with capped exponential backoff.
///
/// The embedding path defaults to three retries and the completion path to
/// one; re-ranking is never retried (its failure degrades instead).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub backoff_base_ms: u64,
    /// Cap in milliseconds for the backoff delay.
    pub backoff_max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// The completion path's default: a single retry.
    pub fn single_retry() -> Self {
        Self {
            max_retries: 1,
            ..Self::default()
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Backoff delay for a given attempt (0-based), capped at the maximum.
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        self.backoff_base_ms
            .saturating_mul(2u64.saturating_pow(attempt))
            .min(self.backoff_max_ms)
    }

    /// Sleeps for the backoff delay of the given attempt.
    pub async fn backoff(&self, attempt: u32) {
        let delay = self.delay_ms(attempt);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
    }
}
