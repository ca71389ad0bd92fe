use std::time::Duration;

/// Attempt limit and linear backoff for uploads.
///
/// The wait after attempt `n` is `n * backoff_step`: 10 s, then 20 s with
/// the defaults. No wait follows the final attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Effective attempt limit; at least one attempt is always made.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_step.saturating_mul(attempt)
    }

    /// Sum of all waits when every attempt fails.
    pub fn total_backoff(&self) -> Duration {
        (1..self.attempts()).map(|n| self.delay_after(n)).sum()
    }
}
