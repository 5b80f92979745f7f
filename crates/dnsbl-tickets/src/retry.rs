//! Retry policy for ticket-system calls.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::{Result, TicketError, RETRYABLE_STATUSES};

/// How failed ticket-system calls are retried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Wait before retry `n` is `delays[n]`; the last entry repeats
    pub delays: Vec<Duration>,

    /// HTTP statuses that trigger a retry
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delays: vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
            ],
            retryable_statuses: RETRYABLE_STATUSES.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// Create the default policy (3 retries, 2s/4s/8s)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Never retry
    #[must_use]
    pub fn none() -> Self {
        Self::default().max_retries(0)
    }

    /// Set maximum retries
    #[must_use]
    pub const fn max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// Set the delay schedule
    #[must_use]
    pub fn delays(mut self, delays: Vec<Duration>) -> Self {
        self.delays = delays;
        self
    }

    /// Same attempt budget, no waiting between attempts
    #[must_use]
    pub fn without_delays(self) -> Self {
        self.delays(Vec::new())
    }

    /// Whether a status code is worth retrying
    #[must_use]
    pub fn is_retryable(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }

    /// Delay before the retry following failed attempt `attempt` (0-based)
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let idx = usize::try_from(attempt).unwrap_or(usize::MAX);
        self.delays
            .get(idx)
            .or_else(|| self.delays.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    fn should_retry(&self, err: &TicketError) -> bool {
        matches!(err, TicketError::Api { status, .. } if self.is_retryable(*status))
    }

    /// Run `call` until it succeeds, fails with a non-retryable error, or
    /// the retry budget is spent.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if !self.should_retry(&e) => return Err(e),
                Err(e) if attempt >= self.max_retries => {
                    return Err(TicketError::RetriesExhausted {
                        attempts: attempt + 1,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation,
                        attempt = attempt + 1,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "retrying ticket call"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
