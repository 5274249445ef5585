//! Bounded retry policy shared by handshake polling and send backpressure.

use std::future::Future;
use std::time::Duration;

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed,
    /// Adds `step` per attempt already made.
    Linear { step: Duration },
}

/// Max attempts, interval, backoff. Exhausting `max_attempts` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            backoff: Backoff::Fixed,
        }
    }

    pub fn with_linear_backoff(mut self, step: Duration) -> Self {
        self.backoff = Backoff::Linear { step };
        self
    }

    /// Delay to wait after the `attempt`-th failed try (zero based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Linear { step } => self.interval + step * attempt,
        }
    }

    /// Upper bound on the total time spent sleeping.
    pub fn ceiling(&self) -> Duration {
        (0..self.max_attempts).map(|attempt| self.delay(attempt)).sum()
    }

    /// Call `probe` until it yields a value, sleeping between tries.
    ///
    /// `Ok(None)` means every attempt came back empty. Errors from `probe`
    /// end the loop immediately.
    pub async fn poll<T, E, F, Fut>(&self, mut probe: F) -> Result<Option<T>, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        for attempt in 0..self.max_attempts {
            if let Some(value) = probe().await? {
                return Ok(Some(value));
            }
            tokio::time::sleep(self.delay(attempt)).await;
        }
        Ok(None)
    }
}
