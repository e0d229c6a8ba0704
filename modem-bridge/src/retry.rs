//! Retry policy used by the broker connect loop.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed,
    /// Delay multiplied by `factor` after each failure, capped at `max_delay`
    Exponential { factor: u32, max_delay: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
    /// `None` retries forever
    pub max_attempts: Option<u32>,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
            backoff: Backoff::Fixed,
        }
    }

    pub fn exponential(initial: Duration, factor: u32, max_delay: Duration) -> Self {
        Self {
            delay: initial,
            max_attempts: None,
            backoff: Backoff::Exponential { factor, max_delay },
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Delay before the next try after `attempt` (1-based) failed, `None` once exhausted.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if attempt >= max {
                return None;
            }
        }

        let delay = match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential { factor, max_delay } => {
                let exponent = attempt.saturating_sub(1);
                self.delay
                    .saturating_mul(factor.saturating_pow(exponent))
                    .min(max_delay)
            }
        };
        Some(delay)
    }
}

impl Default for RetryPolicy {
    /// Broker reconnect: every 5 seconds, forever
    fn default() -> Self {
        Self::fixed(Duration::from_secs(5))
    }
}
