use std::time::Duration;

/// Bounded linear backoff: the delay before retry `n` is `base_delay * n`.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    max_attempts: usize,
    base_delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` includes the first try and is clamped to at least one.
    pub fn linear(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Policy allowing `max_retries` retries after the initial attempt.
    pub fn with_retries(max_retries: u32, base_delay: Duration) -> Self {
        Self::linear((max_retries as usize).saturating_add(1), base_delay)
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn handle(&self) -> RetryHandle {
        RetryHandle {
            policy: self.clone(),
            attempts: 0,
        }
    }

    fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let factor = u32::try_from(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

pub struct RetryHandle {
    policy: RetryPolicy,
    attempts: usize,
}

impl RetryHandle {
    /// Returns the delay to wait before the next retry, or `None` once the
    /// attempt budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts + 1 >= self.policy.max_attempts {
            return None;
        }
        let next = self.attempts + 1;
        self.attempts = next;
        Some(self.policy.delay_for_attempt(next))
    }

    /// Number of retries granted so far.
    pub fn attempts(&self) -> usize {
        self.attempts
    }
}
