//! Retry policy for transient failures within a cycle

use std::time::{Duration, Instant};

use backoff::ExponentialBackoff;
use backoff::ExponentialBackoffBuilder;
use backoff::backoff::Backoff;

use crate::{Error, Result};

/// Bounded exponential back-off.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per operation, including the first.
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    /// Jitter as a fraction of each delay, in `[0, 1]`.
    pub randomization_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(30),
            multiplier: 2.0,
            randomization_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    /// Remove jitter so delays are predictable.
    pub fn without_jitter(mut self) -> Self {
        self.randomization_factor = 0.0;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::config("max attempts must be at least 1"));
        }
        if self.multiplier < 1.0 {
            return Err(Error::config("back-off multiplier must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.randomization_factor) {
            return Err(Error::config("randomization factor must be within [0, 1]"));
        }
        if self.initial_interval > self.max_interval {
            return Err(Error::config("initial back-off exceeds maximum back-off"));
        }
        Ok(())
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_max_interval(self.max_interval)
            .with_multiplier(self.multiplier)
            .with_randomization_factor(self.randomization_factor)
            .with_max_elapsed_time(None)
            .build()
    }

    /// Start tracking attempts for one operation.
    pub fn schedule(&self, deadline: Option<Instant>) -> RetrySchedule {
        RetrySchedule {
            max_attempts: self.max_attempts,
            backoff: self.backoff(),
            attempt: 1,
            deadline,
        }
    }
}

/// Attempt counter for a single retried operation.
pub struct RetrySchedule {
    max_attempts: u32,
    backoff: ExponentialBackoff,
    attempt: u32,
    deadline: Option<Instant>,
}

impl RetrySchedule {
    /// The attempt currently running, starting at 1.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay before the next attempt, or `None` when attempts are exhausted
    /// or waiting would overrun the deadline.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        let delay = self.backoff.next_backoff()?;
        if let Some(deadline) = self.deadline
            && Instant::now() + delay >= deadline
        {
            return None;
        }
        self.attempt += 1;
        Some(delay)
    }
}
