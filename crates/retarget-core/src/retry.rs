//! Bounded polling with a fixed delay between attempts

use crate::clock::Clock;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Fixed-delay retry budget
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    delay: Duration,
    current_attempt: u32,
    max_attempts: u32,
}

/// Returned by [`retry_until`] when every attempt came back empty
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("gave up after {attempts} attempts")]
pub struct RetryExhausted {
    pub attempts: u32,
}

impl RetryStrategy {
    /// # Arguments
    /// * `delay` - Wait between two attempts
    /// * `max_attempts` - Number of attempts before giving up (at least one is always made)
    pub fn new(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            current_attempt: 0,
            max_attempts,
        }
    }

    /// Record a failed attempt and return the delay before the next one
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        self.current_attempt += 1;
        Some(self.delay)
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }

    /// Failed attempts recorded so far
    pub fn attempt_number(&self) -> u32 {
        self.current_attempt
    }

    pub fn is_exhausted(&self) -> bool {
        self.current_attempt >= self.max_attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Poll `operation` until it yields a value or the budget runs out
///
/// Each empty poll is followed by one `clock.sleep(delay)`, so a budget of
/// `n` attempts polls `n` times and waits `n` times in the worst case. The
/// strategy is reset on success and left exhausted on failure.
pub fn retry_until<F, T>(
    mut operation: F,
    strategy: &mut RetryStrategy,
    clock: &dyn Clock,
    operation_name: &str,
) -> Result<T, RetryExhausted>
where
    F: FnMut() -> Option<T>,
{
    let mut polls = 0u32;
    loop {
        polls += 1;
        if let Some(value) = operation() {
            if polls > 1 {
                debug!(
                    "[RETRY] {} succeeded after {} attempts",
                    operation_name, polls
                );
            }
            strategy.reset();
            return Ok(value);
        }

        match strategy.next_delay() {
            Some(delay) => clock.sleep(delay),
            None => break,
        }
        if strategy.is_exhausted() {
            break;
        }
    }

    warn!(
        "[RETRY] {} failed after {} attempts - giving up",
        operation_name, polls
    );
    Err(RetryExhausted { attempts: polls })
}
