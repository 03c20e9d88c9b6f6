//! Fixed-interval reconnect policy with a hard attempt cap.

#[cfg(test)]
#[path = "reconnect_test.rs"]
mod reconnect_test;

use std::time::Duration;

/// Decides whether another reconnect attempt is allowed and when.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl ReconnectPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, delay }
    }

    /// Delay before the next attempt, given how many retries the current
    /// streak has already used. `None` once the cap is reached.
    #[must_use]
    pub fn next_delay(&self, attempts_so_far: u32) -> Option<Duration> {
        (attempts_so_far < self.max_attempts).then_some(self.delay)
    }
}
