//! Local typing indicator debounce.
//!
//! DESIGN
//! ======
//! Pure state machine over `tokio::time::Instant`: the event loop feeds it
//! keystrokes and sleeps until `deadline()`. Each keystroke re-arms the hide
//! deadline from its own time, replacing the previous one.

#[cfg(test)]
#[path = "typing_test.rs"]
mod typing_test;

use std::time::Duration;

use tokio::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypingDebounce {
    timeout: Duration,
    deadline: Option<Instant>,
}

impl TypingDebounce {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout, deadline: None }
    }

    /// Register a keystroke at `now`; returns the new hide deadline.
    pub fn keystroke(&mut self, now: Instant) -> Instant {
        let deadline = now + self.timeout;
        self.deadline = Some(deadline);
        deadline
    }

    /// Hide if the deadline has passed. Returns `true` on the visible → hidden edge.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Hide immediately. Returns `true` if the indicator was visible.
    pub fn hide(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.deadline.is_some()
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}
