//! Deadline tracking for the receive loop

use std::time::{Duration, Instant};

/// Restartable deadline.
///
/// The transport arms one per logical receive and restarts it whenever
/// traffic arrives that should not count against the caller's wait, such as
/// events and fragment continuations.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    interval: Duration,
    started: Instant,
}

impl Timer {
    /// Create a timer that expires `interval` from now
    pub fn new(interval: Duration) -> Self {
        Timer {
            interval,
            started: Instant::now(),
        }
    }

    /// Configured interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Check if the timer has expired
    pub fn expired(&self) -> bool {
        self.started.elapsed() >= self.interval
    }

    /// Restart the full interval from now
    pub fn reset(&mut self) {
        self.started = Instant::now();
    }

    /// Time left before expiry, zero once expired
    pub fn remaining(&self) -> Duration {
        self.interval.saturating_sub(self.started.elapsed())
    }

    /// Time since the timer was last (re)started
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
