//! Monotonic deadlines for bounded waiting

use std::time::Duration;
use tokio::time::Instant;

/// A deadline recorded at construction time.
///
/// Every blocking operation in this crate is bounded by a `Timer`.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    deadline: Instant,
}

impl Timer {
    /// Start a timer that expires after `duration`
    pub fn start(duration: Duration) -> Self {
        Self {
            deadline: Instant::now() + duration,
        }
    }

    /// Time left before the deadline, zero once it has passed
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// True iff no time remains
    pub fn expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// The absolute deadline
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}
