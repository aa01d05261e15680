//! What to do when a bulletin-board round cannot complete

use std::sync::atomic::{AtomicUsize, Ordering};

use super::async_trait;
use crate::PartyIndex;

/// Decides between another attempt and halting without output
#[async_trait]
pub trait OperatorDecision: Send + Sync {
    /// Called when too few signatures on the message under `label` were
    /// collected; `missing` lists the parties whose signature is absent.
    /// Returns true to retry.
    async fn retry(&self, label: &str, missing: &[PartyIndex]) -> bool;
}

/// Never retry
#[derive(Debug, Default, Clone, Copy)]
pub struct HaltOnFailure;

#[async_trait]
impl OperatorDecision for HaltOnFailure {
    async fn retry(&self, _label: &str, _missing: &[PartyIndex]) -> bool {
        false
    }
}

/// Retry a fixed number of times over the lifetime of the board, then halt
#[derive(Debug)]
pub struct RetryTimes {
    left: AtomicUsize,
}

impl RetryTimes {
    pub fn new(times: usize) -> Self {
        Self {
            left: AtomicUsize::new(times),
        }
    }
}

#[async_trait]
impl OperatorDecision for RetryTimes {
    async fn retry(&self, _label: &str, _missing: &[PartyIndex]) -> bool {
        self.left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_retry_times_runs_out() {
        let operator = RetryTimes::new(2);
        assert!(operator.retry("x", &[2]).await);
        assert!(operator.retry("x", &[2]).await);
        assert!(!operator.retry("x", &[2]).await);
        assert!(!HaltOnFailure.retry("x", &[]).await);
    }
}
