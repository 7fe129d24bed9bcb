//! Cancellation and deadline carried into command planning.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use crate::error::ConsolidationError;

/// Planning context. Clones share the cancellation flag.
#[derive(Clone, Debug, Default)]
pub struct PlanningContext {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl PlanningContext {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().child_with_timeout(timeout)
    }

    /// Context sharing this one's cancellation with a deadline no later than `timeout` from now.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        Self {
            cancelled: self.cancelled.clone(),
            deadline: Some(self.deadline.map_or(deadline, |current| current.min(deadline))),
        }
    }

    /// Applies an optional timeout, see `child_with_timeout`.
    pub fn child(&self, timeout: Option<Duration>) -> Self {
        match timeout {
            Some(timeout) => self.child_with_timeout(timeout),
            None => self.clone(),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns an error once the context is cancelled or past its deadline.
    pub fn check(&self) -> Result<(), ConsolidationError> {
        if self.is_cancelled() {
            return Err(ConsolidationError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(ConsolidationError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}
