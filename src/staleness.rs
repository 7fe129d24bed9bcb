//! Cluster staleness tracking.
//!
//! The tracker is a single freshness bit shared by every consolidation mode. Cluster state
//! clears it on every observed mutation; only a consolidation pass that found nothing to do
//! sets it again.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Source of the current time in seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// Clock advanced by hand. Used by the simulation (synced to simulation time) and by tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: AtomicU64::new(start.to_bits()),
        }
    }

    pub fn set(&self, time: f64) {
        self.now.store(time.to_bits(), Ordering::SeqCst);
    }

    pub fn advance(&self, delta: f64) {
        self.set(self.now() + delta);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.now.load(Ordering::SeqCst))
    }
}

/// Capability shared between the cluster state (writer) and consolidation modes (readers).
pub trait ConsolidationState: Send + Sync {
    /// Current freshness flag. Side-effect free.
    fn is_consolidated(&self) -> bool;

    /// Invalidates the flag. Called on every node or pod mutation, relevant or not.
    fn mark_unconsolidated(&self);

    /// Re-arms the flag after a pass that found nothing to do.
    fn mark_consolidated(&self);
}

pub struct StalenessTracker {
    consolidated: AtomicBool,
    /// Clock reading (f64 bits) of the last `mark_consolidated`.
    consolidated_at: AtomicU64,
    ttl: Option<f64>,
    clock: Arc<dyn Clock>,
}

impl StalenessTracker {
    /// Creates a tracker in the unconsolidated state: nothing is known about the cluster yet.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(ManualClock::default()), None)
    }

    /// Creates a tracker whose consolidated mark expires `ttl` seconds after it was set.
    pub fn with_clock(clock: Arc<dyn Clock>, ttl: Option<f64>) -> Self {
        Self {
            consolidated: AtomicBool::new(false),
            consolidated_at: AtomicU64::new(0.0f64.to_bits()),
            ttl,
            clock,
        }
    }

    /// Creates a tracker with an explicit initial flag.
    pub fn initialized(consolidated: bool) -> Self {
        let tracker = Self::new();
        if consolidated {
            tracker.mark_consolidated();
        }
        tracker
    }

    pub fn ttl(&self) -> Option<f64> {
        self.ttl
    }
}

impl Default for StalenessTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsolidationState for StalenessTracker {
    fn is_consolidated(&self) -> bool {
        if !self.consolidated.load(Ordering::SeqCst) {
            return false;
        }
        match self.ttl {
            Some(ttl) => {
                let marked_at = f64::from_bits(self.consolidated_at.load(Ordering::SeqCst));
                self.clock.now() - marked_at < ttl
            }
            None => true,
        }
    }

    fn mark_unconsolidated(&self) {
        self.consolidated.store(false, Ordering::SeqCst);
    }

    fn mark_consolidated(&self) {
        self.consolidated_at.store(self.clock.now().to_bits(), Ordering::SeqCst);
        self.consolidated.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_new_tracker_is_unconsolidated() {
        assert!(!StalenessTracker::new().is_consolidated());
        assert!(!StalenessTracker::initialized(false).is_consolidated());
        assert!(StalenessTracker::initialized(true).is_consolidated());
    }

    #[test]
    fn test_mark_unconsolidated_is_idempotent() {
        let tracker = StalenessTracker::initialized(true);
        tracker.mark_unconsolidated();
        assert!(!tracker.is_consolidated());
        tracker.mark_unconsolidated();
        tracker.mark_unconsolidated();
        assert!(!tracker.is_consolidated());

        tracker.mark_consolidated();
        assert!(tracker.is_consolidated());
        tracker.mark_unconsolidated();
        assert!(!tracker.is_consolidated());
    }

    #[test]
    fn test_consolidated_mark_expires_after_ttl() {
        let clock = Arc::new(ManualClock::new(100.0));
        let tracker = StalenessTracker::with_clock(clock.clone(), Some(300.0));
        tracker.mark_consolidated();
        assert!(tracker.is_consolidated());

        clock.advance(299.0);
        assert!(tracker.is_consolidated());
        clock.advance(1.0);
        assert!(!tracker.is_consolidated());

        tracker.mark_consolidated();
        assert!(tracker.is_consolidated());
    }

    #[test]
    fn test_concurrent_marks_leave_flag_unconsolidated() {
        let tracker = Arc::new(StalenessTracker::initialized(true));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = tracker.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        tracker.mark_unconsolidated();
                        let _ = tracker.is_consolidated();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(!tracker.is_consolidated());
    }
}
