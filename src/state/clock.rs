//! Wall-clock abstraction so cache expiry, alerts and tombstones can be driven in tests.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, SystemTime},
};

use crate::state::item::epoch_millis;

/// Source of wall-clock time for expiry decisions.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> SystemTime;
}

/// Clock backed by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Manually driven clock with millisecond resolution.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    /// Start the clock at `start`.
    pub fn new(start: SystemTime) -> Self {
        Self {
            millis: AtomicU64::new(epoch_millis(start)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let step = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.millis.fetch_add(step, Ordering::SeqCst);
    }

    /// Jump to an absolute time.
    pub fn set(&self, to: SystemTime) {
        self.millis.store(epoch_millis(to), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_millis(self.millis.load(Ordering::SeqCst))
    }
}
