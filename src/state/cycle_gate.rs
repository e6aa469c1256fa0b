//! Mutual exclusion for fetch cycles plus a coalescing trigger for follow-up runs.

use std::{
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    time::{Duration, SystemTime},
};

use tokio::sync::Notify;

use crate::state::item::epoch_millis;

/// Mutual-exclusion flag and trigger for fetch cycles.
///
/// Triggers are stored as a single [`Notify`] permit, so any number of requests made while a
/// cycle runs collapse into exactly one follow-up cycle.
#[derive(Debug, Default)]
pub struct CycleGate {
    running: AtomicBool,
    wake: Notify,
    last_completed_ms: AtomicU64,
    completed: AtomicU64,
}

/// Held while a cycle runs; clears the running flag when dropped.
#[derive(Debug)]
pub struct CycleGuard<'a> {
    gate: &'a CycleGate,
}

impl CycleGate {
    /// Create an idle gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for a cycle as soon as possible. Returns `true` when a cycle is in progress and the
    /// request was deferred until it completes.
    pub fn request(&self) -> bool {
        self.wake.notify_one();
        self.running.load(Ordering::SeqCst)
    }

    /// Wait for the next request (returns immediately if one is already pending).
    pub async fn requested(&self) {
        self.wake.notified().await;
    }

    /// Enter the cycle section, or `None` when another cycle already holds it.
    pub fn try_begin(&self) -> Option<CycleGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| CycleGuard { gate: self })
    }

    /// Whether a cycle is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Completion time of the last finished cycle.
    pub fn last_completed(&self) -> Option<SystemTime> {
        match self.last_completed_ms.load(Ordering::SeqCst) {
            0 => None,
            ms => Some(SystemTime::UNIX_EPOCH + Duration::from_millis(ms)),
        }
    }

    /// Number of cycles completed since start.
    pub fn completed_cycles(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }
}

impl CycleGuard<'_> {
    /// Record a successful completion; the running flag clears when the guard drops.
    pub fn complete(self, at: SystemTime) {
        self.gate
            .last_completed_ms
            .store(epoch_millis(at).max(1), Ordering::SeqCst);
        self.gate.completed.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.gate.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_cycle_at_a_time() {
        let gate = CycleGate::new();
        let guard = gate.try_begin().unwrap();
        assert!(gate.is_running());
        assert!(gate.try_begin().is_none());
        assert!(gate.request());

        guard.complete(SystemTime::UNIX_EPOCH + Duration::from_secs(5));
        assert!(!gate.is_running());
        assert_eq!(gate.completed_cycles(), 1);
        assert_eq!(
            gate.last_completed(),
            Some(SystemTime::UNIX_EPOCH + Duration::from_secs(5))
        );
        assert!(gate.try_begin().is_some());
    }

    #[tokio::test]
    async fn requests_coalesce_into_one_permit() {
        let gate = CycleGate::new();
        gate.request();
        gate.request();
        gate.request();

        gate.requested().await;
        let second = tokio::time::timeout(Duration::from_millis(20), gate.requested()).await;
        assert!(second.is_err());
    }
}
