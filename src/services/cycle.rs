//! Fetch-cycle driver: one cycle at a time, triggered by the interval ticker, registry
//! changes, source recovery and the REST trigger.

use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::{services::sync_service, state::SharedState};

/// Summary of one completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Ids fetched during the cycle.
    pub tracked: usize,
    /// Items whose state was refreshed.
    pub refreshed: usize,
    /// Items that kept their previous state because the fetch failed.
    pub failed: usize,
    /// States dropped because their id left the tracked set mid-cycle.
    pub dropped: usize,
    /// Wall time spent in the cycle.
    pub elapsed: Duration,
}

/// Run one cycle now.
///
/// Returns `None` when the source is degraded or another cycle holds the gate; in the latter
/// case a follow-up cycle is requested so the caller's changes are picked up afterwards.
pub async fn run_once(state: &SharedState) -> Option<CycleReport> {
    if state.is_degraded() {
        info!("item source degraded; skipping fetch cycle");
        return None;
    }

    let Some(guard) = state.cycle_gate().try_begin() else {
        debug!("fetch cycle already running; deferring");
        state.cycle_gate().request();
        return None;
    };

    let started = tokio::time::Instant::now();
    let now = state.clock().now();
    let expired = state.cache().sweep_expired(now);
    let forgotten = state.registry().sweep_tombstones(now).await;
    let idle = sync_service::expire_idle_pollers(state, now).await;
    if expired > 0 || forgotten > 0 || idle > 0 {
        debug!(expired, forgotten, idle, "swept cache entries, tombstones and idle pollers");
    }

    let tracked = state.registry().snapshot().await;
    let results = state.orchestrator().run_cycle(&tracked).await;

    let mut failed = 0;
    for (item_id, result) in &results {
        if let Err(err) = result {
            failed += 1;
            warn!(item_id = %item_id, error = %err, "fetch failed; keeping previous state");
        }
    }

    // Ids removed while their fetch was in flight may have been cached or stored again.
    let current = state.registry().snapshot().await;
    let dropped = state.items().retain_tracked(&current).await;
    for item_id in tracked.iter().filter(|id| !current.contains(id)) {
        state.cache().invalidate(item_id);
    }

    guard.complete(state.clock().now());
    sync_service::broadcast_items(state).await;

    let report = CycleReport {
        tracked: tracked.len(),
        refreshed: results.len() - failed,
        failed,
        dropped: dropped.len(),
        elapsed: started.elapsed(),
    };
    info!(
        tracked = report.tracked,
        refreshed = report.refreshed,
        failed = report.failed,
        dropped = report.dropped,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "fetch cycle completed"
    );
    Some(report)
}

/// Drive cycles forever, running one per coalesced request.
pub async fn run(state: SharedState) {
    loop {
        state.cycle_gate().requested().await;
        run_once(&state).await;
    }
}

/// Request a cycle every configured interval.
pub async fn tick(state: SharedState) {
    let mut ticker = interval(state.config().cycle_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if state.cycle_gate().request() {
            debug!("cycle still running at tick; follow-up queued");
        }
    }
}
