use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use crate::{
    services::{retry::RetryPolicy, sse_events},
    source::FetchError,
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Probe the item source forever, keeping the shared state in degraded mode while it is
/// unavailable.
pub async fn run(state: SharedState) {
    let backoff = RetryPolicy::exponential(u32::MAX, INITIAL_DELAY, MAX_DELAY);
    let mut failures = 0u32;

    loop {
        if probe_once(&state).await {
            failures = 0;
            sleep(state.config().source_health_interval).await;
        } else {
            failures = failures.saturating_add(1);
            sleep(backoff.delay_after(failures)).await;
        }
    }
}

/// Run one health probe and apply the outcome; returns whether the source is healthy.
///
/// Leaving degraded mode requests an immediate cycle so items catch up without waiting for
/// the next tick.
pub async fn probe_once(state: &SharedState) -> bool {
    let outcome = match timeout(PROBE_TIMEOUT, state.source().health_check()).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Unavailable(format!(
            "health probe timed out after {}ms",
            PROBE_TIMEOUT.as_millis()
        ))),
    };

    match outcome {
        Ok(()) => {
            if state.update_degraded(false) {
                info!("item source healthy again; leaving degraded mode");
                sse_events::broadcast_system_status(state, false);
                state.cycle_gate().request();
            }
            true
        }
        Err(err) => {
            if state.update_degraded(true) {
                warn!(error = %err, "item source unavailable; entering degraded mode");
                sse_events::broadcast_system_status(state, true);
            } else {
                warn!(error = %err, "item source still unavailable");
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, source::scripted::shared_state};

    #[tokio::test]
    async fn failing_probe_enters_degraded_mode_once() {
        let (state, source, _clock) = shared_state(AppConfig::default());
        let mut display = state.sse().subscribe();
        source.set_healthy(false);

        assert!(!probe_once(&state).await);
        assert!(!probe_once(&state).await);

        assert!(state.is_degraded());
        let event = display.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some("system.status"));
        assert_eq!(event.data, r#"{"degraded":true}"#);
        assert!(display.try_recv().is_err());
    }

    #[tokio::test]
    async fn recovery_requests_a_cycle() {
        let (state, source, _clock) = shared_state(AppConfig::default());
        source.set_healthy(false);
        probe_once(&state).await;

        source.set_healthy(true);
        assert!(probe_once(&state).await);

        assert!(!state.is_degraded());
        let requested =
            tokio::time::timeout(Duration::from_millis(50), state.cycle_gate().requested()).await;
        assert!(requested.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn supervisor_loop_tracks_source_health() {
        let (state, source, _clock) = shared_state(AppConfig::default());
        source.set_healthy(false);
        let supervisor = tokio::spawn(run(state.clone()));

        sleep(Duration::from_millis(100)).await;
        assert!(state.is_degraded());

        source.set_healthy(true);
        sleep(MAX_DELAY * 2).await;
        assert!(!state.is_degraded());
        supervisor.abort();
    }
}
