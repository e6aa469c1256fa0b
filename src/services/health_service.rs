use crate::{
    dto::{format_system_time, health::HealthResponse},
    state::SharedState,
};

/// Snapshot of liveness and hit/miss counters.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let gate = state.cycle_gate();
    HealthResponse {
        status: HealthResponse::status_label(state.is_degraded()).to_string(),
        tracked: state.registry().len().await,
        items: state.items().len().await,
        clients: state.clients().len(),
        cache: state.cache().stats(),
        cycle_running: gate.is_running(),
        completed_cycles: gate.completed_cycles(),
        last_cycle: gate.last_completed().map(format_system_time),
    }
}
