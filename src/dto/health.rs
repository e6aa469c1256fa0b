use serde::Serialize;
use utoipa::ToSchema;

use crate::state::cache::CacheStats;

/// Health and hit/miss counters returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Ids in the effective tracked set.
    pub tracked: usize,
    /// Items holding a state from a successful fetch.
    pub items: usize,
    /// Open push connections.
    pub clients: usize,
    /// Static-field cache counters.
    pub cache: CacheStats,
    /// Whether a fetch cycle is in progress.
    pub cycle_running: bool,
    /// Cycles completed since start.
    pub completed_cycles: u64,
    /// RFC 3339 completion time of the last cycle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_cycle: Option<String>,
}

impl HealthResponse {
    /// Status label for the degraded flag.
    pub fn status_label(degraded: bool) -> &'static str {
        if degraded { "degraded" } else { "ok" }
    }
}
