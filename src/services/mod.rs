/// Fetch-cycle driver and interval ticker.
pub mod cycle;
/// OpenAPI documentation generation.
pub mod documentation;
/// Normalisation of raw extractions into item fields.
pub mod extraction;
/// Health check service.
pub mod health_service;
/// Per-cycle fetch orchestration over the tracked set.
pub mod orchestrator;
/// Bounded retry combinator.
pub mod retry;
/// Item source health supervision and degraded mode.
pub mod source_supervisor;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events streaming service.
pub mod sse_service;
/// Transport-agnostic registry mutations and fan-out.
pub mod sync_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;
