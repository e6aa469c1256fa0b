use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse/items",
    tag = "sse",
    responses((status = 200, description = "Display SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream the rendered item list and removals to read-only displays.
pub async fn items_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let (initial, receiver) = sse_service::subscribe_display(&state).await;
    info!("new display SSE connection");
    sse_service::to_sse_stream(initial, receiver)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/items", get(items_stream))
}
