use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use axum_valid::Valid;

use crate::{
    dto::ws::WsParams, services::websocket_service, state::SharedState,
    state::registry::ClientKey,
};

#[utoipa::path(
    get,
    path = "/ws",
    tag = "sync",
    params(WsParams),
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 400, description = "Invalid client key")
    )
)]
/// Upgrade the HTTP connection into a sync WebSocket session.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Valid(Query(params)): Valid<Query<WsParams>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let key = params.client.map(ClientKey::new);
    ws.on_upgrade(move |socket| websocket_service::handle_socket(state, socket, key))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws", get(ws_handler))
}
