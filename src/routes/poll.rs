use axum::{Json, Router, extract::State, http::HeaderMap, routing::post};
use axum_valid::Valid;

use crate::{
    dto::{
        poll::{CLIENT_ID_HEADER, PollRequest},
        validation::validate_item_id,
    },
    error::{AppError, ServiceError},
    services::sync_service,
    state::{SharedState, item::TrackedItemId, registry::ClientKey},
};

/// Key shared by request/response clients that do not identify themselves.
const ANONYMOUS_POLL_CLIENT: &str = "poll";

/// Request/response sync transport.
pub fn router() -> Router<SharedState> {
    Router::new().route("/poll", post(poll))
}

/// Track one id and collect at most one pending removal notice.
#[utoipa::path(
    post,
    path = "/poll",
    tag = "sync",
    request_body = PollRequest,
    params(("x-client-id" = Option<String>, Header, description = "Stable client key")),
    responses(
        (status = 200, description = "`OK` or `REMOVE:<id>`", content_type = "text/plain", body = String),
        (status = 400, description = "Invalid item id or client key")
    )
)]
pub async fn poll(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Valid(Json(payload)): Valid<Json<PollRequest>>,
) -> Result<String, AppError> {
    let key = client_key(&headers)?;
    Ok(sync_service::handle_poll(&state, key, TrackedItemId::new(payload.id)).await)
}

fn client_key(headers: &HeaderMap) -> Result<ClientKey, ServiceError> {
    let Some(value) = headers.get(CLIENT_ID_HEADER) else {
        return Ok(ClientKey::new(ANONYMOUS_POLL_CLIENT));
    };
    let raw = value
        .to_str()
        .map_err(|_| ServiceError::InvalidInput(format!("{CLIENT_ID_HEADER} is not valid text")))?;
    validate_item_id(raw)
        .map_err(|err| ServiceError::InvalidInput(format!("invalid {CLIENT_ID_HEADER}: {err}")))?;
    Ok(ClientKey::new(raw))
}
