use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::items::{CycleTriggerResponse, ItemMutationResponse, ItemPath, ItemsPayload},
    error::{AppError, ServiceError},
    services::sync_service::{self, Origin},
    state::{SharedState, item::TrackedItemId, registry::ClientKey},
};

/// Contribution key used by the REST routes (display layer and operators).
const REST_CLIENT: &str = "display";

/// REST routes over the tracked set.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/items", get(list_items))
        .route("/items/{id}", post(add_item).delete(remove_item))
        .route("/cycle", post(trigger_cycle))
}

/// Current rendered item list.
#[utoipa::path(
    get,
    path = "/items",
    tag = "items",
    responses((status = 200, description = "Grouped item list", body = ItemsPayload))
)]
pub async fn list_items(State(state): State<SharedState>) -> Json<ItemsPayload> {
    Json(sync_service::current_payload(&state).await)
}

/// Start tracking an item; clears any removal tombstone.
#[utoipa::path(
    post,
    path = "/items/{id}",
    tag = "items",
    params(ItemPath),
    responses(
        (status = 200, description = "Item tracked", body = ItemMutationResponse),
        (status = 400, description = "Invalid item id")
    )
)]
pub async fn add_item(
    State(state): State<SharedState>,
    Valid(Path(path)): Valid<Path<ItemPath>>,
) -> Json<ItemMutationResponse> {
    let item_id = TrackedItemId::new(path.id);
    let changed = sync_service::add_item(&state, &ClientKey::new(REST_CLIENT), item_id.clone()).await;
    Json(ItemMutationResponse {
        match_id: item_id,
        tracked: true,
        changed,
    })
}

/// Explicitly remove an item and notify every client.
#[utoipa::path(
    delete,
    path = "/items/{id}",
    tag = "items",
    params(ItemPath),
    responses(
        (status = 200, description = "Removal applied", body = ItemMutationResponse),
        (status = 400, description = "Invalid item id"),
        (status = 404, description = "Item not tracked")
    )
)]
pub async fn remove_item(
    State(state): State<SharedState>,
    Valid(Path(path)): Valid<Path<ItemPath>>,
) -> Result<Json<ItemMutationResponse>, AppError> {
    let item_id = TrackedItemId::new(path.id);
    if !state.registry().contains(&item_id).await {
        return Err(ServiceError::NotFound(format!("item `{item_id}` is not tracked")).into());
    }

    let origin = Origin::detached(ClientKey::new(REST_CLIENT));
    let removal = sync_service::remove_item(&state, &origin, item_id.clone()).await;
    Ok(Json(ItemMutationResponse {
        tracked: !removal.evicted,
        changed: removal.evicted,
        match_id: item_id,
    }))
}

/// Request an immediate fetch cycle.
#[utoipa::path(
    post,
    path = "/cycle",
    tag = "items",
    responses(
        (status = 202, description = "Cycle requested", body = CycleTriggerResponse),
        (status = 503, description = "Item source degraded")
    )
)]
pub async fn trigger_cycle(
    State(state): State<SharedState>,
) -> Result<(StatusCode, Json<CycleTriggerResponse>), AppError> {
    if state.is_degraded() {
        return Err(ServiceError::Degraded.into());
    }
    let deferred = state.cycle_gate().request();
    Ok((StatusCode::ACCEPTED, Json(CycleTriggerResponse { deferred })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, source::scripted::shared_state};

    fn path(id: &str) -> Valid<Path<ItemPath>> {
        Valid(Path(ItemPath { id: id.into() }))
    }

    #[tokio::test]
    async fn add_then_remove_round_trip() {
        let (state, _source, _clock) = shared_state(AppConfig::default());

        let Json(added) = add_item(State(state.clone()), path("m1")).await;
        assert!(added.changed);
        let Json(again) = add_item(State(state.clone()), path("m1")).await;
        assert!(!again.changed);

        let Json(removed) = remove_item(State(state.clone()), path("m1")).await.unwrap();
        assert!(removed.changed);
        assert!(!removed.tracked);
        assert!(state.registry().is_empty().await);

        let Json(listing) = list_items(State(state)).await;
        assert!(listing.pending.is_empty());
    }

    #[tokio::test]
    async fn removing_untracked_item_is_not_found() {
        let (state, _source, _clock) = shared_state(AppConfig::default());
        let result = remove_item(State(state), path("ghost")).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn cycle_trigger_is_refused_while_degraded() {
        let (state, _source, _clock) = shared_state(AppConfig::default());
        state.update_degraded(true);
        let result = trigger_cycle(State(state)).await;
        assert!(matches!(result, Err(AppError::ServiceUnavailable(_))));
    }
}
