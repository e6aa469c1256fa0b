use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the sync service.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::items_stream,
        crate::routes::websocket::ws_handler,
        crate::routes::poll::poll,
        crate::routes::items::list_items,
        crate::routes::items::add_item,
        crate::routes::items::remove_item,
        crate::routes::items::trigger_cycle,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::state::cache::CacheStats,
            crate::dto::items::ItemsPayload,
            crate::dto::items::GroupView,
            crate::dto::items::ItemView,
            crate::dto::items::ItemMutationResponse,
            crate::dto::items::CycleTriggerResponse,
            crate::dto::poll::PollRequest,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::ItemRemovedEvent,
            crate::state::diff::PhaseCategory,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "sync", description = "Client sync transports (WebSocket and request/response)"),
        (name = "items", description = "Tracked item management"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in ["/healthcheck", "/sse/items", "/ws", "/poll", "/items", "/items/{id}", "/cycle"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
