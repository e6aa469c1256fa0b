use serde::Serialize;
use utoipa::ToSchema;

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream.
    pub stream: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the item source is currently unhealthy.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the service enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when an item was explicitly removed from tracking.
pub struct ItemRemovedEvent {
    #[serde(rename = "matchId")]
    pub match_id: String,
}
