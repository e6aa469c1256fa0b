use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        items::ItemsPayload,
        sse::{ItemRemovedEvent, ServerEvent, SystemStatus},
    },
    state::{SharedState, item::TrackedItemId},
};

pub(crate) const EVENT_ITEMS: &str = "items";
const EVENT_ITEM_REMOVED: &str = "remove";
const EVENT_SYSTEM_STATUS: &str = "system.status";

/// Broadcast the full rendered item list to display subscribers.
pub fn broadcast_items(state: &SharedState, payload: &ItemsPayload) {
    send_display_event(state, EVENT_ITEMS, payload);
}

/// Broadcast that an item was explicitly removed.
pub fn broadcast_item_removed(state: &SharedState, item_id: &TrackedItemId) {
    let payload = ItemRemovedEvent {
        match_id: item_id.to_string(),
    };
    send_display_event(state, EVENT_ITEM_REMOVED, &payload);
}

/// Broadcast a degraded-mode change.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    send_display_event(state, EVENT_SYSTEM_STATUS, &SystemStatus { degraded });
}

fn send_display_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize display SSE payload"),
    }
}
