//! Transport-agnostic sync operations shared by the push, poll and REST adapters.

use std::time::SystemTime;

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        items::ItemsPayload,
        poll::{ACK_TOKEN, removal_notice},
        ws::{ClientMessage, ServerMessage},
    },
    error::TransportError,
    services::sse_events,
    state::{
        PollOutbox, SharedState,
        item::TrackedItemId,
        registry::{ClientKey, Removal, SyncOutcome},
    },
};

/// Who issued a registry mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    /// Contribution key of the caller.
    pub key: ClientKey,
    /// Push connection the request arrived on, if any.
    pub connection: Option<Uuid>,
}

impl Origin {
    /// Caller without a push connection (poll or REST).
    pub fn detached(key: ClientKey) -> Self {
        Self {
            key,
            connection: None,
        }
    }
}

/// Apply one decoded control message.
pub async fn apply_client_message(state: &SharedState, origin: &Origin, message: ClientMessage) {
    match message {
        ClientMessage::Sync { ids } => {
            sync_client(state, origin, ids.into_iter().map(TrackedItemId::from).collect()).await;
        }
        ClientMessage::Add { match_id } => {
            add_item(state, &origin.key, TrackedItemId::from(match_id)).await;
        }
        ClientMessage::Remove { match_id } => {
            remove_item(state, origin, TrackedItemId::from(match_id)).await;
        }
    }
}

/// Replace the caller's declared set.
///
/// Ids removed explicitly a short while ago are refused and answered with a removal notice so
/// a reconnecting client drops its stale local copy.
pub async fn sync_client(
    state: &SharedState,
    origin: &Origin,
    ids: Vec<TrackedItemId>,
) -> SyncOutcome {
    let now = state.clock().now();
    let outcome = state.registry().sync(&origin.key, &ids, now).await;

    for item_id in &outcome.rejected {
        debug!(client = %origin.key, item_id = %item_id, "refusing recently removed item");
        notify_origin_removed(state, origin, item_id);
    }

    for item_id in &outcome.evicted {
        state.items().remove(item_id).await;
    }

    if outcome.changed() {
        info!(
            client = %origin.key,
            added = outcome.added.len(),
            evicted = outcome.evicted.len(),
            "client set synchronized"
        );
        registry_changed(state).await;
    }

    outcome
}

/// Track `item_id` on behalf of `key`; clears any removal tombstone.
pub async fn add_item(state: &SharedState, key: &ClientKey, item_id: TrackedItemId) -> bool {
    let added = state.registry().add(key, &item_id).await;
    if added {
        info!(client = %key, item_id = %item_id, "item added to tracking");
        registry_changed(state).await;
    }
    added
}

/// Explicit removal: evict per the removal policy, drop cached and derived state, and tell
/// every other client to drop its local copy.
pub async fn remove_item(state: &SharedState, origin: &Origin, item_id: TrackedItemId) -> Removal {
    let now = state.clock().now();
    let removal = state.registry().remove(&origin.key, &item_id, now).await;

    if !removal.evicted {
        debug!(
            client = %origin.key,
            item_id = %item_id,
            "removal withdrew client interest only"
        );
        return removal;
    }

    state.cache().invalidate(&item_id);
    state.items().remove(&item_id).await;
    info!(
        client = %origin.key,
        item_id = %item_id,
        affected = removal.affected.len(),
        "item removed from tracking"
    );

    notify_others_removed(state, origin, &item_id, &removal.affected);
    sse_events::broadcast_item_removed(state, &item_id);
    registry_changed(state).await;

    removal
}

/// Request/response transport: track `item_id` and answer with one pending notice or `OK`.
pub async fn handle_poll(state: &SharedState, key: ClientKey, item_id: TrackedItemId) -> String {
    let now = state.clock().now();
    state
        .poll_outboxes()
        .entry(key.clone())
        .or_insert_with(|| PollOutbox::new(now))
        .last_seen = now;

    if state.registry().is_tombstoned(&item_id, now).await {
        if let Some(mut outbox) = state.poll_outboxes().get_mut(&key) {
            outbox.pending.retain(|pending| pending != &item_id);
        }
        debug!(client = %key, item_id = %item_id, "poll for removed item");
        return removal_notice(item_id.as_str());
    }

    add_item(state, &key, item_id).await;

    let pending = state
        .poll_outboxes()
        .get_mut(&key)
        .and_then(|mut outbox| outbox.pending.pop_front());

    match pending {
        Some(removed) => removal_notice(removed.as_str()),
        None => ACK_TOKEN.to_string(),
    }
}

/// Forget request/response clients that have not polled for `poll_idle_ttl`.
///
/// Their pending notices are dropped and their contributions withdrawn; ids nobody else wants
/// stop being fetched. Keys still held by a push connection keep their contributions. Returns
/// the number of expired clients.
pub async fn expire_idle_pollers(state: &SharedState, now: SystemTime) -> usize {
    let ttl = state.config().poll_idle_ttl;
    let mut idle = Vec::new();
    state.poll_outboxes().retain(|key, outbox| {
        let expired = now
            .duration_since(outbox.last_seen)
            .is_ok_and(|silent| silent >= ttl);
        if expired {
            idle.push(key.clone());
        }
        !expired
    });

    for key in &idle {
        if state.clients().iter().any(|connection| &connection.key == key) {
            debug!(client = %key, "idle poll key still has a push connection");
            continue;
        }
        let evicted = state.registry().withdraw(key).await;
        for item_id in &evicted {
            state.cache().invalidate(item_id);
            state.items().remove(item_id).await;
        }
        info!(
            client = %key,
            evicted = evicted.len(),
            "request/response client went idle; contributions withdrawn"
        );
    }

    idle.len()
}

/// Consistent rendering of the current tracked set.
pub async fn current_payload(state: &SharedState) -> ItemsPayload {
    let tracked = state.registry().snapshot().await;
    let states = state.items().snapshot().await;
    ItemsPayload::build(&tracked, states, state.clock().now())
}

/// Push the current payload to every push connection and display subscriber.
pub async fn broadcast_items(state: &SharedState) {
    let payload = current_payload(state).await;
    sse_events::broadcast_items(state, &payload);
    let message = ServerMessage::Items(payload);

    match serde_json::to_string(&message) {
        Ok(text) => {
            let closed: Vec<Uuid> = state
                .clients()
                .iter()
                .filter(|connection| {
                    connection
                        .tx
                        .send(Message::Text(text.clone().into()))
                        .is_err()
                })
                .map(|connection| connection.id)
                .collect();
            drop_closed_connections(state, closed);
        }
        Err(err) => warn!(error = %err, "failed to serialize items payload"),
    }
}

/// Serialize `message` and queue it on a connection writer.
pub fn send_to_client(
    tx: &mpsc::UnboundedSender<Message>,
    message: &ServerMessage,
) -> Result<(), TransportError> {
    let text = serde_json::to_string(message)
        .map_err(|err| TransportError::MalformedMessage(err.to_string()))?;
    tx.send(Message::Text(text.into()))
        .map_err(|_| TransportError::Disconnected("writer closed".into()))
}

/// A registry mutation happened: schedule a cycle and push the new set immediately.
async fn registry_changed(state: &SharedState) {
    if state.cycle_gate().request() {
        debug!("cycle in progress; refresh deferred until it completes");
    }
    broadcast_items(state).await;
}

fn notify_origin_removed(state: &SharedState, origin: &Origin, item_id: &TrackedItemId) {
    match origin.connection {
        Some(connection_id) => {
            let tx = state
                .clients()
                .get(&connection_id)
                .map(|connection| connection.tx.clone());
            let Some(tx) = tx else {
                return;
            };
            if let Err(err) = send_to_client(&tx, &ServerMessage::remove(item_id)) {
                warn!(client = %origin.key, error = %err, "failed to send removal notice");
            }
        }
        None => queue_poll_notice(state, &origin.key, item_id),
    }
}

fn notify_others_removed(
    state: &SharedState,
    origin: &Origin,
    item_id: &TrackedItemId,
    affected: &[ClientKey],
) {
    let notice = ServerMessage::remove(item_id);
    let closed: Vec<Uuid> = state
        .clients()
        .iter()
        .filter(|connection| Some(connection.id) != origin.connection)
        .filter(|connection| send_to_client(&connection.tx, &notice).is_err())
        .map(|connection| connection.id)
        .collect();
    drop_closed_connections(state, closed);

    for key in affected.iter().filter(|key| **key != origin.key) {
        queue_poll_notice(state, key, item_id);
    }
}

/// Queue a removal notice for a known request/response client.
fn queue_poll_notice(state: &SharedState, key: &ClientKey, item_id: &TrackedItemId) {
    let Some(mut outbox) = state.poll_outboxes().get_mut(key) else {
        return;
    };
    if !outbox.pending.contains(item_id) {
        outbox.pending.push_back(item_id.clone());
    }
}

fn drop_closed_connections(state: &SharedState, closed: Vec<Uuid>) {
    for connection_id in closed {
        if let Some((_, connection)) = state.clients().remove(&connection_id) {
            let err = TransportError::Disconnected(connection.key.to_string());
            warn!(connection = %connection_id, error = %err, "writer closed; dropping connection");
        }
    }
}
