//! Push transport: one task pair per WebSocket client.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{ClientMessage, ServerMessage},
    services::sync_service::{self, Origin},
    state::{ClientConnection, SharedState, registry::ClientKey},
};

/// Handle the full lifecycle of one push connection.
///
/// The current item list is sent before any inbound frame is read. `key` is the stable
/// contribution identity; when the client gave none the connection id is used. Contributions
/// are not rolled back on disconnect: the client's next `sync` replaces them.
pub async fn handle_socket(state: SharedState, socket: WebSocket, key: Option<ClientKey>) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let connection_id = Uuid::new_v4();
    let key = key.unwrap_or_else(|| ClientKey::new(connection_id.to_string()));
    let origin = Origin {
        key: key.clone(),
        connection: Some(connection_id),
    };

    state.clients().insert(
        connection_id,
        ClientConnection {
            id: connection_id,
            key: key.clone(),
            tx: outbound_tx.clone(),
        },
    );
    info!(client = %key, connection = %connection_id, "sync client connected");

    let initial = ServerMessage::Items(sync_service::current_payload(&state).await);
    if let Err(err) = sync_service::send_to_client(&outbound_tx, &initial) {
        warn!(client = %key, error = %err, "failed to send initial items; terminating");
        state.clients().remove(&connection_id);
        finalize(writer_task, outbound_tx).await;
        return;
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                debug!(client = %key, payload = %text, "received sync message");
                match ClientMessage::from_json_str(&text) {
                    Ok(message) => {
                        sync_service::apply_client_message(&state, &origin, message).await;
                    }
                    Err(err) => {
                        warn!(client = %key, error = %err, "ignoring malformed sync message");
                    }
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {
                warn!(client = %key, "ignoring binary frame");
            }
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(client = %key, error = %err, "websocket error");
                break;
            }
        }
    }

    state.clients().remove(&connection_id);
    info!(client = %key, connection = %connection_id, "sync client disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
