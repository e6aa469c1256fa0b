use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{
    dto::sse::{Handshake, ServerEvent},
    services::{sse_events::EVENT_ITEMS, sync_service},
    state::SharedState,
};

const DISPLAY_STREAM: &str = "items";

/// Subscribe to the display stream and collect the events every new subscriber gets first:
/// a handshake and the current item list.
///
/// Subscribing before rendering means no broadcast issued in between is lost.
pub async fn subscribe_display(
    state: &SharedState,
) -> (Vec<ServerEvent>, broadcast::Receiver<ServerEvent>) {
    let receiver = state.sse().subscribe();

    let mut initial = Vec::with_capacity(2);
    let handshake = Handshake {
        stream: DISPLAY_STREAM.to_string(),
        message: "display stream connected".to_string(),
        degraded: state.is_degraded(),
    };
    match ServerEvent::json(Some("handshake".to_string()), &handshake) {
        Ok(event) => initial.push(event),
        Err(err) => warn!(error = %err, "failed to serialize SSE handshake"),
    }

    let payload = sync_service::current_payload(state).await;
    match ServerEvent::json(Some(EVENT_ITEMS.to_string()), &payload) {
        Ok(event) => initial.push(event),
        Err(err) => warn!(error = %err, "failed to serialize initial items payload"),
    }

    (initial, receiver)
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}

/// Convert a broadcast receiver into an SSE response, replaying `initial` first and
/// forwarding events until the client disconnects.
pub fn to_sse_stream(
    initial: Vec<ServerEvent>,
    mut receiver: broadcast::Receiver<ServerEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        for payload in initial {
            if tx.send(Ok(to_event(payload))).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        // Skip lagged messages; the next items event carries the full list.
                        Err(RecvError::Lagged(_)) => continue,
                    }
                }
            }
        }

        info!("display SSE stream disconnected");
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, source::scripted::shared_state};

    #[tokio::test]
    async fn new_subscriber_gets_handshake_then_items() {
        let (state, _source, _clock) = shared_state(AppConfig::default());
        state.update_degraded(true);

        let (initial, _receiver) = subscribe_display(&state).await;

        let names: Vec<_> = initial.iter().map(|e| e.event.as_deref()).collect();
        assert_eq!(names, vec![Some("handshake"), Some("items")]);
        assert!(initial[0].data.contains("\"degraded\":true"));
        assert!(initial[1].data.contains("\"groups\":[]"));
        assert_eq!(state.sse().subscriber_count(), 1);
    }
}
