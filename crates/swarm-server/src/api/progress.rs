//! Live progress streams.
//!
//! Each connection registers a `ChannelObserver` with the broadcaster and
//! forwards what arrives on its channel. `?workflow_id=` narrows the stream
//! to a single workflow.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{
        sse::{Event, Sse},
        IntoResponse,
    },
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

use swarm_core::events::ChannelObserver;
use swarm_core::state::AppState;

/// Events buffered per connection before it counts as lagging and is dropped.
const OBSERVER_BUFFER: usize = 256;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(progress_ws))
        .route("/events", get(progress_sse))
}

#[derive(Debug, Deserialize)]
struct ProgressQuery {
    workflow_id: Option<String>,
}

/// GET /api/v1/ws - WebSocket pushing `ProgressEvent` JSON text frames.
async fn progress_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<ProgressQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_progress_ws(socket, state, query.workflow_id))
}

async fn handle_progress_ws(socket: WebSocket, state: AppState, workflow_id: Option<String>) {
    let (observer, mut rx) = ChannelObserver::channel(OBSERVER_BUFFER, workflow_id);
    let observer_id = state.broadcaster.register(Arc::new(observer)).await;
    tracing::debug!("[Progress] WebSocket observer {} connected", observer_id);

    let (mut sender, mut receiver) = socket.split();

    // Drain client frames so pings/pongs work; a close or error ends the session.
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("[Progress] Failed to encode event: {}", e);
                        continue;
                    }
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break; // client disconnected
                }
            }
            _ = &mut reader => break,
        }
    }

    reader.abort();
    state.broadcaster.unregister(observer_id).await;
    tracing::debug!("[Progress] WebSocket observer {} disconnected", observer_id);
}

type SseStream =
    std::pin::Pin<Box<dyn tokio_stream::Stream<Item = Result<Event, Infallible>> + Send>>;

/// GET /api/v1/events - the same events as Server-Sent Events.
///
/// There is no explicit unregister: once the client goes away the channel
/// closes and the broadcaster prunes the observer on its next broadcast.
async fn progress_sse(
    State(state): State<AppState>,
    Query(query): Query<ProgressQuery>,
) -> Sse<SseStream> {
    let scope = query.workflow_id.clone();
    let (observer, mut rx) = ChannelObserver::channel(OBSERVER_BUFFER, query.workflow_id);
    state.broadcaster.register(Arc::new(observer)).await;

    let connected = serde_json::json!({ "type": "connected", "workflow_id": scope });
    let initial = tokio_stream::once(Ok::<_, Infallible>(
        Event::default().event("connected").data(connected.to_string()),
    ));

    let events = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            match Event::default().json_data(&event) {
                Ok(sse_event) => yield Ok::<_, Infallible>(sse_event),
                Err(e) => tracing::warn!("[Progress] Failed to encode event: {}", e),
            }
        }
    };

    // Heartbeat (keep connection alive)
    let heartbeat = tokio_stream::wrappers::IntervalStream::new(tokio::time::interval(
        std::time::Duration::from_secs(15),
    ))
    .map(|_| Ok(Event::default().comment("heartbeat")));

    let stream: SseStream = Box::pin(initial.chain(tokio_stream::StreamExt::merge(events, heartbeat)));
    Sse::new(stream)
}
