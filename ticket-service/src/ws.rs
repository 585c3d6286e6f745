//! WebSocket endpoints streaming periodic snapshots.
//!
//! Each connection is one task that sends an initial snapshot and then one
//! per tick. Writes go through a per-connection mutex: tick-driven pushes
//! and any other writer (pings, future broker-driven pushes) must not
//! interleave frames on the same socket.

use crate::error::TicketError;
use crate::handlers::{self, AppState};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tixie_web::AppError;
use tokio::sync::{broadcast, Mutex};

type SharedSink = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// `GET /v1/ws/events-with-tickets`: live events-with-tickets view.
pub async fn events_with_tickets(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    let period = state.config.ws_events_interval();
    ws.on_upgrade(move |socket| async move {
        let shutdown = state.shutdown.subscribe();
        let snapshot_state = state.clone();
        stream_snapshots(socket, shutdown, period, move || {
            let state = snapshot_state.clone();
            async move {
                let events = handlers::events_with_tickets_view(&state).await?;
                Ok(serde_json::json!({ "events": events }))
            }
        })
        .await;
    })
}

/// `GET /v1/ws/tickets/:event_id`: live ticket list for one event.
pub async fn tickets_by_event(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
) -> Result<Response, AppError> {
    if event_id <= 0 {
        return Err(AppError::bad_request("invalid event ID"));
    }

    let period = state.config.ws_tickets_interval();
    Ok(ws.on_upgrade(move |socket| async move {
        let shutdown = state.shutdown.subscribe();
        let snapshot_state = state.clone();
        stream_snapshots(socket, shutdown, period, move || {
            let state = snapshot_state.clone();
            async move {
                let tickets = state.repo.list_by_event(event_id).await?;
                Ok(serde_json::json!({ "event_id": event_id, "tickets": tickets }))
            }
        })
        .await;
    }))
}

/// Drive one connection: initial snapshot, then one per tick, until the
/// client goes away, a send fails, or shutdown is signalled.
async fn stream_snapshots<F, Fut>(
    socket: WebSocket,
    mut shutdown: broadcast::Receiver<()>,
    period: Duration,
    snapshot: F,
) where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<serde_json::Value, TicketError>>,
{
    let (sink, mut stream) = socket.split();
    let sink: SharedSink = Arc::new(Mutex::new(sink));

    if send_snapshot(&sink, &snapshot).await.is_err() {
        return;
    }

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately; the initial snapshot covered it.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = ticker.tick() => {
                if send_snapshot(&sink, &snapshot).await.is_err() {
                    break;
                }
            }
            message = stream.next() => match message {
                None | Some(Ok(Message::Close(_))) | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            }
        }
    }
}

async fn send_snapshot<F, Fut>(sink: &SharedSink, snapshot: &F) -> Result<(), ()>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<serde_json::Value, TicketError>>,
{
    let value = match snapshot().await {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(error = %error, "failed to build websocket snapshot");
            return Err(());
        }
    };

    let mut guard = sink.lock().await;
    guard
        .send(Message::Text(value.to_string()))
        .await
        .map_err(|error| {
            tracing::debug!(error = %error, "websocket send failed, closing");
        })
}
