use axum::{
    extract::{
        State,
        ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::stream::StreamExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{AppState, StatusResponse};
use crate::monitor::SessionSnapshot;

pub async fn monitor_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let snapshots = state.monitor.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, snapshots))
}

fn encode(snapshot: SessionSnapshot) -> Option<Utf8Bytes> {
    match serde_json::to_string(&StatusResponse::from(snapshot)) {
        Ok(json) => Some(Utf8Bytes::from(json)),
        Err(e) => {
            warn!(error = %e, "Failed to serialize monitor snapshot.");
            None
        }
    }
}

/// Pushes the current snapshot, then one more on every change, until either side goes away.
async fn handle_socket(mut socket: WebSocket, mut snapshots: watch::Receiver<SessionSnapshot>) {
    info!("Monitor WebSocket connected.");

    loop {
        let current = snapshots.borrow_and_update().clone();
        if let Some(payload) = encode(current) {
            if socket.send(Message::Text(payload)).await.is_err() {
                debug!("WebSocket send failed; closing.");
                break;
            }
        }

        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    info!("Monitor scheduler gone; closing WebSocket.");
                    break;
                }
            }
            incoming = socket.next() => match incoming {
                Some(Ok(Message::Ping(p))) => {
                    if socket.send(Message::Pong(p)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // any other client message just asks for a fresh snapshot
                Some(Ok(_)) => {}
            }
        }
    }

    info!("Monitor WebSocket disconnected.");
}
