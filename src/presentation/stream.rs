// WebSocket push stream
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::StreamExt;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use crate::presentation::app_state::AppState;

/// Upgrade to a WebSocket fed by the broadcast loop. The connection only
/// pushes; anything the client sends is ignored.
pub async fn stream_updates(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let rx = state.broadcast.subscribe();
    ws.on_upgrade(move |socket| forward_frames(socket, rx))
}

async fn forward_frames(mut socket: WebSocket, rx: tokio::sync::broadcast::Receiver<String>) {
    let mut frames = BroadcastStream::new(rx);
    while let Some(frame) = frames.next().await {
        match frame {
            Ok(payload) => {
                if socket.send(Message::Text(payload)).await.is_err() {
                    tracing::debug!("push consumer disconnected");
                    return;
                }
            }
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!("push consumer lagging, {} frame(s) skipped", skipped);
            }
        }
    }
    // The broadcast channel closed: the server is shutting down.
    let _ = socket.close().await;
}
