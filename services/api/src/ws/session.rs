//! Manages the WebSocket connection lifecycle for owner and observer sockets.

use super::{
    protocol::{Ingress, ServerMessage},
    socket::{ClientSink, write_loop},
};
use crate::state::AppState;
use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::StreamExt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Frames up to this size are accepted, so whole images fit in one message.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Axum handler to upgrade an HTTP connection to the owner socket of a session.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .max_frame_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_owner(socket, session_id, state))
}

/// Axum handler to upgrade an HTTP connection to a read-only observer socket.
pub async fn events_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_observer(socket, session_id, state))
}

/// Starts the realtime session, then decodes inbound frames until the client
/// goes away, and finally tears the session down.
#[instrument(name = "ws_session", skip(socket, state))]
async fn handle_owner(socket: WebSocket, session_id: String, state: Arc<AppState>) {
    let (ws_tx, mut ws_rx) = socket.split();
    let (sink, outbound) = ClientSink::channel();
    let writer = tokio::spawn(write_loop(ws_tx, outbound));

    if let Err(e) = state.sessions.connect(&session_id, sink.clone()).await {
        error!(error = ?e, "Could not open realtime session");
        let _ = sink
            .send_message(&ServerMessage::error("Failed to start realtime session."))
            .await;
        sink.close().await;
        let _ = writer.await;
        return;
    }

    let mut ingress = Ingress::default();
    while let Some(frame) = ws_rx.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(error = %e, "Owner socket receive failed");
                break;
            }
        };

        let decoded = ingress.decode(text.as_str());
        if let Some(input) = decoded.forward {
            if let Err(e) = state.sessions.forward(&session_id, input).await {
                warn!(error = ?e, "Failed to forward client input to the realtime session");
            }
        }
        if let Some(reply) = decoded.reply {
            if sink.send_message(&reply).await.is_err() {
                break;
            }
        }
    }

    info!("Owner socket closed.");
    state.sessions.release(&session_id, sink.id()).await;
    sink.close().await;
    let _ = writer.await;
}

/// Mirrors the session's events to the socket; anything the observer sends is discarded.
#[instrument(name = "ws_observer", skip(socket, state))]
async fn handle_observer(socket: WebSocket, session_id: String, state: Arc<AppState>) {
    let (ws_tx, mut ws_rx) = socket.split();
    let (sink, outbound) = ClientSink::channel();
    let writer = tokio::spawn(write_loop(ws_tx, outbound));

    if !state.sessions.add_observer(&session_id, sink.clone()).await {
        info!("No live session for observer; closing.");
        sink.close().await;
        let _ = writer.await;
        return;
    }

    while let Some(Ok(frame)) = ws_rx.next().await {
        if let Message::Close(_) = frame {
            break;
        }
    }

    state.sessions.remove_observer(&session_id, sink.id()).await;
    sink.close().await;
    let _ = writer.await;
    info!("Observer socket closed.");
}
