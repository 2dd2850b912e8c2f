//! Outbound half of a browser WebSocket.
//!
//! Every accepted socket gets a writer task that owns the sink; everything
//! else talks to the socket through a cloneable [`ClientSink`].

use anyhow::{Result, anyhow};
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, stream::SplitSink};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

const OUTBOUND_CHANNEL_CAPACITY: usize = 512;

#[derive(Debug)]
pub enum Outbound {
    Text(String),
    Close,
}

/// Queue in front of one client socket, identified by a connection id.
#[derive(Clone, Debug)]
pub struct ClientSink {
    id: Uuid,
    tx: mpsc::Sender<Outbound>,
}

impl ClientSink {
    pub fn channel() -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
        (
            Self {
                id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Fails once the writer task has stopped.
    pub async fn send_text(&self, text: String) -> Result<()> {
        self.tx
            .send(Outbound::Text(text))
            .await
            .map_err(|_| anyhow!("Client socket {} is closed", self.id))
    }

    pub async fn send_message<T: Serialize>(&self, message: &T) -> Result<()> {
        self.send_text(serde_json::to_string(message)?).await
    }

    /// Asks the writer to send a close frame. Best effort.
    pub async fn close(&self) {
        let _ = self.tx.send(Outbound::Close).await;
    }
}

/// Drains the queue into the socket until a close is requested or a write fails.
pub async fn write_loop(mut ws_tx: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<Outbound>) {
    while let Some(outbound) = rx.recv().await {
        match outbound {
            Outbound::Text(text) => {
                if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                    debug!(error = %e, "Client socket write failed");
                    break;
                }
            }
            Outbound::Close => {
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }
        }
    }
    let _ = ws_tx.close().await;
}
