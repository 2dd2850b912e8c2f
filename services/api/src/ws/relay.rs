//! Streams a realtime session's events to its owner and observer sockets.

use super::socket::ClientSink;
use futures_util::StreamExt;
use openai_realtime::{EventStream, RawModelData, SessionEvent, types::audio};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Raw model events that are forwarded to clients; all others are dropped.
pub const RAW_EVENT_ALLOW_LIST: &[&str] = &["transcript_delta"];

pub type Observers = Arc<Mutex<Vec<ClientSink>>>;

/// The client-facing JSON for an event, or `None` when it is not forwarded.
pub fn serialize_event(event: &SessionEvent) -> Option<Value> {
    let kind = event.kind();
    let value = match event {
        SessionEvent::AgentStart { agent } | SessionEvent::AgentEnd { agent } => {
            json!({ "type": kind, "agent": agent })
        }
        SessionEvent::Handoff { from, to } => json!({ "type": kind, "from": from, "to": to }),
        SessionEvent::ToolStart { tool } => json!({ "type": kind, "tool": tool }),
        SessionEvent::ToolEnd { tool, output } => {
            json!({ "type": kind, "tool": tool, "output": output })
        }
        SessionEvent::Audio { data, .. } => {
            json!({ "type": kind, "audio": audio::encode_base64(data) })
        }
        SessionEvent::AudioInterrupted
        | SessionEvent::AudioEnd
        | SessionEvent::InputAudioTimeoutTriggered => json!({ "type": kind }),
        SessionEvent::HistoryUpdated { history } => json!({ "type": kind, "history": history }),
        SessionEvent::HistoryAdded { item } => json!({ "type": kind, "item": item }),
        SessionEvent::GuardrailTripped { results } => {
            let results: Vec<Value> = results.iter().map(|r| json!({ "name": r.name })).collect();
            json!({ "type": kind, "guardrail_results": results })
        }
        SessionEvent::RawModelEvent(data) => return serialize_raw(data),
        SessionEvent::Error { error } => json!({ "type": kind, "error": error }),
    };
    Some(value)
}

fn serialize_raw(data: &RawModelData) -> Option<Value> {
    if !RAW_EVENT_ALLOW_LIST.contains(&data.kind()) {
        return None;
    }
    let value = match data {
        RawModelData::TranscriptDelta {
            item_id,
            delta,
            response_id,
        } => json!({
            "type": "transcript_delta",
            "item_id": item_id,
            "delta": delta,
            "response_id": response_id,
        }),
        RawModelData::Other { kind, .. } => {
            let mut map = Map::new();
            map.insert("type".to_string(), Value::String(kind.clone()));
            Value::Object(map)
        }
    };
    Some(value)
}

/// Drains `events`, sending each forwarded event to the owner and then to
/// every observer in registration order.
///
/// Ends when the stream ends, yields an error, or the owner can no longer be
/// reached. Observers that fail are closed and dropped.
pub async fn run(mut events: EventStream, owner: ClientSink, observers: Observers) {
    while let Some(item) = events.next().await {
        let event = match item {
            Ok(event) => event,
            Err(e) => {
                error!(error = ?e, "Error processing realtime session events");
                return;
            }
        };
        let Some(payload) = serialize_event(&event) else {
            debug!(kind = event.kind(), "Dropping event not forwarded to clients");
            continue;
        };
        let text = payload.to_string();

        if owner.send_text(text.clone()).await.is_err() {
            info!("Owner socket is gone; stopping relay.");
            return;
        }
        fan_out(&observers, &text).await;
    }
    info!("Realtime event stream ended.");
}

async fn fan_out(observers: &Observers, text: &str) {
    let mut observers = observers.lock().await;
    let mut failed = Vec::new();
    for observer in observers.iter() {
        if observer.send_text(text.to_string()).await.is_err() {
            failed.push(observer.clone());
        }
    }
    if failed.is_empty() {
        return;
    }
    observers.retain(|o| failed.iter().all(|f| f.id() != o.id()));
    drop(observers);
    for observer in failed {
        warn!(observer = %observer.id(), "Dropping observer after failed send");
        observer.close().await;
    }
}
