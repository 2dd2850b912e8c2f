//! The seams between a realtime session and the code that drives it.

use crate::events::SessionEvent;
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use openai_realtime_types::{ContentPart, ToolDef};
use std::pin::Pin;
use std::sync::Arc;

/// The outbound event stream of a session. It ends when the session closes;
/// an `Err` item is terminal.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<SessionEvent>> + Send>>;

/// A structured user turn (text and/or image parts).
#[derive(Debug, Clone, PartialEq)]
pub struct UserInput {
    pub content: Vec<ContentPart>,
}

impl UserInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentPart::input_text(text)],
        }
    }

    /// An image followed by an optional text prompt.
    pub fn image(data_url: impl Into<String>, prompt: Option<String>) -> Self {
        let mut content = vec![ContentPart::input_image(data_url)];
        if let Some(prompt) = prompt.filter(|p| !p.is_empty()) {
            content.push(ContentPart::input_text(prompt));
        }
        Self { content }
    }
}

/// A live connection to a hosted realtime model.
#[async_trait]
pub trait ModelSession: Send + Sync {
    /// Appends PCM16 little-endian audio to the model's input buffer.
    async fn send_audio(&self, pcm16: Bytes) -> Result<()>;

    /// Adds a user message to the conversation and asks for a response.
    async fn send_message(&self, input: UserInput) -> Result<()>;

    /// Sends an arbitrary client event `{"type": kind, ..other_data}`.
    async fn send_raw(
        &self,
        kind: &str,
        other_data: serde_json::Map<String, serde_json::Value>,
    ) -> Result<()>;

    /// Stops the response currently being generated, if any.
    async fn interrupt(&self) -> Result<()>;

    /// Ends the session. Calling it more than once is a no-op.
    async fn close(&self) -> Result<()>;
}

/// A started session: the control handle plus its event stream.
pub struct SessionHandle {
    pub session: Arc<dyn ModelSession>,
    pub events: EventStream,
}

/// Starts sessions with a fixed configuration.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn start(&self) -> Result<SessionHandle>;
}

/// Executes the functions the model is allowed to call.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Definitions advertised to the model in the session configuration.
    async fn definitions(&self) -> Result<Vec<ToolDef>>;

    /// Runs a tool with its JSON-encoded arguments and returns the textual output.
    async fn call(&self, name: &str, arguments: &str) -> Result<String>;
}
