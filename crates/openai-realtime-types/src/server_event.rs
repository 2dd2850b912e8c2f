//! Events received from the Realtime API.
//!
//! Only the events the relay acts on are modelled. Every frame also keeps its
//! raw payload in [`ServerMessage`] so callers can still observe the rest.
//! Audio and transcript events accept both the beta and the GA event names.

use crate::item::ConversationItem;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ApiError {
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
    #[serde(default)]
    pub param: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ResponseResource {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "error")]
    Error { error: ApiError },

    #[serde(rename = "session.created")]
    SessionCreated {
        #[serde(default)]
        session: serde_json::Value,
    },

    #[serde(rename = "session.updated")]
    SessionUpdated {
        #[serde(default)]
        session: serde_json::Value,
    },

    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        audio_start_ms: Option<u64>,
    },

    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped {
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        audio_end_ms: Option<u64>,
    },

    #[serde(rename = "input_audio_buffer.timeout_triggered")]
    InputAudioTimeoutTriggered {
        #[serde(default)]
        item_id: Option<String>,
    },

    #[serde(rename = "conversation.item.created", alias = "conversation.item.added")]
    ConversationItemCreated {
        item: ConversationItem,
        #[serde(default)]
        previous_item_id: Option<String>,
    },

    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputAudioTranscriptionCompleted {
        item_id: String,
        #[serde(default)]
        content_index: usize,
        transcript: String,
    },

    #[serde(rename = "response.created")]
    ResponseCreated {
        #[serde(default)]
        response: ResponseResource,
    },

    #[serde(rename = "response.done")]
    ResponseDone {
        #[serde(default)]
        response: ResponseResource,
    },

    #[serde(rename = "response.output_item.added")]
    ResponseOutputItemAdded {
        #[serde(default)]
        response_id: Option<String>,
        item: ConversationItem,
    },

    #[serde(rename = "response.output_item.done")]
    ResponseOutputItemDone {
        #[serde(default)]
        response_id: Option<String>,
        item: ConversationItem,
    },

    #[serde(rename = "response.audio.delta", alias = "response.output_audio.delta")]
    ResponseAudioDelta {
        #[serde(default)]
        response_id: Option<String>,
        #[serde(default)]
        item_id: Option<String>,
        delta: String,
    },

    #[serde(rename = "response.audio.done", alias = "response.output_audio.done")]
    ResponseAudioDone {
        #[serde(default)]
        response_id: Option<String>,
        #[serde(default)]
        item_id: Option<String>,
    },

    #[serde(
        rename = "response.audio_transcript.delta",
        alias = "response.output_audio_transcript.delta"
    )]
    ResponseAudioTranscriptDelta {
        #[serde(default)]
        response_id: Option<String>,
        #[serde(default)]
        item_id: Option<String>,
        delta: String,
    },

    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        call_id: String,
        /// Not always present; resolved from the matching `function_call` item otherwise.
        #[serde(default)]
        name: Option<String>,
        arguments: String,
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        response_id: Option<String>,
    },
}

/// A decoded server frame: its protocol type, the typed event when it is one
/// the relay models, and the raw payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerMessage {
    pub kind: String,
    pub event: Option<ServerEvent>,
    pub payload: serde_json::Value,
}

impl ServerMessage {
    /// Decodes a text frame. Fails only when the frame is not a JSON object
    /// with a string `type`.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let payload: serde_json::Value = serde_json::from_str(text)?;
        let kind = payload
            .get("type")
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .ok_or_else(|| <serde_json::Error as serde::de::Error>::missing_field("type"))?;
        let event = ServerEvent::deserialize(&payload).ok();
        Ok(Self {
            kind,
            event,
            payload,
        })
    }
}
