use bytes::Bytes;
use openai_realtime_types::ConversationItem;

/// High-level events emitted by a realtime session, in the order the model produced them.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The agent started a response turn.
    AgentStart { agent: String },
    /// The agent finished a response turn.
    AgentEnd { agent: String },
    Handoff { from: String, to: String },
    ToolStart { tool: String },
    ToolEnd { tool: String, output: String },
    /// Decoded PCM16 audio produced by the model.
    Audio {
        data: Bytes,
        item_id: Option<String>,
        response_id: Option<String>,
    },
    /// Playback of the current response was cut short (user barge-in or interrupt).
    AudioInterrupted,
    AudioEnd,
    HistoryUpdated { history: Vec<ConversationItem> },
    HistoryAdded { item: ConversationItem },
    GuardrailTripped { results: Vec<GuardrailResult> },
    RawModelEvent(RawModelData),
    Error { error: String },
    InputAudioTimeoutTriggered,
}

impl SessionEvent {
    /// The wire tag used for this event on the client protocol.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::AgentStart { .. } => "agent_start",
            SessionEvent::AgentEnd { .. } => "agent_end",
            SessionEvent::Handoff { .. } => "handoff",
            SessionEvent::ToolStart { .. } => "tool_start",
            SessionEvent::ToolEnd { .. } => "tool_end",
            SessionEvent::Audio { .. } => "audio",
            SessionEvent::AudioInterrupted => "audio_interrupted",
            SessionEvent::AudioEnd => "audio_end",
            SessionEvent::HistoryUpdated { .. } => "history_updated",
            SessionEvent::HistoryAdded { .. } => "history_added",
            SessionEvent::GuardrailTripped { .. } => "guardrail_tripped",
            SessionEvent::RawModelEvent(_) => "raw_model_event",
            SessionEvent::Error { .. } => "error",
            SessionEvent::InputAudioTimeoutTriggered => "input_audio_timeout_triggered",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuardrailResult {
    pub name: String,
}

/// Model events passed through without session-level interpretation.
#[derive(Debug, Clone, PartialEq)]
pub enum RawModelData {
    /// A chunk of the transcript of the model's spoken answer.
    TranscriptDelta {
        item_id: Option<String>,
        delta: String,
        response_id: Option<String>,
    },
    /// Any other server event, tagged with its protocol type.
    Other {
        kind: String,
        payload: serde_json::Value,
    },
}

impl RawModelData {
    pub fn kind(&self) -> &str {
        match self {
            RawModelData::TranscriptDelta { .. } => "transcript_delta",
            RawModelData::Other { kind, .. } => kind,
        }
    }
}
