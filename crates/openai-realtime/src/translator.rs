//! Turns raw Realtime API server frames into [`SessionEvent`]s.
//!
//! The translator owns the session-level view of the conversation: the item
//! history, whether a response is in flight, whether its audio is still
//! playing, and which function name belongs to which call id.

use crate::events::{RawModelData, SessionEvent};
use bytes::Bytes;
use openai_realtime_types::{ConversationItem, ServerEvent, ServerMessage, audio};
use std::collections::HashMap;

/// A function call the model is waiting on.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FunctionCall {
    pub call_id: String,
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct Translation {
    pub events: Vec<SessionEvent>,
    pub tool_call: Option<FunctionCall>,
}

impl Translation {
    fn events(events: Vec<SessionEvent>) -> Self {
        Self {
            events,
            tool_call: None,
        }
    }
}

pub(crate) struct EventTranslator {
    agent_name: String,
    history: Vec<ConversationItem>,
    pending_calls: HashMap<String, String>,
    response_active: bool,
    audio_playing: bool,
}

impl EventTranslator {
    pub fn new(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            history: Vec::new(),
            pending_calls: HashMap::new(),
            response_active: false,
            audio_playing: false,
        }
    }

    pub fn response_active(&self) -> bool {
        self.response_active
    }

    /// Marks the current playback as cut short. Returns the event to emit, if
    /// any audio was playing.
    pub fn interrupt(&mut self) -> Option<SessionEvent> {
        std::mem::take(&mut self.audio_playing).then_some(SessionEvent::AudioInterrupted)
    }

    pub fn translate(&mut self, msg: ServerMessage) -> Translation {
        let Some(event) = msg.event else {
            return Translation::events(vec![raw(msg.kind, msg.payload)]);
        };

        match event {
            ServerEvent::Error { error } => Translation::events(vec![SessionEvent::Error {
                error: error.message,
            }]),
            ServerEvent::SpeechStarted { .. } => match self.interrupt() {
                Some(interrupted) => Translation::events(vec![interrupted]),
                None => Translation::events(vec![raw(msg.kind, msg.payload)]),
            },
            ServerEvent::InputAudioTimeoutTriggered { .. } => {
                Translation::events(vec![SessionEvent::InputAudioTimeoutTriggered])
            }
            ServerEvent::ConversationItemCreated { item, .. } => {
                self.upsert(item.clone());
                Translation::events(vec![SessionEvent::HistoryAdded { item }])
            }
            ServerEvent::InputAudioTranscriptionCompleted {
                item_id,
                content_index,
                transcript,
            } => {
                let part = self
                    .history
                    .iter_mut()
                    .find(|item| item.id.as_deref() == Some(item_id.as_str()))
                    .and_then(|item| item.content.as_mut())
                    .and_then(|content| content.get_mut(content_index));
                match part {
                    Some(part) => {
                        part.transcript = Some(transcript);
                        Translation::events(vec![self.history_updated()])
                    }
                    None => Translation::events(vec![raw(msg.kind, msg.payload)]),
                }
            }
            ServerEvent::ResponseCreated { .. } => {
                self.response_active = true;
                Translation::events(vec![SessionEvent::AgentStart {
                    agent: self.agent_name.clone(),
                }])
            }
            ServerEvent::ResponseDone { .. } => {
                self.response_active = false;
                self.audio_playing = false;
                Translation::events(vec![SessionEvent::AgentEnd {
                    agent: self.agent_name.clone(),
                }])
            }
            ServerEvent::ResponseOutputItemAdded { item, .. } => {
                if item.is_function_call() {
                    if let (Some(call_id), Some(name)) = (&item.call_id, &item.name) {
                        self.pending_calls.insert(call_id.clone(), name.clone());
                    }
                }
                Translation::events(vec![raw(msg.kind, msg.payload)])
            }
            ServerEvent::ResponseOutputItemDone { item, .. } => {
                self.upsert(item);
                Translation::events(vec![self.history_updated()])
            }
            ServerEvent::ResponseAudioDelta {
                response_id,
                item_id,
                delta,
            } => match audio::decode_base64(&delta) {
                Ok(data) => {
                    self.audio_playing = true;
                    Translation::events(vec![SessionEvent::Audio {
                        data: Bytes::from(data),
                        item_id,
                        response_id,
                    }])
                }
                Err(e) => Translation::events(vec![SessionEvent::Error {
                    error: format!("Invalid audio delta from model: {}", e),
                }]),
            },
            ServerEvent::ResponseAudioDone { .. } => {
                self.audio_playing = false;
                Translation::events(vec![SessionEvent::AudioEnd])
            }
            ServerEvent::ResponseAudioTranscriptDelta {
                response_id,
                item_id,
                delta,
            } => Translation::events(vec![SessionEvent::RawModelEvent(
                RawModelData::TranscriptDelta {
                    item_id,
                    delta,
                    response_id,
                },
            )]),
            ServerEvent::FunctionCallArgumentsDone {
                call_id,
                name,
                arguments,
                ..
            } => {
                let registered = self.pending_calls.remove(&call_id);
                match name.or(registered) {
                    Some(name) => Translation {
                        events: vec![SessionEvent::ToolStart { tool: name.clone() }],
                        tool_call: Some(FunctionCall {
                            call_id,
                            name,
                            arguments,
                        }),
                    },
                    None => Translation::events(vec![SessionEvent::Error {
                        error: format!("Function call '{}' has no name", call_id),
                    }]),
                }
            }
            ServerEvent::SessionCreated { .. }
            | ServerEvent::SessionUpdated { .. }
            | ServerEvent::SpeechStopped { .. } => {
                Translation::events(vec![raw(msg.kind, msg.payload)])
            }
        }
    }

    fn upsert(&mut self, item: ConversationItem) {
        let existing = item
            .id
            .as_ref()
            .and_then(|id| self.history.iter().position(|i| i.id.as_ref() == Some(id)));
        match existing {
            Some(index) => self.history[index] = item,
            None => self.history.push(item),
        }
    }

    fn history_updated(&self) -> SessionEvent {
        SessionEvent::HistoryUpdated {
            history: self.history.clone(),
        }
    }
}

fn raw(kind: String, payload: serde_json::Value) -> SessionEvent {
    SessionEvent::RawModelEvent(RawModelData::Other { kind, payload })
}
