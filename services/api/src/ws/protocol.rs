//! Defines the WebSocket message protocol between the browser client and the API server.

use super::registry::ModelInput;
use bytes::Bytes;
use openai_realtime::{UserInput, types::audio};
use serde::{Deserialize, Serialize};
use serde_json::Map;
use std::collections::HashMap;

pub const DEFAULT_IMAGE_PROMPT: &str = "Please describe this image.";

/// A chunked upload is acknowledged every this many chunks.
const CHUNK_ACK_INTERVAL: usize = 10;

/// Messages sent from the client (browser) to the server.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Microphone audio as signed 16-bit samples.
    Audio { data: Vec<i16> },
    /// A missing or `null` text counts as empty.
    Text { text: Option<String> },
    /// A whole image as a data URL, with an optional prompt.
    Image {
        data_url: Option<String>,
        text: Option<String>,
    },
    /// Ends the current input audio turn.
    CommitAudio,
    ImageStart { id: ImageId, text: Option<String> },
    ImageChunk { id: ImageId, chunk: Option<String> },
    ImageEnd { id: ImageId },
    /// Cuts off the model's current response.
    Interrupt,
}

/// Browsers send upload ids as strings or numbers; both name the same buffer.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ImageId {
    Text(String),
    Number(serde_json::Number),
}

impl ImageId {
    pub fn key(&self) -> String {
        match self {
            ImageId::Text(id) => id.clone(),
            ImageId::Number(id) => id.to_string(),
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Info {
    TextEnqueued,
    ImageEnqueued,
    ImageStartAck,
    ImageChunkAck,
}

/// Direct replies from the server to the owner socket.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ClientInfo {
        info: Info,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        size: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        count: Option<usize>,
    },
    Error { error: String },
}

impl ServerMessage {
    fn info(info: Info) -> Self {
        ServerMessage::ClientInfo {
            info,
            id: None,
            size: None,
            count: None,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        ServerMessage::Error {
            error: error.into(),
        }
    }
}

/// What to do with one inbound frame.
#[derive(Debug, Default, PartialEq)]
pub struct Decoded {
    pub forward: Option<ModelInput>,
    pub reply: Option<ServerMessage>,
}

impl Decoded {
    fn forward(input: ModelInput) -> Self {
        Self {
            forward: Some(input),
            reply: None,
        }
    }

    fn reply(reply: ServerMessage) -> Self {
        Self {
            forward: None,
            reply: Some(reply),
        }
    }
}

struct ImageUpload {
    prompt: String,
    chunks: Vec<String>,
}

/// Per-connection decoder for owner frames. Holds partially uploaded images.
#[derive(Default)]
pub struct Ingress {
    uploads: HashMap<String, ImageUpload>,
}

impl Ingress {
    pub fn decode(&mut self, raw: &str) -> Decoded {
        match serde_json::from_str::<ClientMessage>(raw) {
            Ok(message) => self.handle(message),
            Err(e) => Decoded::reply(ServerMessage::error(format!("Invalid client message: {}", e))),
        }
    }

    fn handle(&mut self, message: ClientMessage) -> Decoded {
        match message {
            ClientMessage::Audio { data } if data.is_empty() => Decoded::default(),
            ClientMessage::Audio { data } => {
                Decoded::forward(ModelInput::Audio(Bytes::from(audio::pcm16_bytes(&data))))
            }
            ClientMessage::Text { text } => match text.filter(|t| !t.is_empty()) {
                Some(text) => Decoded {
                    forward: Some(ModelInput::Message(UserInput::text(text))),
                    reply: Some(ServerMessage::info(Info::TextEnqueued)),
                },
                None => Decoded::reply(ServerMessage::error("Empty text message.")),
            },
            ClientMessage::Image { data_url, text } => match data_url.filter(|url| !url.is_empty()) {
                Some(data_url) => {
                    let size = data_url.len();
                    Decoded {
                        forward: Some(image_message(data_url, text)),
                        reply: Some(ServerMessage::ClientInfo {
                            info: Info::ImageEnqueued,
                            id: None,
                            size: Some(size),
                            count: None,
                        }),
                    }
                }
                None => Decoded::reply(ServerMessage::error("No data_url for image message.")),
            },
            ClientMessage::CommitAudio => Decoded::forward(ModelInput::Raw {
                kind: "input_audio_buffer.commit".to_string(),
                other_data: Map::new(),
            }),
            ClientMessage::ImageStart { id, text } => {
                let id = id.key();
                self.uploads.insert(
                    id.clone(),
                    ImageUpload {
                        prompt: prompt_or_default(text),
                        chunks: Vec::new(),
                    },
                );
                Decoded::reply(ServerMessage::ClientInfo {
                    info: Info::ImageStartAck,
                    id: Some(id),
                    size: None,
                    count: None,
                })
            }
            ClientMessage::ImageChunk { id, chunk } => {
                let id = id.key();
                let Some(upload) = self.uploads.get_mut(&id) else {
                    return Decoded::default();
                };
                upload.chunks.push(chunk.unwrap_or_default());
                let count = upload.chunks.len();
                if count % CHUNK_ACK_INTERVAL == 0 {
                    Decoded::reply(ServerMessage::ClientInfo {
                        info: Info::ImageChunkAck,
                        id: Some(id),
                        size: None,
                        count: Some(count),
                    })
                } else {
                    Decoded::default()
                }
            }
            ClientMessage::ImageEnd { id } => {
                let id = id.key();
                let Some(upload) = self.uploads.remove(&id) else {
                    return Decoded::reply(ServerMessage::error("Unknown image id for image_end."));
                };
                let data_url = upload.chunks.concat();
                if data_url.is_empty() {
                    return Decoded::reply(ServerMessage::error("Empty image."));
                }
                let size = data_url.len();
                Decoded {
                    forward: Some(image_message(data_url, Some(upload.prompt))),
                    reply: Some(ServerMessage::ClientInfo {
                        info: Info::ImageEnqueued,
                        id: Some(id),
                        size: Some(size),
                        count: None,
                    }),
                }
            }
            ClientMessage::Interrupt => Decoded::forward(ModelInput::Interrupt),
        }
    }
}

fn prompt_or_default(text: Option<String>) -> String {
    text.filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_IMAGE_PROMPT.to_string())
}

fn image_message(data_url: String, text: Option<String>) -> ModelInput {
    ModelInput::Message(UserInput::image(data_url, Some(prompt_or_default(text))))
}
