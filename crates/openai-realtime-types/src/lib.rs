//! Wire types for the OpenAI Realtime API.
//!
//! Every event exchanged with the Realtime API is a JSON object carrying a
//! `type` discriminator. This crate only describes those objects; the
//! connection itself lives in the `openai-realtime` crate.

pub mod audio;
pub mod client_event;
pub mod item;
pub mod server_event;
pub mod session;

pub use client_event::ClientEvent;
pub use item::{ContentPart, ConversationItem};
pub use server_event::{ApiError, ServerEvent, ServerMessage};
pub use session::{InputAudioTranscription, SessionConfig, ToolDef, TurnDetection};
