//! A session-level client for the OpenAI Realtime API.
//!
//! The raw protocol (see `openai-realtime-types`) is turned into a stream of
//! high-level [`SessionEvent`]s: agent turns, tool calls, audio chunks and
//! conversation history. Tool calls requested by the model are executed
//! through an injected [`ToolExecutor`] and their output is fed back to the
//! model automatically.

pub mod client;
pub mod config;
pub mod events;
pub mod session;
mod translator;

pub use client::{OpenAIRealtimeFactory, OpenAIRealtimeSession};
pub use config::RealtimeConfig;
pub use events::{GuardrailResult, RawModelData, SessionEvent};
pub use session::{EventStream, ModelSession, SessionFactory, SessionHandle, ToolExecutor, UserInput};

pub use openai_realtime_types as types;
