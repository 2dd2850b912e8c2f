//! WebSocket Session Management
//!
//! This module relays browser sockets to realtime model sessions. It is
//! structured into submodules:
//!
//! - `protocol`: the JSON messages a browser sends and the direct replies it gets.
//! - `registry`: the live sessions by key, with their owners and observers.
//! - `relay`: turns session events into client JSON and fans them out.
//! - `session`: the owner and observer socket lifecycles.
//! - `socket`: the per-socket writer task.
//! - `tools`: the NPC tool service exposed to realtime sessions.

pub mod protocol;
pub mod registry;
pub mod relay;
pub mod session;
pub mod socket;
pub mod tools;

pub use registry::SessionManager;
pub use session::{events_handler, ws_handler};
