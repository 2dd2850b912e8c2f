//! NPC API Library Crate
//!
//! This library contains the web service around the museum NPC: configuration,
//! the shared application state, the REST handlers, the WebSocket relay
//! between browsers and the realtime model, and routing. The `api` binary is a
//! thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod router;
pub mod state;
pub mod ws;
