//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the resources
//! every handler needs.

use crate::ws::SessionManager;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
}
