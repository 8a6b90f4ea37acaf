//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources: the session engine and the loaded configuration.

use crate::config::Config;
use crate::engine::SessionEngine;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SessionEngine>,
    pub config: Arc<Config>,
}
