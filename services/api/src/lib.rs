//! Lingua API Library Crate
//!
//! This library contains all the core logic for the Lingua tutoring web
//! service: application state, config, the session store, the dialogue
//! engine, API handlers, and routing. The `bin/api.rs` binary is a thin
//! wrapper around this library.

pub mod config;
pub mod engine;
pub mod gate;
pub mod handlers;
pub mod locks;
pub mod models;
pub mod router;
pub mod state;
pub mod store;
