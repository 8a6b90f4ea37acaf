//! Lingua Core
//!
//! Domain logic for the Lingua tutoring engine: the role-play state machine,
//! the language-generation provider abstraction (external client, deterministic
//! fallback, and the silent-fallback router), response normalization, prompt
//! construction, and session scoring. This crate has no web or database
//! dependencies; the `lingua-api` service wires it to HTTP and storage.

pub mod catalog;
pub mod prompt;
pub mod provider;
pub mod roleplay;
pub mod scenario;
pub mod scoring;
pub mod types;
