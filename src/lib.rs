// ABOUTME: Library root for deckhand - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod acme;
pub mod config;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod logs;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod proxy;
pub mod queue;
pub mod runtime;
pub mod source;
pub mod types;
pub mod workspace;
