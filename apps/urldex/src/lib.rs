//! # urldex application library
//!
//! Exposes the HTTP API and CLI modules so integration tests can build
//! the router without spawning a real server.

pub mod api;
pub mod cli;
