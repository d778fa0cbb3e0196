//! ComfyUI REST client library.
//!
//! Provides the HTTP API wrapper, typed history payloads, the
//! submit-and-poll executor that turns one workflow run into a single
//! awaitable call, and output collection from history payloads or from
//! the shared output directory.

pub mod api;
pub mod collector;
pub mod executor;
pub mod history;
