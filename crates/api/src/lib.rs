//! Motion API server library.
//!
//! Exposes configuration, shared state, error handling, the job engine, and
//! the route tree so integration tests and the binary entrypoint can both
//! build the same application.

pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
