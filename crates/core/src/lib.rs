//! Domain logic for the motion video generation service.
//!
//! Everything in this crate is pure: script segmentation, the typed
//! processing-graph document, the default workflow builder, and the job
//! state machine. Network and filesystem access live in `motion-comfyui`
//! and `motion-api`.

pub mod error;
pub mod graph;
pub mod job;
pub mod naming;
pub mod resolution;
pub mod scene;
pub mod types;
pub mod workflow;
