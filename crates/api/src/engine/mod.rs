//! Job execution engine.
//!
//! Holds the in-memory job store and the orchestrator that drives each
//! submitted job through segmentation, workflow execution on ComfyUI, and
//! output collection in a background task.

pub mod orchestrator;
pub mod store;

pub use orchestrator::{JobError, JobOrchestrator};
pub use store::JobStore;
