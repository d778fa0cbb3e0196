//! Route definitions for job submission and retrieval.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// ```text
/// POST   /generate                   -> generate
/// GET    /status/{job_id}            -> get_status
/// GET    /download/{job_id}/{*path}  -> download
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate", post(jobs::generate))
        .route("/status/{job_id}", get(jobs::get_status))
        .route("/download/{job_id}/{*path}", get(jobs::download))
}
