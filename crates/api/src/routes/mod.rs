pub mod health;
pub mod jobs;

use axum::Router;

use crate::state::AppState;

/// Build the full route tree.
///
/// ```text
/// GET  /                          service descriptor
/// GET  /health                    health check
/// POST /generate                  queue a job
/// GET  /status/{job_id}           job status
/// GET  /download/{job_id}/{*path} stream a job output
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(jobs::router())
}
