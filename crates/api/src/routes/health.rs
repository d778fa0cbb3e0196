use axum::routing::get;
use axum::Router;

use crate::handlers::health;
use crate::state::AppState;

/// Root-level informational routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health::service_info))
        .route("/health", get(health::health_check))
}
