//! Service liveness and descriptor endpoints.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` when ComfyUI answers, `degraded` otherwise.
    pub status: &'static str,
    /// `connected` or `disconnected`.
    pub comfyui: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
}

/// GET /health -- probes ComfyUI's `/system_stats`.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let comfyui_healthy = match state.comfyui.system_stats().await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "ComfyUI health probe failed");
            false
        }
    };

    Json(HealthResponse {
        status: if comfyui_healthy { "healthy" } else { "degraded" },
        comfyui: if comfyui_healthy { "connected" } else { "disconnected" },
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET / -- names the service and lists its endpoints.
pub async fn service_info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "Motion Video Generation API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "POST /generate": "Submit a script or workflow for video generation",
            "GET /status/{job_id}": "Check job status",
            "GET /download/{job_id}/{path}": "Download a generated file",
            "GET /health": "Service health check",
        }
    }))
}
