#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use motion_api::config::ServerConfig;
use motion_api::routes;
use motion_api::state::AppState;

/// Build a test `ServerConfig` pointing at a stub engine on `engine` and
/// writing into `output_dir`, with a fast poll interval.
pub fn test_config(engine: SocketAddr, output_dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        comfyui_host: engine.ip().to_string(),
        comfyui_port: engine.port(),
        output_dir: output_dir.to_path_buf(),
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        engine_timeout_secs: 30,
        engine_poll_interval_ms: 5,
        engine_http_timeout_secs: 5,
    }
}

/// Build the full application router with all middleware layers.
///
/// Mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack that production uses.
pub fn build_test_app(config: ServerConfig) -> Router {
    let state = AppState::from_config(config).unwrap();

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .merge(routes::router())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

/// Send a GET request through the router.
pub async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Send a POST request with a JSON body through the router.
pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Collect a response body into bytes.
pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Poll `GET /status/{job_id}` until the job is completed or failed.
pub async fn wait_for_terminal(app: &Router, job_id: &str) -> serde_json::Value {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let response = get(app.clone(), &format!("/status/{job_id}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let status = body_json(response).await;
        if status["status"] == "completed" || status["status"] == "failed" {
            return status;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {job_id} did not finish: {status}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
