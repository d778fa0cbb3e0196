//! Submit-and-poll behaviour against a stub ComfyUI server.

use std::time::Duration;

use assert_matches::assert_matches;
use motion_comfyui::api::ComfyUIApi;
use motion_comfyui::executor::{EngineError, ExecutorConfig, WorkflowExecutor};
use motion_core::graph::ProcessingGraph;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROMPT_ID: &str = "prompt-1";

fn fast_config() -> ExecutorConfig {
    ExecutorConfig {
        poll_interval: Duration::from_millis(5),
        ..ExecutorConfig::default()
    }
}

fn executor(server: &MockServer, config: ExecutorConfig) -> WorkflowExecutor {
    WorkflowExecutor::new(ComfyUIApi::new(server.uri()), config)
}

fn graph() -> ProcessingGraph {
    ProcessingGraph::from_json(json!({
        "1": { "class_type": "SaveVideo", "inputs": { "filename_prefix": "clip" } }
    }))
    .unwrap()
}

async fn mount_enqueue(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/prompt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "prompt_id": PROMPT_ID,
            "number": 3,
            "node_errors": {}
        })))
        .mount(server)
        .await;
}

fn history_path() -> String {
    format!("/history/{PROMPT_ID}")
}

fn finished_history() -> serde_json::Value {
    json!({
        PROMPT_ID: {
            "outputs": {
                "1": { "videos": [{ "filename": "clip_00001.mp4", "subfolder": "", "type": "output" }] }
            },
            "status": { "status_str": "success", "completed": true, "messages": [] }
        }
    })
}

#[tokio::test]
async fn returns_history_entry_when_prompt_finishes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/prompt"))
        .and(body_partial_json(json!({ "client_id": "job-42" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "prompt_id": PROMPT_ID })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(history_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(finished_history()))
        .mount(&server)
        .await;

    let entry = executor(&server, fast_config())
        .execute(&graph(), "job-42")
        .await
        .unwrap();

    assert_eq!(entry.artifact_count(), 1);
    assert_eq!(
        entry.outputs["1"].videos[0].filename.as_deref(),
        Some("clip_00001.mp4")
    );
}

#[tokio::test]
async fn enqueue_failure_is_terminal_and_skips_polling() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/prompt"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid prompt: missing node"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let err = executor(&server, fast_config())
        .execute(&graph(), "job")
        .await
        .unwrap_err();

    assert_matches!(err, EngineError::Execution(msg) if msg.contains("invalid prompt: missing node"));
}

#[tokio::test]
async fn waits_through_pending_polls() {
    let server = MockServer::start().await;
    mount_enqueue(&server).await;
    Mock::given(method("GET"))
        .and(path(history_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(history_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(finished_history()))
        .expect(1)
        .mount(&server)
        .await;

    let entry = executor(&server, fast_config())
        .execute(&graph(), "job")
        .await
        .unwrap();
    assert_eq!(entry.artifact_count(), 1);
}

#[tokio::test]
async fn sustained_poll_errors_time_out_early() {
    let server = MockServer::start().await;
    mount_enqueue(&server).await;
    Mock::given(method("GET"))
        .and(path(history_path()))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(90)
        .mount(&server)
        .await;

    let err = executor(&server, fast_config())
        .execute(&graph(), "job")
        .await
        .unwrap_err();

    assert_matches!(
        err,
        EngineError::Timeout(msg) if msg.contains("90 consecutive polling errors")
    );
}

#[tokio::test]
async fn not_found_polls_count_as_errors() {
    let server = MockServer::start().await;
    mount_enqueue(&server).await;
    Mock::given(method("GET"))
        .and(path(history_path()))
        .respond_with(ResponseTemplate::new(404))
        .expect(4)
        .mount(&server)
        .await;

    let config = ExecutorConfig {
        max_consecutive_errors: 4,
        ..fast_config()
    };
    let err = executor(&server, config)
        .execute(&graph(), "job")
        .await
        .unwrap_err();

    assert_matches!(err, EngineError::Timeout(_));
}

#[tokio::test]
async fn pending_poll_resets_error_counter() {
    let server = MockServer::start().await;
    mount_enqueue(&server).await;
    Mock::given(method("GET"))
        .and(path(history_path()))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(history_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(history_path()))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(history_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(finished_history()))
        .mount(&server)
        .await;

    let config = ExecutorConfig {
        max_consecutive_errors: 3,
        ..fast_config()
    };
    let entry = executor(&server, config)
        .execute(&graph(), "job")
        .await
        .unwrap();
    assert_eq!(entry.artifact_count(), 1);
}

#[tokio::test]
async fn malformed_history_body_counts_as_error() {
    let server = MockServer::start().await;
    mount_enqueue(&server).await;
    Mock::given(method("GET"))
        .and(path(history_path()))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .expect(2)
        .mount(&server)
        .await;

    let config = ExecutorConfig {
        max_consecutive_errors: 2,
        ..fast_config()
    };
    let err = executor(&server, config)
        .execute(&graph(), "job")
        .await
        .unwrap_err();
    assert_matches!(err, EngineError::Timeout(_));
}

#[tokio::test]
async fn non_object_history_body_counts_as_error() {
    for body in [json!(null), json!([]), json!("x")] {
        let server = MockServer::start().await;
        mount_enqueue(&server).await;
        Mock::given(method("GET"))
            .and(path(history_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
            .expect(3)
            .mount(&server)
            .await;

        let config = ExecutorConfig {
            max_consecutive_errors: 3,
            max_wait: Duration::from_secs(30),
            ..fast_config()
        };
        let err = executor(&server, config)
            .execute(&graph(), "job")
            .await
            .unwrap_err();
        assert_matches!(
            err,
            EngineError::Timeout(msg) if msg.contains("3 consecutive polling errors"),
            "body {body} must not reset the error counter"
        );
    }
}

#[tokio::test]
async fn wall_clock_bound_times_out() {
    let server = MockServer::start().await;
    mount_enqueue(&server).await;
    Mock::given(method("GET"))
        .and(path(history_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let config = ExecutorConfig {
        poll_interval: Duration::from_millis(10),
        max_wait: Duration::from_millis(60),
        ..ExecutorConfig::default()
    };
    let err = executor(&server, config)
        .execute(&graph(), "job")
        .await
        .unwrap_err();

    assert_matches!(err, EngineError::Timeout(msg) if msg.contains("timed out"));
}

#[tokio::test]
async fn engine_reported_failure_is_execution_error() {
    let server = MockServer::start().await;
    mount_enqueue(&server).await;
    Mock::given(method("GET"))
        .and(path(history_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            PROMPT_ID: {
                "outputs": {},
                "status": {
                    "status_str": "error",
                    "completed": false,
                    "messages": [["execution_error", { "node_id": "1", "exception_message": "model not found" }]]
                }
            }
        })))
        .mount(&server)
        .await;

    let err = executor(&server, fast_config())
        .execute(&graph(), "job")
        .await
        .unwrap_err();

    assert_matches!(err, EngineError::Execution(msg) if msg.contains("model not found"));
}

#[tokio::test]
async fn unreachable_engine_is_network_error() {
    // Bind then drop a listener to get a port nothing is serving.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = ComfyUIApi::new(format!("http://{addr}"));
    let err = WorkflowExecutor::new(api, fast_config())
        .execute(&graph(), "job")
        .await
        .unwrap_err();

    assert_matches!(err, EngineError::Network(_));
}
