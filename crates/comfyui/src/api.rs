//! REST API client for the ComfyUI HTTP endpoints.
//!
//! Wraps the ComfyUI HTTP API (workflow submission, history retrieval,
//! system stats) using [`reqwest`].

use std::time::Duration;

use motion_core::graph::ProcessingGraph;
use serde::Deserialize;

use crate::history::HistoryEntry;

/// Upper bound on the `/system_stats` liveness probe.
const SYSTEM_STATS_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client for a single ComfyUI instance.
#[derive(Debug, Clone)]
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
}

/// Response returned by the ComfyUI `/prompt` endpoint after
/// successfully queuing a workflow.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued prompt.
    pub prompt_id: String,
    /// Position in the execution queue.
    #[serde(default)]
    pub number: Option<i64>,
}

/// Outcome of a single `/history/{prompt_id}` request.
#[derive(Debug)]
pub enum HistoryPoll {
    /// The prompt has finished and its history entry is available.
    Ready(HistoryEntry),
    /// ComfyUI answered cleanly but does not know the prompt yet.
    Pending,
}

/// Errors from the ComfyUI REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIApiError {
    /// The HTTP request itself failed (network, DNS, TLS, body decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// ComfyUI returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A 2xx response carried a payload that does not match the expected shape.
    #[error("Malformed ComfyUI response: {0}")]
    Malformed(String),
}

impl ComfyUIApi {
    /// Create a new API client for a ComfyUI instance.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8188`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (useful to share a connection pool or set request timeouts).
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    /// Submit a workflow for execution.
    ///
    /// Sends a `POST /prompt` request with the given workflow and client
    /// ID. Returns the server-assigned `prompt_id` and queue position.
    pub async fn submit_workflow(
        &self,
        workflow: &ProcessingGraph,
        client_id: &str,
    ) -> Result<SubmitResponse, ComfyUIApiError> {
        let body = serde_json::json!({
            "prompt": workflow,
            "client_id": client_id,
        });

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Retrieve execution history for a specific prompt.
    ///
    /// Sends a `GET /history/{prompt_id}` request. ComfyUI answers `{}`
    /// until the prompt has finished, then `{prompt_id: entry}`. Any body
    /// that is not a JSON object is [`ComfyUIApiError::Malformed`].
    pub async fn get_history(&self, prompt_id: &str) -> Result<HistoryPoll, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.api_url, prompt_id))
            .send()
            .await?;

        let mut history = match Self::parse_response::<serde_json::Value>(response).await? {
            serde_json::Value::Object(history) => history,
            other => {
                return Err(ComfyUIApiError::Malformed(format!(
                    "history for {prompt_id} is not an object: {other}"
                )))
            }
        };

        match history.remove(prompt_id) {
            Some(entry) => {
                let entry: HistoryEntry = serde_json::from_value(entry).map_err(|e| {
                    ComfyUIApiError::Malformed(format!("history entry for {prompt_id}: {e}"))
                })?;
                Ok(HistoryPoll::Ready(entry))
            }
            None => Ok(HistoryPoll::Pending),
        }
    }

    /// Fetch `GET /system_stats`, used as a liveness probe.
    pub async fn system_stats(&self) -> Result<serde_json::Value, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/system_stats", self.api_url))
            .timeout(SYSTEM_STATS_TIMEOUT)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ComfyUIApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyUIApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComfyUIApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ComfyUIApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}
