//! Submit-and-wait execution of a single workflow.
//!
//! [`WorkflowExecutor::execute`] queues a [`ProcessingGraph`] on ComfyUI
//! and polls `/history/{prompt_id}` until the prompt's entry appears.
//! Two bounds stop the wait: an overall wall-clock limit, and a cap on
//! consecutive failed polls. A clean "not yet present" answer resets the
//! failure counter; an HTTP error status (404 included), a transport
//! error, or an unparsable body increments it.

use std::time::Duration;

use motion_core::graph::ProcessingGraph;
use tokio::time::Instant;

use crate::api::{ComfyUIApi, ComfyUIApiError, HistoryPoll};
use crate::history::HistoryEntry;

/// Delay between two history polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Overall bound on one execution, long enough for overnight queues.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(36_000);

/// Consecutive failed polls tolerated before giving up (~3 minutes at
/// the default interval).
pub const MAX_CONSECUTIVE_POLL_ERRORS: u32 = 90;

/// Tunables for [`WorkflowExecutor`].
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub poll_interval: Duration,
    pub max_wait: Duration,
    pub max_consecutive_errors: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
            max_consecutive_errors: MAX_CONSECUTIVE_POLL_ERRORS,
        }
    }
}

/// Failure of one workflow execution.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine could not be reached while queuing the workflow.
    #[error("Network error: {0}")]
    Network(String),

    /// The engine rejected or failed the workflow.
    #[error("Execution error: {0}")]
    Execution(String),

    /// The wait bound or the consecutive poll error bound was exceeded.
    #[error("Timeout: {0}")]
    Timeout(String),
}

/// Runs workflows on one ComfyUI instance.
#[derive(Debug, Clone)]
pub struct WorkflowExecutor {
    api: ComfyUIApi,
    config: ExecutorConfig,
}

impl WorkflowExecutor {
    pub fn new(api: ComfyUIApi, config: ExecutorConfig) -> Self {
        Self { api, config }
    }

    /// Queue `graph` under `client_id` and wait for its history entry.
    ///
    /// A failed enqueue is terminal; it is never retried.
    pub async fn execute(
        &self,
        graph: &ProcessingGraph,
        client_id: &str,
    ) -> Result<HistoryEntry, EngineError> {
        let submitted = self
            .api
            .submit_workflow(graph, client_id)
            .await
            .map_err(|e| match e {
                ComfyUIApiError::ApiError { status, body } => {
                    EngineError::Execution(format!("Failed to queue prompt ({status}): {body}"))
                }
                ComfyUIApiError::Request(e) if e.is_decode() => {
                    EngineError::Execution(format!("Invalid response to queued prompt: {e}"))
                }
                ComfyUIApiError::Request(e) => {
                    EngineError::Network(format!("Failed to reach ComfyUI: {e}"))
                }
                ComfyUIApiError::Malformed(msg) => EngineError::Execution(msg),
            })?;

        tracing::info!(
            client_id,
            prompt_id = %submitted.prompt_id,
            queue_number = ?submitted.number,
            "Workflow queued",
        );

        self.wait_for_history(&submitted.prompt_id).await
    }

    async fn wait_for_history(&self, prompt_id: &str) -> Result<HistoryEntry, EngineError> {
        let started = Instant::now();
        let mut consecutive_errors: u32 = 0;

        while started.elapsed() < self.config.max_wait {
            match self.api.get_history(prompt_id).await {
                Ok(HistoryPoll::Ready(entry)) => {
                    if entry.is_error() {
                        let detail = entry
                            .error_message()
                            .unwrap_or_else(|| "no error details reported".to_string());
                        return Err(EngineError::Execution(format!(
                            "Prompt {prompt_id} failed: {detail}"
                        )));
                    }
                    tracing::info!(
                        prompt_id,
                        artifacts = entry.artifact_count(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Workflow finished",
                    );
                    return Ok(entry);
                }
                Ok(HistoryPoll::Pending) => {
                    consecutive_errors = 0;
                }
                Err(ComfyUIApiError::ApiError { status, body }) => {
                    consecutive_errors += 1;
                    if status != 404 {
                        tracing::warn!(
                            prompt_id,
                            status,
                            body = %body,
                            consecutive_errors,
                            "Unexpected status while polling ComfyUI history",
                        );
                    }
                }
                Err(e) => {
                    consecutive_errors += 1;
                    tracing::warn!(
                        prompt_id,
                        error = %e,
                        consecutive_errors,
                        "Error while polling ComfyUI history",
                    );
                }
            }

            if consecutive_errors >= self.config.max_consecutive_errors {
                return Err(EngineError::Timeout(format!(
                    "Exceeded {consecutive_errors} consecutive polling errors for prompt {prompt_id}"
                )));
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }

        Err(EngineError::Timeout(format!(
            "Workflow execution timed out after {} seconds",
            self.config.max_wait.as_secs_f64()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_production_bounds() {
        let config = ExecutorConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.max_wait, Duration::from_secs(10 * 60 * 60));
        assert_eq!(config.max_consecutive_errors, 90);
    }

    #[test]
    fn error_bound_spans_about_three_minutes() {
        let window = DEFAULT_POLL_INTERVAL * MAX_CONSECUTIVE_POLL_ERRORS;
        assert_eq!(window, Duration::from_secs(180));
    }
}
