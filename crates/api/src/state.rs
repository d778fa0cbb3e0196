use std::sync::Arc;
use std::time::Duration;

use motion_comfyui::api::ComfyUIApi;
use motion_comfyui::collector::OutputCollector;
use motion_comfyui::executor::WorkflowExecutor;

use crate::config::ServerConfig;
use crate::engine::{JobOrchestrator, JobStore};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: every field is either behind `Arc` or a handle.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// In-memory job records, keyed by job id.
    pub jobs: JobStore,
    /// Runs submitted jobs in the background.
    pub orchestrator: JobOrchestrator,
    /// Resolves download paths inside the output directory.
    pub collector: Arc<OutputCollector>,
    /// ComfyUI REST client, used by the health probe.
    pub comfyui: ComfyUIApi,
}

impl AppState {
    /// Wire up the job store, executor, and collector from `config`.
    ///
    /// Fails only if the HTTP client toward ComfyUI cannot be built.
    pub fn from_config(config: ServerConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.engine_http_timeout_secs))
            .build()?;
        let comfyui = ComfyUIApi::with_client(client, config.comfyui_url());
        let executor = WorkflowExecutor::new(comfyui.clone(), config.executor_config());
        let collector = Arc::new(OutputCollector::new(config.output_dir.clone()));
        let jobs = JobStore::new();
        let orchestrator = JobOrchestrator::new(jobs.clone(), executor, Arc::clone(&collector));

        Ok(Self {
            config: Arc::new(config),
            jobs,
            orchestrator,
            collector,
            comfyui,
        })
    }
}
