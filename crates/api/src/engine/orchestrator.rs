//! Background execution of submitted jobs.
//!
//! Each job gets one Tokio task. A job with a caller-supplied workflow is a
//! single unit of work; otherwise the script is segmented into scenes and
//! every scene is built, executed, and collected strictly in order. The
//! first error of any stage fails the job with that error's message.

use std::sync::Arc;
use std::time::SystemTime;

use motion_comfyui::collector::OutputCollector;
use motion_comfyui::executor::{EngineError, WorkflowExecutor};
use motion_core::error::CoreError;
use motion_core::graph::ProcessingGraph;
use motion_core::job::{Job, JobParameters};
use motion_core::scene::segment;
use motion_core::types::JobId;
use motion_core::workflow::build_scene_workflow;
use tokio::task::JoinHandle;

use super::store::JobStore;

/// Anything that stops a job. The `Display` text is what the job records.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Failed to scan output directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Creates jobs and runs them to completion or failure.
#[derive(Clone)]
pub struct JobOrchestrator {
    store: JobStore,
    executor: Arc<WorkflowExecutor>,
    collector: Arc<OutputCollector>,
}

impl JobOrchestrator {
    pub fn new(
        store: JobStore,
        executor: WorkflowExecutor,
        collector: Arc<OutputCollector>,
    ) -> Self {
        Self {
            store,
            executor: Arc::new(executor),
            collector,
        }
    }

    /// Validate `parameters`, register a pending job, and start it.
    ///
    /// Returns as soon as the job is stored; the handle resolves when the
    /// job reaches a terminal state.
    pub async fn submit(
        &self,
        parameters: JobParameters,
    ) -> Result<(JobId, JoinHandle<()>), CoreError> {
        parameters.validate()?;

        let job = Job::new(parameters);
        let job_id = job.id;
        let custom = job.parameters.workflow.is_some();
        self.store.insert(job).await;
        tracing::info!(%job_id, custom_workflow = custom, "Job queued");

        let this = self.clone();
        let handle = tokio::spawn(async move { this.run(job_id).await });
        Ok((job_id, handle))
    }

    async fn run(&self, job_id: JobId) {
        let started = SystemTime::now();

        let parameters = match self
            .store
            .update(job_id, |job| {
                job.start()?;
                Ok(job.parameters.clone())
            })
            .await
        {
            Ok(parameters) => parameters,
            Err(e) => {
                tracing::error!(%job_id, error = %e, "Job could not be started");
                return;
            }
        };
        tracing::info!(%job_id, "Job started");

        let outcome = match &parameters.workflow {
            Some(graph) => self.run_custom(job_id, graph, started).await,
            None => self.run_script(job_id, &parameters).await,
        };

        let finished = match outcome {
            Ok(()) => self.store.update(job_id, |job| job.complete()).await,
            Err(e) => {
                let message = e.to_string();
                tracing::error!(%job_id, error = %message, "Job failed");
                self.store.update(job_id, |job| job.fail(message)).await
            }
        };

        match finished {
            Ok(()) => {
                if let Some(job) = self.store.get(job_id).await {
                    tracing::info!(
                        %job_id,
                        status = %job.status(),
                        outputs = job.output_files().len(),
                        "Job finished",
                    );
                }
            }
            Err(e) => tracing::error!(%job_id, error = %e, "Job could not be finalized"),
        }
    }

    /// One unit of work: execute the caller's graph, then fall back to the
    /// output directory if the engine reported no artifacts.
    async fn run_custom(
        &self,
        job_id: JobId,
        graph: &ProcessingGraph,
        started: SystemTime,
    ) -> Result<(), JobError> {
        self.store.update(job_id, |job| job.set_units_total(1)).await?;

        let entry = self.executor.execute(graph, &job_id.to_string()).await?;
        let mut outputs = self.collector.collect(&entry);

        if outputs.is_empty() {
            tracing::warn!(%job_id, "Workflow returned no outputs");
            outputs = self.collector.collect_from_disk(graph, started).await?;
            if !outputs.is_empty() {
                tracing::info!(%job_id, files = ?outputs, "Collected fallback outputs from disk");
            }
        }

        self.record_unit(job_id, outputs).await?;
        Ok(())
    }

    /// One unit per scene, in script order.
    async fn run_script(&self, job_id: JobId, parameters: &JobParameters) -> Result<(), JobError> {
        let scenes = segment(&parameters.script, parameters.clips_per_minute);
        let total = scenes.len();
        self.store
            .update(job_id, |job| job.set_units_total(total))
            .await?;
        tracing::debug!(%job_id, scenes = total, "Script segmented");

        for scene in &scenes {
            let graph = build_scene_workflow(
                scene,
                &parameters.style,
                &parameters.resolution,
                parameters.fps,
                parameters.clip_duration,
            )?;
            let entry = self.executor.execute(&graph, &job_id.to_string()).await?;
            let outputs = self.collector.collect(&entry);
            let added = self.record_unit(job_id, outputs).await?;

            tracing::info!(
                %job_id,
                scene_index = scene.index,
                total,
                new_outputs = added,
                "Scene completed",
            );
        }
        Ok(())
    }

    /// Append a unit's outputs and advance progress in one store update.
    async fn record_unit(&self, job_id: JobId, outputs: Vec<String>) -> Result<usize, CoreError> {
        let added = self
            .store
            .update(job_id, |job| {
                let added = job.record_outputs(outputs)?;
                job.complete_unit()?;
                Ok(added)
            })
            .await?;
        for path in &added {
            tracing::info!(%job_id, path = %path, "Recorded workflow output");
        }
        Ok(added.len())
    }
}
