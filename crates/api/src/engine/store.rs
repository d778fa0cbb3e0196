use std::collections::HashMap;
use std::sync::Arc;

use motion_core::error::CoreError;
use motion_core::job::Job;
use motion_core::types::JobId;
use tokio::sync::RwLock;

/// Process-local job records keyed by id.
///
/// Readers get cloned snapshots; all mutation goes through
/// [`update`](Self::update), which holds the write lock for the duration of
/// the closure, so no reader ever observes a half-applied change.
#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<JobId, Job>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job.
    pub async fn insert(&self, job: Job) {
        self.jobs.write().await.insert(job.id, job);
    }

    /// Snapshot of the job with `id`.
    pub async fn get(&self, id: JobId) -> Option<Job> {
        self.jobs.read().await.get(&id).cloned()
    }

    /// Apply `f` to the job with `id` under the write lock.
    pub async fn update<F, R>(&self, id: JobId, f: F) -> Result<R, CoreError>
    where
        F: FnOnce(&mut Job) -> Result<R, CoreError>,
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or_else(|| CoreError::NotFound {
            entity: "Job",
            id: id.to_string(),
        })?;
        f(job)
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    #[cfg(test)]
    async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}
