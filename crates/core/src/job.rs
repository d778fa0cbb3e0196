//! The caller-visible job record and its state machine.
//!
//! ```text
//! Pending --start--> Processing --complete--> Completed
//!                        |
//!                        +------fail-------> Failed
//! ```
//!
//! `Completed` and `Failed` are terminal. Progress only moves forward
//! while processing and is exactly 100 once completed. Output paths are
//! append-only and deduplicated.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::graph::ProcessingGraph;
use crate::resolution::parse_resolution;
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// Request defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_CLIPS_PER_MINUTE: u32 = 2;
pub const DEFAULT_CLIP_DURATION_SECS: f64 = 6.5;
pub const DEFAULT_STYLE: &str = "cinematic";
pub const DEFAULT_RESOLUTION: &str = "1920x1080";
pub const DEFAULT_FPS: u32 = 30;

/// Upper bound on `fps * clip_duration` for one generated clip.
pub const MAX_FRAMES_PER_CLIP: u32 = 10_000;

/// Progress value of a completed job.
pub const PROGRESS_COMPLETE: f64 = 100.0;

/// Highest progress reported while the job is still processing.
pub const PROGRESS_CEILING_WHILE_PROCESSING: f64 = 99.99;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a [`Job`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// What a job renders. Immutable once the job exists.
#[derive(Debug, Clone, PartialEq)]
pub struct JobParameters {
    pub script: String,
    pub clips_per_minute: u32,
    /// Length of each generated clip in seconds.
    pub clip_duration: f64,
    pub style: String,
    pub resolution: String,
    pub fps: u32,
    /// Caller-supplied graph; bypasses segmentation and the default builder.
    pub workflow: Option<ProcessingGraph>,
}

impl Default for JobParameters {
    fn default() -> Self {
        Self {
            script: String::new(),
            clips_per_minute: DEFAULT_CLIPS_PER_MINUTE,
            clip_duration: DEFAULT_CLIP_DURATION_SECS,
            style: DEFAULT_STYLE.to_string(),
            resolution: DEFAULT_RESOLUTION.to_string(),
            fps: DEFAULT_FPS,
            workflow: None,
        }
    }
}

impl JobParameters {
    /// Reject parameters the default workflow builder could never use.
    ///
    /// Jobs carrying their own workflow skip the builder, so only the
    /// workflow itself (already validated on construction) matters.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.workflow.is_some() {
            return Ok(());
        }
        parse_resolution(&self.resolution)?;
        if self.fps == 0 {
            return Err(CoreError::InvalidFormat(
                "fps must be greater than 0".to_string(),
            ));
        }
        if !self.clip_duration.is_finite() || self.clip_duration <= 0.0 {
            return Err(CoreError::InvalidFormat(format!(
                "clip_duration must be a positive number of seconds, got {}",
                self.clip_duration
            )));
        }
        let frames = f64::from(self.fps) * self.clip_duration;
        if frames.round() > f64::from(MAX_FRAMES_PER_CLIP) {
            return Err(CoreError::InvalidFormat(format!(
                "fps * clip_duration must not exceed {MAX_FRAMES_PER_CLIP} frames, got {frames}"
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// A unit of work tracked from submission to completion or failure.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub parameters: JobParameters,
    status: JobStatus,
    progress: f64,
    units_completed: usize,
    units_total: usize,
    output_files: Vec<String>,
    error: Option<String>,
    pub created_at: Timestamp,
    started_at: Option<Timestamp>,
    finished_at: Option<Timestamp>,
}

impl Job {
    /// Create a pending job with a fresh id.
    pub fn new(parameters: JobParameters) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            parameters,
            status: JobStatus::Pending,
            progress: 0.0,
            units_completed: 0,
            units_total: 0,
            output_files: Vec::new(),
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn units_completed(&self) -> usize {
        self.units_completed
    }

    pub fn units_total(&self) -> usize {
        self.units_total
    }

    pub fn output_files(&self) -> &[String] {
        &self.output_files
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn started_at(&self) -> Option<Timestamp> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<Timestamp> {
        self.finished_at
    }

    /// The recorded relative path `path` refers to. An exact match wins
    /// over a bare-filename match.
    pub fn find_output(&self, path: &str) -> Option<&str> {
        self.output_files
            .iter()
            .find(|recorded| *recorded == path)
            .or_else(|| {
                self.output_files
                    .iter()
                    .find(|recorded| recorded.rsplit('/').next() == Some(path))
            })
            .map(String::as_str)
    }

    /// `Pending -> Processing`.
    pub fn start(&mut self) -> Result<(), CoreError> {
        self.transition(JobStatus::Pending, JobStatus::Processing)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Fix the number of units once segmentation or graph selection is done.
    pub fn set_units_total(&mut self, total: usize) -> Result<(), CoreError> {
        self.require_processing("set_units_total")?;
        self.units_total = total;
        Ok(())
    }

    /// Append output paths, skipping ones already recorded.
    ///
    /// Returns the paths that were newly added.
    pub fn record_outputs<I>(&mut self, paths: I) -> Result<Vec<String>, CoreError>
    where
        I: IntoIterator<Item = String>,
    {
        self.require_processing("record_outputs")?;
        let mut added = Vec::new();
        for path in paths {
            if !self.output_files.contains(&path) {
                self.output_files.push(path.clone());
                added.push(path);
            }
        }
        Ok(added)
    }

    /// Mark one more unit finished and recompute progress.
    ///
    /// Progress stays below 100 until [`complete`](Self::complete), so
    /// `progress == 100` holds exactly when the job is `Completed`.
    pub fn complete_unit(&mut self) -> Result<(), CoreError> {
        self.require_processing("complete_unit")?;
        self.units_completed += 1;
        if self.units_total > 0 {
            let ratio = self.units_completed as f64 / self.units_total as f64;
            let next = (ratio * PROGRESS_COMPLETE).min(PROGRESS_CEILING_WHILE_PROCESSING);
            self.progress = self.progress.max(next);
        }
        Ok(())
    }

    /// `Processing -> Completed`, forcing progress to exactly 100.
    pub fn complete(&mut self) -> Result<(), CoreError> {
        self.transition(JobStatus::Processing, JobStatus::Completed)?;
        self.progress = PROGRESS_COMPLETE;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// `Processing -> Failed`, recording `message` verbatim.
    ///
    /// Outputs recorded by earlier units are kept.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), CoreError> {
        self.transition(JobStatus::Processing, JobStatus::Failed)?;
        self.error = Some(message.into());
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    // ---- private helpers ----

    fn transition(&mut self, from: JobStatus, to: JobStatus) -> Result<(), CoreError> {
        if self.status != from {
            return Err(CoreError::InvalidTransition {
                from: self.status.as_str(),
                to: to.as_str(),
            });
        }
        self.status = to;
        Ok(())
    }

    fn require_processing(&self, operation: &'static str) -> Result<(), CoreError> {
        if self.status != JobStatus::Processing {
            return Err(CoreError::InvalidTransition {
                from: self.status.as_str(),
                to: operation,
            });
        }
        Ok(())
    }
}
