//! Handlers for job submission, status, and output download.

use std::path::Path as FsPath;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use motion_comfyui::collector::is_safe_relative;
use motion_core::error::CoreError;
use motion_core::graph::ProcessingGraph;
use motion_core::job::{
    Job, JobParameters, JobStatus, DEFAULT_CLIPS_PER_MINUTE, DEFAULT_CLIP_DURATION_SECS,
    DEFAULT_FPS, DEFAULT_RESOLUTION, DEFAULT_STYLE,
};
use motion_core::types::JobId;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

/// Body of `POST /generate`.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub script: String,
    #[serde(default = "default_clips_per_minute")]
    pub clips_per_minute: u32,
    #[serde(default = "default_clip_duration")]
    pub clip_duration: f64,
    #[serde(default = "default_style")]
    pub style: String,
    #[serde(default = "default_resolution")]
    pub resolution: String,
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Custom workflow replacing the generated per-scene graphs.
    #[serde(default)]
    pub workflow: Option<serde_json::Value>,
}

fn default_clips_per_minute() -> u32 {
    DEFAULT_CLIPS_PER_MINUTE
}

fn default_clip_duration() -> f64 {
    DEFAULT_CLIP_DURATION_SECS
}

fn default_style() -> String {
    DEFAULT_STYLE.to_string()
}

fn default_resolution() -> String {
    DEFAULT_RESOLUTION.to_string()
}

fn default_fps() -> u32 {
    DEFAULT_FPS
}

impl GenerateRequest {
    /// Convert into job parameters, parsing the custom workflow if any.
    ///
    /// `null` and `{}` count as no workflow.
    pub fn into_parameters(self) -> Result<JobParameters, CoreError> {
        let workflow = match self.workflow {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::Object(map)) if map.is_empty() => None,
            Some(value) => Some(ProcessingGraph::from_json(value)?),
        };
        Ok(JobParameters {
            script: self.script,
            clips_per_minute: self.clips_per_minute,
            clip_duration: self.clip_duration,
            style: self.style,
            resolution: self.resolution,
            fps: self.fps,
            workflow,
        })
    }
}

/// Response of `POST /generate`.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub message: String,
}

/// Response of `GET /status/{job_id}`.
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: f64,
    pub clips_generated: usize,
    pub total_clips: usize,
    pub output_files: Vec<String>,
    pub error: Option<String>,
}

impl From<&Job> for JobStatusResponse {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status(),
            progress: job.progress(),
            clips_generated: job.units_completed(),
            total_clips: job.units_total(),
            output_files: job.output_files().to_vec(),
            error: job.error().map(str::to_string),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Look up a job by its textual id. Unparsable ids are simply unknown.
async fn find_job(state: &AppState, job_id: &str) -> AppResult<Job> {
    let not_found = || {
        AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id.to_string(),
        })
    };
    let id: JobId = job_id.parse().map_err(|_| not_found())?;
    state.jobs.get(id).await.ok_or_else(not_found)
}

/// Guess a Content-Type from a file extension.
fn content_type_for_extension(path: &str) -> &'static str {
    let ext = path.rsplit('.').next().unwrap_or("").to_lowercase();
    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "gif" => "image/gif",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /generate
///
/// Queue a job and return immediately; the work runs in the background.
pub async fn generate(
    State(state): State<AppState>,
    Json(input): Json<GenerateRequest>,
) -> AppResult<Json<GenerateResponse>> {
    let clips_per_minute = input.clips_per_minute;
    let parameters = input.into_parameters()?;
    let custom = parameters.workflow.is_some();

    // The task is detached; its outcome is observed through the job store.
    let (job_id, _handle) = state.orchestrator.submit(parameters).await?;

    let message = if custom {
        "Job queued. Will run the supplied workflow.".to_string()
    } else {
        format!("Job queued. Will generate {clips_per_minute} clips per minute of script.")
    };

    Ok(Json(GenerateResponse {
        job_id,
        status: JobStatus::Pending,
        message,
    }))
}

/// GET /status/{job_id}
pub async fn get_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<JobStatusResponse>> {
    let job = find_job(&state, &job_id).await?;
    Ok(Json(JobStatusResponse::from(&job)))
}

/// GET /download/{job_id}/{*path}
///
/// Streams one of the job's recorded outputs. `path` may be the recorded
/// relative path or just its filename.
pub async fn download(
    State(state): State<AppState>,
    Path((job_id, path)): Path<(String, String)>,
) -> AppResult<Response> {
    if path.is_empty() || !is_safe_relative(FsPath::new(&path)) {
        return Err(AppError::BadRequest(format!("Invalid output path: {path}")));
    }

    let job = find_job(&state, &job_id).await?;
    let not_found = || {
        AppError::Core(CoreError::NotFound {
            entity: "Output file",
            id: path.clone(),
        })
    };

    let recorded = job.find_output(&path).ok_or_else(not_found)?;
    let file_path = state.collector.resolve(recorded).ok_or_else(not_found)?;

    let file = match tokio::fs::File::open(&file_path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(AppError::InternalError(e.to_string())),
    };
    let metadata = file
        .metadata()
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;
    if !metadata.is_file() {
        return Err(not_found());
    }

    let filename = recorded.rsplit('/').next().unwrap_or(recorded);
    tracing::debug!(%job_id, path = %recorded, bytes = metadata.len(), "Serving output file");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for_extension(recorded))
        .header(header::CONTENT_LENGTH, metadata.len().to_string())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| AppError::InternalError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn request(body: serde_json::Value) -> GenerateRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn defaults_apply_to_missing_fields() {
        let params = request(json!({ "script": "hello" })).into_parameters().unwrap();
        assert_eq!(params, JobParameters {
            script: "hello".into(),
            ..JobParameters::default()
        });
    }

    #[test]
    fn empty_workflow_is_absent() {
        let params = request(json!({ "script": "x", "workflow": {} }))
            .into_parameters()
            .unwrap();
        assert!(params.workflow.is_none());
    }

    #[test]
    fn invalid_workflow_is_format_error() {
        let result = request(json!({
            "workflow": { "1": { "class_type": "A", "inputs": { "x": ["2", 0] } } }
        }))
        .into_parameters();
        assert_matches!(result, Err(CoreError::InvalidFormat(_)));
    }

    #[test]
    fn content_types_by_extension() {
        assert_eq!(content_type_for_extension("a/b.webp"), "image/webp");
        assert_eq!(content_type_for_extension("clip.MP4"), "video/mp4");
        assert_eq!(content_type_for_extension("noext"), "application/octet-stream");
    }
}
