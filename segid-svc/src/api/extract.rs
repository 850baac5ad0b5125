//! Job submission and polling endpoints
//!
//! - `POST /api/extract` submits a URL and returns its task id
//! - `GET /api/status/:taskId` reports progress
//! - `GET /api/result/:taskId` returns the compiled result or the error

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{Job, JobResult, JobStatus};
use crate::AppState;

/// POST /api/extract request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractRequest {
    #[serde(default)]
    pub video_url: Option<String>,
}

/// POST /api/extract response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractResponse {
    pub task_id: Uuid,
    pub status: JobStatus,
}

/// GET /api/status response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub task_id: Uuid,
    pub status: JobStatus,
    pub progress: u8,
    pub download_progress: u8,
    pub created_at: DateTime<Utc>,
}

/// GET /api/result response; exactly one of the optional fields is set
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultResponse {
    pub task_id: Uuid,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
}

/// Accept only absolute http(s) URLs with a host
pub fn validate_source_url(raw: &str) -> Result<url::Url, ApiError> {
    let parsed = url::Url::parse(raw.trim())
        .map_err(|_| ApiError::BadRequest("Invalid URL".to_string()))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::BadRequest(
            "URL must use http or https".to_string(),
        ));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(ApiError::BadRequest("URL must include a host".to_string()));
    }
    Ok(parsed)
}

/// POST /api/extract
pub async fn extract(
    State(state): State<AppState>,
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> ApiResult<Json<ExtractResponse>> {
    let Json(request) =
        payload.map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))?;
    let raw = request
        .video_url
        .ok_or_else(|| ApiError::BadRequest("videoUrl is required".to_string()))?;
    let url = validate_source_url(&raw)?;

    let task_id = state.pipeline.submit(url.as_str());
    info!(job_id = %task_id, url = %url, "Extraction requested");

    Ok(Json(ExtractResponse {
        task_id,
        status: JobStatus::Processing,
    }))
}

/// GET /api/status/:taskId
pub async fn status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let job = find_job(&state, &task_id)?;
    Ok(Json(StatusResponse {
        task_id: job.id,
        status: job.status,
        progress: job.progress,
        download_progress: job.download_progress,
        created_at: job.created_at,
    }))
}

/// GET /api/result/:taskId
///
/// Failed jobs answer 500 with the stored user-facing error.
pub async fn result(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Response> {
    let job = find_job(&state, &task_id)?;

    let mut body = ResultResponse {
        task_id: job.id,
        status: job.status,
        result: None,
        error: None,
        progress: None,
    };

    let status_code = match job.status {
        JobStatus::Completed => {
            body.result = job.result;
            StatusCode::OK
        }
        JobStatus::Failed => {
            body.error = job.error;
            StatusCode::INTERNAL_SERVER_ERROR
        }
        JobStatus::Queued | JobStatus::Processing => {
            body.progress = Some(job.progress);
            StatusCode::OK
        }
    };

    Ok((status_code, Json(body)).into_response())
}

fn find_job(state: &AppState, task_id: &str) -> ApiResult<Job> {
    Uuid::parse_str(task_id)
        .ok()
        .and_then(|id| state.jobs.get(&id))
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))
}

/// Build job routes
pub fn extract_routes() -> Router<AppState> {
    Router::new()
        .route("/api/extract", post(extract))
        .route("/api/status/:task_id", get(status))
        .route("/api/result/:task_id", get(result))
}
