//! Scrape job endpoints

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::models::{Job, SongSubmission};
use crate::AppState;

/// Request body for POST /api/scrape
#[derive(Debug, Deserialize)]
pub struct ScrapeRequest {
    pub user_id: i64,
    pub songs: Vec<SongSubmission>,
}

/// Response for POST /api/scrape
#[derive(Debug, Serialize)]
pub struct ScrapeResponse {
    pub job_id: String,
    pub status: String,
    pub songs_count: usize,
}

/// POST /api/scrape - submit a batch of songs as a new job
pub async fn submit_scrape(
    State(state): State<AppState>,
    Json(request): Json<ScrapeRequest>,
) -> ApiResult<impl IntoResponse> {
    let songs_count = request.songs.len();
    let job_id = state
        .job_manager
        .submit(request.user_id, request.songs)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ScrapeResponse {
            job_id,
            status: "queued".to_string(),
            songs_count,
        }),
    ))
}

/// GET /api/job/{job_id} - job status with per-phase progress
pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let view = state.job_manager.status(&job_id).await?;
    Ok(Json(view))
}

/// Response for GET /api/jobs/user/{user_id}
#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<Job>,
}

/// GET /api/jobs/user/{user_id} - all jobs for a user, newest first
pub async fn jobs_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let jobs = state.job_manager.list_for_user(user_id).await?;
    Ok(Json(JobListResponse { jobs }))
}

/// POST /api/job/{job_id}/cancel - request cooperative cancellation
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.job_manager.cancel(&job_id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "job_id": job_id,
            "status": "cancelling",
        })),
    ))
}

/// GET /api/download/{job_id} - download the completed bundle
///
/// Returns 400 for a job that is not completed and 404 when the bundle
/// has been retired by the sweeper.
pub async fn download_bundle(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let (filename, bytes) = state
        .job_manager
        .download(&job_id)
        .await
        .map_err(|e| match e {
            songdrop_common::Error::InvalidState(msg) => ApiError::BadRequest(msg),
            other => ApiError::from(other),
        })?;

    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        ),
    ];
    Ok((headers, bytes))
}
