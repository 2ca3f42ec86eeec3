//! Add-song session endpoints

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::models::{Session, SongSubmission};
use crate::AppState;

/// Session view returned by every session endpoint
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: i64,
    pub state: String,
    pub queued_songs: usize,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            user_id: session.user_id,
            state: session.state.as_str().to_string(),
            queued_songs: session.queue.len(),
        }
    }
}

/// POST /api/session/{user_id}/start - begin an add-song conversation
pub async fn start_session(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let session = state.session_manager.start(user_id).await?;
    Ok(Json(SessionResponse::from(session)))
}

/// Request body for POST .../field
#[derive(Debug, Deserialize)]
pub struct FieldRequest {
    pub value: String,
}

/// POST /api/session/{user_id}/field - submit the next conversation field
pub async fn submit_field(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(request): Json<FieldRequest>,
) -> ApiResult<impl IntoResponse> {
    let session = state
        .session_manager
        .submit_field(user_id, &request.value)
        .await?;
    Ok(Json(SessionResponse::from(session)))
}

/// POST /api/session/{user_id}/confirm - queue the drafted song
pub async fn confirm_song(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let session = state.session_manager.confirm(user_id).await?;
    Ok(Json(SessionResponse::from(session)))
}

/// POST /api/session/{user_id}/cancel - abandon the current draft
pub async fn cancel_session(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let session = state.session_manager.cancel(user_id).await?;
    Ok(Json(SessionResponse::from(session)))
}

/// Response for GET .../queue
#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub songs: Vec<SongSubmission>,
}

/// GET /api/session/{user_id}/queue - the confirmed songs waiting to run
pub async fn get_queue(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let songs = state.session_manager.queue(user_id).await?;
    Ok(Json(QueueResponse { songs }))
}

/// DELETE /api/session/{user_id}/queue - drop all queued songs
pub async fn clear_queue(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let dropped = state.session_manager.take_queue(user_id).await?;
    Ok(Json(serde_json::json!({
        "cleared": dropped.len(),
    })))
}
