//! songdrop-sd library interface
//!
//! Exposes the orchestration engine and HTTP surface for integration
//! testing.

pub mod api;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;

use songdrop_common::events::EventBus;

use crate::engine::{JobManager, SessionManager};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Job lifecycle orchestrator
    pub job_manager: JobManager,
    /// Add-song session orchestrator
    pub session_manager: SessionManager,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        job_manager: JobManager,
        session_manager: SessionManager,
    ) -> Self {
        Self {
            db,
            event_bus,
            job_manager,
            session_manager,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    Router::new()
        .route("/api/scrape", post(api::jobs::submit_scrape))
        .route("/api/job/:job_id", get(api::jobs::job_status))
        .route("/api/job/:job_id/cancel", post(api::jobs::cancel_job))
        .route("/api/jobs/user/:user_id", get(api::jobs::jobs_for_user))
        .route("/api/download/:job_id", get(api::jobs::download_bundle))
        .route(
            "/api/session/:user_id/start",
            post(api::sessions::start_session),
        )
        .route(
            "/api/session/:user_id/field",
            post(api::sessions::submit_field),
        )
        .route(
            "/api/session/:user_id/confirm",
            post(api::sessions::confirm_song),
        )
        .route(
            "/api/session/:user_id/cancel",
            post(api::sessions::cancel_session),
        )
        .route(
            "/api/session/:user_id/queue",
            get(api::sessions::get_queue).delete(api::sessions::clear_queue),
        )
        .route("/api/events", get(api::sse::event_stream))
        .route("/health", get(api::health::health_check))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
