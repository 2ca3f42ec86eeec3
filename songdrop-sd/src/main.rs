//! songdrop-sd - Scrape Director service
//!
//! Orchestrates song-scrape jobs: batch submission, a bounded worker
//! pool fetching lyrics and audio, per-phase progress over SSE, bundle
//! archiving, and TTL-based artifact retirement.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use songdrop_common::events::EventBus;
use songdrop_sd::config::SdConfig;
use songdrop_sd::engine::{JobManager, SessionManager, StorageSweeper, WorkerPool};
use songdrop_sd::services::{FsBlobStore, HttpFetcher};
use songdrop_sd::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting songdrop-sd (Scrape Director)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = SdConfig::load()?;
    std::fs::create_dir_all(&config.data_dir)?;
    info!("Data directory: {}", config.data_dir.display());

    let db_pool = songdrop_sd::db::init_database_pool(&config.db_path()).await?;
    info!("Database connection established");

    let event_bus = EventBus::new(100);

    let blob_store = Arc::new(FsBlobStore::new(config.blob_root()));
    let fetcher = Arc::new(HttpFetcher::new(
        Duration::from_secs(config.fetch_timeout_secs),
        Duration::from_secs(config.download_timeout_secs),
        config.fetch_retries,
    )?);

    let worker_pool = WorkerPool::new(
        db_pool.clone(),
        fetcher,
        blob_store.clone(),
        event_bus.clone(),
        config.max_workers,
    );
    let job_manager = JobManager::new(
        db_pool.clone(),
        blob_store.clone(),
        worker_pool,
        event_bus.clone(),
        config.max_batch_size,
    );
    let session_manager = SessionManager::new(db_pool.clone());

    let shutdown = CancellationToken::new();
    let sweeper = StorageSweeper::new(
        db_pool.clone(),
        blob_store,
        event_bus.clone(),
        Duration::from_secs(config.artifact_ttl_secs),
        Duration::from_secs(config.sweep_interval_secs),
    );
    let sweeper_handle = sweeper.spawn(shutdown.clone());

    let state = AppState::new(db_pool, event_bus, job_manager, session_manager);
    let app = songdrop_sd::build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    shutdown.cancel();
    let _ = sweeper_handle.await;
    info!("songdrop-sd stopped");

    Ok(())
}
