//! Shared test helpers: in-memory database, stub fetcher, engine setup

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use songdrop_common::events::EventBus;
use songdrop_sd::engine::{JobManager, SessionManager, WorkerPool};
use songdrop_sd::models::{JobStatus, SongSubmission};
use songdrop_sd::services::{BlobStore, FetchError, FetchedAudio, Fetcher, MemoryBlobStore};

/// In-memory SQLite pool with the songdrop schema
///
/// One connection only: each sqlite::memory: connection is its own
/// database, so a larger pool would split the schema across databases.
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    songdrop_sd::db::init_tables(&pool)
        .await
        .expect("Failed to initialize schema");
    pool
}

/// Scripted per-url outcome; None means that artifact's fetch fails
#[derive(Clone, Default)]
pub struct StubOutcome {
    pub lyrics: Option<String>,
    pub audio: Option<Vec<u8>>,
}

/// Fetcher with scripted outcomes and concurrency accounting
#[derive(Default)]
pub struct StubFetcher {
    outcomes: HashMap<String, StubOutcome>,
    delay: Duration,
    active: AtomicUsize,
    high_water: AtomicUsize,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay applied inside every fetch, to force overlap
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn song(mut self, url: &str, lyrics: Option<&str>, audio: Option<&[u8]>) -> Self {
        self.outcomes.insert(
            url.to_string(),
            StubOutcome {
                lyrics: lyrics.map(String::from),
                audio: audio.map(Vec::from),
            },
        );
        self
    }

    /// Highest number of fetches observed in flight at once
    pub fn max_concurrency(&self) -> usize {
        self.high_water.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water.fetch_max(active, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    fn leave(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch_lyrics(&self, url: &str) -> Result<String, FetchError> {
        self.enter().await;
        let result = match self.outcomes.get(url) {
            Some(outcome) => outcome.lyrics.clone().ok_or(FetchError::NoLyrics),
            None => Err(FetchError::Request(format!("unknown url {}", url))),
        };
        self.leave();
        result
    }

    async fn fetch_audio(&self, url: &str) -> Result<FetchedAudio, FetchError> {
        self.enter().await;
        let result = match self.outcomes.get(url) {
            Some(outcome) => outcome
                .audio
                .clone()
                .map(|bytes| FetchedAudio {
                    bytes,
                    filename: "track.mp3".to_string(),
                })
                .ok_or(FetchError::NoAudio),
            None => Err(FetchError::Request(format!("unknown url {}", url))),
        };
        self.leave();
        result
    }
}

/// Fully wired engine backed by in-memory stores
pub struct TestEngine {
    pub db: SqlitePool,
    pub blob_store: Arc<MemoryBlobStore>,
    pub event_bus: EventBus,
    pub manager: JobManager,
    pub sessions: SessionManager,
}

pub async fn engine_with_fetcher(fetcher: Arc<dyn Fetcher>, max_workers: usize) -> TestEngine {
    let db = memory_pool().await;
    let blob_store = Arc::new(MemoryBlobStore::new());
    let event_bus = EventBus::new(100);

    let pool = WorkerPool::new(
        db.clone(),
        fetcher,
        blob_store.clone() as Arc<dyn BlobStore>,
        event_bus.clone(),
        max_workers,
    );
    let manager = JobManager::new(
        db.clone(),
        blob_store.clone() as Arc<dyn BlobStore>,
        pool,
        event_bus.clone(),
        50,
    );
    let sessions = SessionManager::new(db.clone());

    TestEngine {
        db,
        blob_store,
        event_bus,
        manager,
        sessions,
    }
}

/// Poll a job until it reaches a terminal state
pub async fn wait_for_terminal(
    manager: &JobManager,
    job_id: &str,
    timeout: Duration,
) -> JobStatus {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let view = manager.status(job_id).await.expect("job should exist");
        if view.job.status.is_terminal() {
            return view.job.status;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("job {} still {:?} after {:?}", job_id, view.job.status, timeout);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

pub fn submission(title: &str, url: &str) -> SongSubmission {
    SongSubmission {
        title: title.to_string(),
        artist: "Test Artist".to_string(),
        url: url.to_string(),
        event: None,
    }
}
