//! Worker pool concurrency tests

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use helpers::{memory_pool, submission, StubFetcher};
use songdrop_common::events::EventBus;
use songdrop_sd::engine::{ProgressTracker, WorkerPool};
use songdrop_sd::services::{BlobStore, MemoryBlobStore};
use tokio_util::sync::CancellationToken;

async fn pool_with(fetcher: Arc<StubFetcher>, max_workers: usize) -> (WorkerPool, Arc<ProgressTracker>) {
    let db = memory_pool().await;
    let event_bus = EventBus::new(100);
    let pool = WorkerPool::new(
        db.clone(),
        fetcher,
        Arc::new(MemoryBlobStore::new()) as Arc<dyn BlobStore>,
        event_bus.clone(),
        max_workers,
    );
    let tracker = Arc::new(ProgressTracker::new(db, event_bus, "1_1", 8));
    tracker.init().await.unwrap();
    (pool, tracker)
}

#[tokio::test]
async fn concurrency_never_exceeds_worker_limit() {
    // Given eight slow songs and three workers
    let mut fetcher = StubFetcher::new();
    let mut songs = Vec::new();
    for i in 1..=8 {
        let url = format!("https://songs.test/{}", i);
        fetcher = fetcher.song(&url, Some("verse"), Some(b"audio"));
        songs.push(submission(&format!("Song {}", i), &url));
    }
    let fetcher = Arc::new(fetcher.with_delay(Duration::from_millis(30)));
    let (pool, tracker) = pool_with(fetcher.clone(), 3).await;

    // When the whole batch runs
    let stats = pool
        .run_job("1_1", songs, tracker, CancellationToken::new())
        .await;

    // Then every song finished and at most three fetches overlapped
    assert_eq!(stats.completed, 8);
    assert_eq!(stats.failed, 0);
    assert!(!stats.cancelled);
    assert!(
        fetcher.max_concurrency() <= 3,
        "observed {} concurrent fetches",
        fetcher.max_concurrency()
    );
    // and the pool actually ran songs in parallel
    assert!(fetcher.max_concurrency() >= 2);
}

#[tokio::test]
async fn worker_limit_is_shared_across_jobs() {
    // Given two jobs racing through the same pool of three workers
    let mut fetcher = StubFetcher::new();
    let mut batch_a = Vec::new();
    let mut batch_b = Vec::new();
    for i in 1..=5 {
        let url_a = format!("https://songs.test/a{}", i);
        let url_b = format!("https://songs.test/b{}", i);
        fetcher = fetcher
            .song(&url_a, Some("verse"), Some(b"audio"))
            .song(&url_b, Some("verse"), Some(b"audio"));
        batch_a.push(submission(&format!("A{}", i), &url_a));
        batch_b.push(submission(&format!("B{}", i), &url_b));
    }
    let fetcher = Arc::new(fetcher.with_delay(Duration::from_millis(30)));

    let db = memory_pool().await;
    let event_bus = EventBus::new(100);
    let pool = WorkerPool::new(
        db.clone(),
        fetcher.clone(),
        Arc::new(MemoryBlobStore::new()) as Arc<dyn BlobStore>,
        event_bus.clone(),
        3,
    );
    let tracker_a = Arc::new(ProgressTracker::new(db.clone(), event_bus.clone(), "1_1", 5));
    tracker_a.init().await.unwrap();
    let tracker_b = Arc::new(ProgressTracker::new(db.clone(), event_bus.clone(), "2_1", 5));
    tracker_b.init().await.unwrap();

    // When both run concurrently
    let (stats_a, stats_b) = tokio::join!(
        pool.run_job("1_1", batch_a, tracker_a, CancellationToken::new()),
        pool.run_job("2_1", batch_b, tracker_b, CancellationToken::new()),
    );

    // Then the semaphore bound holds globally, not per job
    assert_eq!(stats_a.completed, 5);
    assert_eq!(stats_b.completed, 5);
    assert!(
        fetcher.max_concurrency() <= 3,
        "observed {} concurrent fetches",
        fetcher.max_concurrency()
    );
}

#[tokio::test]
async fn pre_cancelled_run_processes_nothing() {
    let fetcher = Arc::new(
        StubFetcher::new().song("https://songs.test/1", Some("verse"), Some(b"audio")),
    );
    let (pool, tracker) = pool_with(fetcher.clone(), 3).await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let stats = pool
        .run_job(
            "1_1",
            vec![submission("One", "https://songs.test/1")],
            tracker,
            cancel,
        )
        .await;

    assert!(stats.cancelled);
    assert_eq!(stats.completed, 0);
    assert_eq!(stats.failed, 0);
    assert_eq!(fetcher.max_concurrency(), 0);
}

#[tokio::test]
async fn single_worker_serializes_songs() {
    let mut fetcher = StubFetcher::new();
    let mut songs = Vec::new();
    for i in 1..=4 {
        let url = format!("https://songs.test/{}", i);
        fetcher = fetcher.song(&url, Some("verse"), None);
        songs.push(submission(&format!("Song {}", i), &url));
    }
    let fetcher = Arc::new(fetcher.with_delay(Duration::from_millis(10)));
    let (pool, tracker) = pool_with(fetcher.clone(), 1).await;

    let stats = pool
        .run_job("1_1", songs, tracker, CancellationToken::new())
        .await;

    // lyrics saved, audio failed, song still counts completed
    assert_eq!(stats.completed, 4);
    assert_eq!(stats.lyrics_saved, 4);
    assert_eq!(stats.audio_saved, 0);
    assert_eq!(fetcher.max_concurrency(), 1);
}
