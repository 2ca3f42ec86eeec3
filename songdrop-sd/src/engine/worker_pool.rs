//! Bounded-concurrency song worker pool
//!
//! Songs of a job run as independent tasks gated by a semaphore, so at most
//! `max_workers` songs are in flight at once. A song fails only when BOTH
//! its artifacts fail; a single saved artifact counts the song as
//! completed. Per-song failures never abort the job.

use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use songdrop_common::events::{EventBus, Phase, SdEvent};

use crate::db;
use crate::models::SongSubmission;
use crate::services::blob_store::{blob_path, sanitize_filename};
use crate::services::{BlobStore, Fetcher};

use super::progress::ProgressTracker;

/// Aggregated result of one pool run
#[derive(Debug, Default)]
pub struct JobRunStats {
    pub total: u32,
    /// Songs with at least one artifact saved
    pub completed: u32,
    /// Songs where both artifacts failed
    pub failed: u32,
    pub lyrics_saved: u32,
    pub audio_saved: u32,
    /// True when the run was stopped by cancellation
    pub cancelled: bool,
    /// Per-song failure messages, for the job-level aggregate
    pub errors: Vec<String>,
}

#[derive(Debug)]
struct SongOutcome {
    title: String,
    lyrics_ok: bool,
    audio_ok: bool,
    error: Option<String>,
    /// Song never started because the job was cancelled
    skipped: bool,
}

#[derive(Clone)]
pub struct WorkerPool {
    db: SqlitePool,
    fetcher: Arc<dyn Fetcher>,
    blob_store: Arc<dyn BlobStore>,
    event_bus: EventBus,
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(
        db: SqlitePool,
        fetcher: Arc<dyn Fetcher>,
        blob_store: Arc<dyn BlobStore>,
        event_bus: EventBus,
        max_workers: usize,
    ) -> Self {
        Self {
            db,
            fetcher,
            blob_store,
            event_bus,
            semaphore: Arc::new(Semaphore::new(max_workers)),
        }
    }

    /// Run every song of a job through the pool and wait for all of them
    pub async fn run_job(
        &self,
        job_id: &str,
        songs: Vec<SongSubmission>,
        tracker: Arc<ProgressTracker>,
        cancel: CancellationToken,
    ) -> JobRunStats {
        let mut stats = JobRunStats {
            total: songs.len() as u32,
            ..JobRunStats::default()
        };

        let mut tasks = JoinSet::new();
        for song in songs {
            let pool = self.clone();
            let job_id = job_id.to_string();
            let tracker = tracker.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                pool.process_song(&job_id, song, tracker, cancel).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Song worker panicked: {}", e);
                    stats.errors.push(format!("worker crashed: {}", e));
                    stats.failed += 1;
                    continue;
                }
            };

            if outcome.skipped {
                continue;
            }
            if outcome.lyrics_ok {
                stats.lyrics_saved += 1;
            }
            if outcome.audio_ok {
                stats.audio_saved += 1;
            }
            if outcome.lyrics_ok || outcome.audio_ok {
                stats.completed += 1;
            } else {
                stats.failed += 1;
                if let Some(error) = outcome.error {
                    stats.errors.push(format!("{}: {}", outcome.title, error));
                }
            }
        }

        stats.cancelled = cancel.is_cancelled();

        // Phases complete normally only when nothing was skipped; a
        // cancelled run leaves them running and the job status tells the
        // story instead.
        if !stats.cancelled {
            let _ = tracker
                .finalize(Phase::Lyrics, crate::models::PhaseStatus::Completed, None)
                .await;
            let _ = tracker
                .finalize(Phase::Audio, crate::models::PhaseStatus::Completed, None)
                .await;
        }

        stats
    }

    /// Fetch and store both artifacts for one song
    async fn process_song(
        &self,
        job_id: &str,
        song: SongSubmission,
        tracker: Arc<ProgressTracker>,
        cancel: CancellationToken,
    ) -> SongOutcome {
        let mut outcome = SongOutcome {
            title: song.title.clone(),
            lyrics_ok: false,
            audio_ok: false,
            error: None,
            skipped: false,
        };

        if cancel.is_cancelled() {
            outcome.skipped = true;
            return outcome;
        }

        // Wait for a worker slot, giving up if the job is cancelled first
        let _permit = tokio::select! {
            permit = self.semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    outcome.skipped = true;
                    return outcome;
                }
            },
            _ = cancel.cancelled() => {
                outcome.skipped = true;
                return outcome;
            }
        };

        if cancel.is_cancelled() {
            outcome.skipped = true;
            return outcome;
        }

        tracing::debug!(job_id, title = %song.title, "Scraping song");

        let mut errors = Vec::new();

        match self.fetcher.fetch_lyrics(&song.url).await {
            Ok(lyrics) => {
                let path = blob_path(job_id, "lyrics", &format!("{}.txt", song.title));
                match self.save_lyrics(job_id, &song.url, &path, lyrics.as_bytes()).await {
                    Ok(()) => outcome.lyrics_ok = true,
                    Err(e) => {
                        tracing::warn!(job_id, title = %song.title, "Failed to save lyrics: {} (non-fatal, continuing)", e);
                        errors.push(format!("lyrics: {}", e));
                    }
                }
            }
            Err(e) => {
                tracing::warn!(job_id, title = %song.title, "Lyrics fetch failed: {} (non-fatal, continuing)", e);
                errors.push(format!("lyrics: {}", e));
            }
        }
        let _ = tracker.record(Phase::Lyrics, Some(song.title.clone())).await;

        match self.fetcher.fetch_audio(&song.url).await {
            Ok(audio) => {
                let filename = audio_filename(&song.title, &audio.filename);
                let path = blob_path(job_id, "audio", &filename);
                match self
                    .save_audio(job_id, &song.url, &path, &audio.bytes)
                    .await
                {
                    Ok(()) => outcome.audio_ok = true,
                    Err(e) => {
                        tracing::warn!(job_id, title = %song.title, "Failed to save audio: {} (non-fatal, continuing)", e);
                        errors.push(format!("audio: {}", e));
                    }
                }
            }
            Err(e) => {
                tracing::warn!(job_id, title = %song.title, "Audio fetch failed: {} (non-fatal, continuing)", e);
                errors.push(format!("audio: {}", e));
            }
        }
        let _ = tracker.record(Phase::Audio, Some(song.title.clone())).await;

        let song_completed = outcome.lyrics_ok || outcome.audio_ok;
        if let Err(e) = db::jobs::record_song_outcome(
            &self.db,
            job_id,
            song_completed,
            outcome.lyrics_ok,
            outcome.audio_ok,
        )
        .await
        {
            tracing::error!(job_id, "Failed to record song outcome: {}", e);
        }

        if song_completed {
            self.event_bus.emit(SdEvent::SongCompleted {
                job_id: job_id.to_string(),
                title: song.title.clone(),
                lyrics_saved: outcome.lyrics_ok,
                audio_saved: outcome.audio_ok,
                timestamp: Utc::now(),
            });
        } else {
            let error = errors.join("; ");
            self.event_bus.emit(SdEvent::SongFailed {
                job_id: job_id.to_string(),
                title: song.title.clone(),
                error: error.clone(),
                timestamp: Utc::now(),
            });
            outcome.error = Some(error);
        }

        outcome
    }

    async fn save_lyrics(
        &self,
        job_id: &str,
        url: &str,
        path: &str,
        bytes: &[u8],
    ) -> songdrop_common::Result<()> {
        let stored = self.blob_store.put(path, bytes).await?;
        db::songs::mark_lyrics(&self.db, job_id, url, &stored).await
    }

    async fn save_audio(
        &self,
        job_id: &str,
        url: &str,
        path: &str,
        bytes: &[u8],
    ) -> songdrop_common::Result<()> {
        let stored = self.blob_store.put(path, bytes).await?;
        db::songs::mark_audio(&self.db, job_id, url, &stored, bytes.len() as i64).await
    }
}

/// Audio filename: keep the remote extension, name after the song title
fn audio_filename(title: &str, remote_filename: &str) -> String {
    let extension = remote_filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .unwrap_or("mp3");
    sanitize_filename(&format!("{}.{}", title, extension))
}
