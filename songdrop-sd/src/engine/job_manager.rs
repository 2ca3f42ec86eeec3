//! Job lifecycle orchestration
//!
//! The manager validates and persists new jobs, drives each one through
//! the worker pool on a background task, archives the results into a
//! bundle, and owns the cancellation tokens for running jobs.

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use songdrop_common::events::{EventBus, Phase, SdEvent};
use songdrop_common::{Error, Result};

use crate::db;
use crate::models::{Job, JobStatus, PhaseProgress, PhaseStatus, SongRecord, SongSubmission};
use crate::services::archive::build_zip;
use crate::services::blob_store::blob_path;
use crate::services::BlobStore;

use super::progress::ProgressTracker;
use super::worker_pool::WorkerPool;

/// Job plus its per-phase progress, as returned by the status API
#[derive(Debug, Serialize)]
pub struct JobStatusView {
    pub job: Job,
    pub progress: Vec<PhaseProgress>,
}

#[derive(Clone)]
pub struct JobManager {
    db: SqlitePool,
    blob_store: Arc<dyn BlobStore>,
    pool: WorkerPool,
    event_bus: EventBus,
    max_batch_size: usize,
    cancel_tokens: Arc<RwLock<HashMap<String, CancellationToken>>>,
}

impl JobManager {
    pub fn new(
        db: SqlitePool,
        blob_store: Arc<dyn BlobStore>,
        pool: WorkerPool,
        event_bus: EventBus,
        max_batch_size: usize,
    ) -> Self {
        Self {
            db,
            blob_store,
            pool,
            event_bus,
            max_batch_size,
            cancel_tokens: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Validate a batch, persist the queued job, and start it in the
    /// background. Returns the new job id.
    pub async fn submit(&self, user_id: i64, songs: Vec<SongSubmission>) -> Result<String> {
        if songs.is_empty() {
            return Err(Error::Validation("Batch must contain at least one song".to_string()));
        }
        if songs.len() > self.max_batch_size {
            return Err(Error::Validation(format!(
                "Batch of {} songs exceeds the limit of {}",
                songs.len(),
                self.max_batch_size
            )));
        }
        for song in &songs {
            song.validate()?;
        }

        let job = Job::new(user_id, songs.len() as u32);
        let job_id = job.job_id.clone();

        db::jobs::save_job(&self.db, &job).await?;
        let records: Vec<SongRecord> = songs
            .iter()
            .map(|song| SongRecord::from_submission(&job_id, song))
            .collect();
        db::songs::insert_songs(&self.db, &records).await?;
        // progress rows exist from the moment the job is visible
        for phase in [Phase::Lyrics, Phase::Audio] {
            let row = PhaseProgress::new(phase, job.total_songs);
            db::progress::upsert_progress(&self.db, &job_id, &row).await?;
        }

        let cancel = CancellationToken::new();
        self.cancel_tokens
            .write()
            .await
            .insert(job_id.clone(), cancel.clone());

        self.event_bus.emit(SdEvent::JobQueued {
            job_id: job_id.clone(),
            user_id,
            total_songs: job.total_songs,
            timestamp: Utc::now(),
        });

        tracing::info!(%job_id, user_id, songs = songs.len(), "Job queued");

        let manager = self.clone();
        tokio::spawn(async move {
            manager.run_job(job, songs, cancel).await;
        });

        Ok(job_id)
    }

    /// Load a job and its progress rows
    pub async fn status(&self, job_id: &str) -> Result<JobStatusView> {
        let job = db::jobs::load_job(&self.db, job_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Job not found: {}", job_id)))?;
        let progress = db::progress::load_progress(&self.db, job_id).await?;
        Ok(JobStatusView { job, progress })
    }

    /// All jobs for a user, newest first
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Job>> {
        db::jobs::jobs_for_user(&self.db, user_id).await
    }

    /// Request cancellation of a job
    ///
    /// Terminal jobs reject the request; a second cancel while the first
    /// is still winding down is a conflict.
    pub async fn cancel(&self, job_id: &str) -> Result<()> {
        let job = db::jobs::load_job(&self.db, job_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Job not found: {}", job_id)))?;

        if job.status.is_terminal() {
            return Err(Error::InvalidState(format!(
                "Job {} is already {}",
                job_id, job.status
            )));
        }

        let token = self.cancel_tokens.read().await.get(job_id).cloned();
        match token {
            Some(token) => {
                if token.is_cancelled() {
                    return Err(Error::Conflict(format!(
                        "Cancellation already requested for job {}",
                        job_id
                    )));
                }
                tracing::info!(%job_id, "Cancellation requested");
                token.cancel();
                Ok(())
            }
            None => {
                // No live task for this job (e.g. queued rows surviving a
                // restart); mark it cancelled directly.
                let mut job = job;
                job.transition_to(JobStatus::Cancelled)?;
                db::jobs::save_job(&self.db, &job).await?;
                self.event_bus.emit(SdEvent::JobCancelled {
                    job_id: job_id.to_string(),
                    timestamp: Utc::now(),
                });
                Ok(())
            }
        }
    }

    /// Fetch the completed bundle for download
    pub async fn download(&self, job_id: &str) -> Result<(String, Vec<u8>)> {
        let job = db::jobs::load_job(&self.db, job_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Job not found: {}", job_id)))?;

        if job.status != JobStatus::Completed {
            return Err(Error::InvalidState(format!(
                "Job {} is {}, not completed",
                job_id, job.status
            )));
        }
        let bundle_path = job.bundle_path.ok_or_else(|| {
            Error::NotFound(format!("Bundle for job {} is no longer available", job_id))
        })?;

        let bytes = self.blob_store.get(&bundle_path).await?;
        let filename = bundle_path
            .rsplit('/')
            .next()
            .unwrap_or("bundle.zip")
            .to_string();
        Ok((filename, bytes))
    }

    /// Background driver for one job, from RUNNING to a terminal state
    async fn run_job(self, mut job: Job, songs: Vec<SongSubmission>, cancel: CancellationToken) {
        let job_id = job.job_id.clone();

        let outcome = self.drive(&mut job, songs, cancel).await;
        if let Err(e) = outcome {
            tracing::error!(%job_id, "Job driver failed: {}", e);
            // best effort: record the failure if the job is not terminal yet
            if !job.status.is_terminal() && job.transition_to(JobStatus::Failed).is_ok() {
                job.error = Some(e.to_string());
                if let Err(save_err) = db::jobs::save_job(&self.db, &job).await {
                    tracing::error!(%job_id, "Failed to persist job failure: {}", save_err);
                }
                self.event_bus.emit(SdEvent::JobFailed {
                    job_id: job_id.clone(),
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
            }
        }

        self.cancel_tokens.write().await.remove(&job_id);
    }

    async fn drive(
        &self,
        job: &mut Job,
        songs: Vec<SongSubmission>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let job_id = job.job_id.clone();

        // Cancelled before any work started
        if cancel.is_cancelled() {
            job.transition_to(JobStatus::Cancelled)?;
            db::jobs::save_job(&self.db, job).await?;
            self.event_bus.emit(SdEvent::JobCancelled {
                job_id,
                timestamp: Utc::now(),
            });
            return Ok(());
        }

        job.transition_to(JobStatus::Running)?;
        db::jobs::save_job(&self.db, job).await?;
        self.event_bus.emit(SdEvent::JobStarted {
            job_id: job_id.clone(),
            timestamp: Utc::now(),
        });
        tracing::info!(%job_id, "Job started");

        let tracker = Arc::new(ProgressTracker::new(
            self.db.clone(),
            self.event_bus.clone(),
            &job_id,
            job.total_songs,
        ));
        tracker.init().await?;

        let stats = self
            .pool
            .run_job(&job_id, songs, tracker.clone(), cancel.clone())
            .await;

        // Pick up the counters the workers incremented
        if let Some(fresh) = db::jobs::load_job(&self.db, &job_id).await? {
            job.completed = fresh.completed;
            job.failed = fresh.failed;
            job.lyrics_completed = fresh.lyrics_completed;
            job.audio_completed = fresh.audio_completed;
        }

        if stats.cancelled {
            job.transition_to(JobStatus::Cancelled)?;
            db::jobs::save_job(&self.db, job).await?;
            self.event_bus.emit(SdEvent::JobCancelled {
                job_id: job_id.clone(),
                timestamp: Utc::now(),
            });
            tracing::info!(%job_id, "Job cancelled");
            return Ok(());
        }

        if stats.completed == 0 {
            let error = aggregate_errors(&stats.errors);
            job.transition_to(JobStatus::Failed)?;
            job.error = Some(error.clone());
            db::jobs::save_job(&self.db, job).await?;
            self.event_bus.emit(SdEvent::JobFailed {
                job_id: job_id.clone(),
                error,
                timestamp: Utc::now(),
            });
            tracing::warn!(%job_id, "Job failed: every song failed");
            return Ok(());
        }

        // Archive everything that was saved into the downloadable bundle
        match self.archive(&job_id, tracker.clone()).await {
            Ok(bundle_path) => {
                tracker
                    .finalize(Phase::Archiving, PhaseStatus::Completed, None)
                    .await?;
                job.bundle_path = Some(bundle_path.clone());
                job.transition_to(JobStatus::Completed)?;
                db::jobs::save_job(&self.db, job).await?;
                self.event_bus.emit(SdEvent::JobCompleted {
                    job_id: job_id.clone(),
                    bundle_path,
                    lyrics_completed: job.lyrics_completed,
                    audio_completed: job.audio_completed,
                    timestamp: Utc::now(),
                });
                tracing::info!(
                    %job_id,
                    completed = job.completed,
                    failed = job.failed,
                    "Job completed"
                );
            }
            Err(e) => {
                tracker
                    .finalize(Phase::Archiving, PhaseStatus::Failed, Some(e.to_string()))
                    .await?;
                job.transition_to(JobStatus::Failed)?;
                job.error = Some(format!("Archiving failed: {}", e));
                db::jobs::save_job(&self.db, job).await?;
                self.event_bus.emit(SdEvent::JobFailed {
                    job_id: job_id.clone(),
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
                tracing::error!(%job_id, "Archiving failed: {}", e);
            }
        }

        Ok(())
    }

    /// Collect saved artifacts and build the job bundle
    async fn archive(&self, job_id: &str, tracker: Arc<ProgressTracker>) -> Result<String> {
        let songs = db::songs::songs_for_job(&self.db, job_id).await?;

        let mut entries = Vec::new();
        let mut artifact_paths = Vec::new();
        for song in &songs {
            if let Some(path) = &song.lyrics_path {
                artifact_paths.push(("lyrics", path.clone()));
            }
            if let Some(path) = &song.audio_path {
                artifact_paths.push(("audio", path.clone()));
            }
        }

        tracker.begin_archiving(artifact_paths.len() as u32).await?;

        for (kind, path) in artifact_paths {
            let bytes = self.blob_store.get(&path).await?;
            let filename = path.rsplit('/').next().unwrap_or("artifact").to_string();
            let entry_name = format!("{}/{}", kind, filename);
            tracker
                .record(Phase::Archiving, Some(entry_name.clone()))
                .await?;
            entries.push((entry_name, bytes));
        }

        let bundle = build_zip(&entries)?;
        let bundle_path = blob_path(job_id, "archives", &format!("{}.zip", job_id));
        self.blob_store.put(&bundle_path, &bundle).await?;

        Ok(bundle_path)
    }
}

/// Join the first few per-song errors into one job-level message
fn aggregate_errors(errors: &[String]) -> String {
    const SHOWN: usize = 3;
    if errors.is_empty() {
        return "All songs failed".to_string();
    }
    let mut message = errors
        .iter()
        .take(SHOWN)
        .cloned()
        .collect::<Vec<_>>()
        .join("; ");
    if errors.len() > SHOWN {
        message.push_str(&format!(" (and {} more)", errors.len() - SHOWN));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_truncates_long_error_lists() {
        let errors: Vec<String> = (1..=5).map(|i| format!("song {}: boom", i)).collect();
        let message = aggregate_errors(&errors);
        assert!(message.contains("song 1: boom"));
        assert!(message.contains("song 3: boom"));
        assert!(!message.contains("song 4: boom"));
        assert!(message.ends_with("(and 2 more)"));
    }

    #[test]
    fn aggregate_handles_empty_list() {
        assert_eq!(aggregate_errors(&[]), "All songs failed");
    }
}
