//! Job progress tracking
//!
//! One tracker per running job. Counters live in memory behind mutexes,
//! are persisted to job_progress on every change, and fan out as
//! PhaseProgress events. The archiving phase is created lazily since a
//! job that fails outright never archives.

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::sync::Mutex;

use songdrop_common::events::{EventBus, Phase, SdEvent};
use songdrop_common::Result;

use crate::db;
use crate::models::{PhaseProgress, PhaseStatus};

pub struct ProgressTracker {
    db: SqlitePool,
    event_bus: EventBus,
    job_id: String,
    lyrics: Mutex<PhaseProgress>,
    audio: Mutex<PhaseProgress>,
    archiving: Mutex<Option<PhaseProgress>>,
}

impl ProgressTracker {
    pub fn new(db: SqlitePool, event_bus: EventBus, job_id: &str, total_songs: u32) -> Self {
        Self {
            db,
            event_bus,
            job_id: job_id.to_string(),
            lyrics: Mutex::new(PhaseProgress::new(Phase::Lyrics, total_songs)),
            audio: Mutex::new(PhaseProgress::new(Phase::Audio, total_songs)),
            archiving: Mutex::new(None),
        }
    }

    /// Persist the initial running rows for the lyrics and audio phases
    pub async fn init(&self) -> Result<()> {
        let lyrics = self.lyrics.lock().await.clone();
        db::progress::upsert_progress(&self.db, &self.job_id, &lyrics).await?;
        let audio = self.audio.lock().await.clone();
        db::progress::upsert_progress(&self.db, &self.job_id, &audio).await?;
        Ok(())
    }

    /// Record one finished item in a phase
    ///
    /// A finalized phase ignores late records.
    pub async fn record(&self, phase: Phase, item: Option<String>) -> Result<()> {
        let snapshot = match phase {
            Phase::Lyrics => {
                let mut progress = self.lyrics.lock().await;
                if !progress.record(item) {
                    return Ok(());
                }
                progress.clone()
            }
            Phase::Audio => {
                let mut progress = self.audio.lock().await;
                if !progress.record(item) {
                    return Ok(());
                }
                progress.clone()
            }
            Phase::Archiving => {
                let mut slot = self.archiving.lock().await;
                let Some(progress) = slot.as_mut() else {
                    return Ok(());
                };
                if !progress.record(item) {
                    return Ok(());
                }
                progress.clone()
            }
        };
        self.persist_and_emit(&snapshot).await
    }

    /// Finalize a phase; only the first finalization takes effect
    pub async fn finalize(
        &self,
        phase: Phase,
        status: PhaseStatus,
        error: Option<String>,
    ) -> Result<()> {
        let snapshot = match phase {
            Phase::Lyrics => {
                let mut progress = self.lyrics.lock().await;
                if !progress.finalize(status, error) {
                    return Ok(());
                }
                progress.clone()
            }
            Phase::Audio => {
                let mut progress = self.audio.lock().await;
                if !progress.finalize(status, error) {
                    return Ok(());
                }
                progress.clone()
            }
            Phase::Archiving => {
                let mut slot = self.archiving.lock().await;
                let Some(progress) = slot.as_mut() else {
                    return Ok(());
                };
                if !progress.finalize(status, error) {
                    return Ok(());
                }
                progress.clone()
            }
        };
        db::progress::upsert_progress(&self.db, &self.job_id, &snapshot).await
    }

    /// Create and persist the archiving phase row
    pub async fn begin_archiving(&self, total: u32) -> Result<()> {
        let progress = PhaseProgress::new(Phase::Archiving, total);
        db::progress::upsert_progress(&self.db, &self.job_id, &progress).await?;
        *self.archiving.lock().await = Some(progress);
        Ok(())
    }

    async fn persist_and_emit(&self, snapshot: &PhaseProgress) -> Result<()> {
        db::progress::upsert_progress(&self.db, &self.job_id, snapshot).await?;
        self.event_bus.emit(SdEvent::PhaseProgress {
            job_id: self.job_id.clone(),
            phase: snapshot.phase,
            current: snapshot.current,
            total: snapshot.total,
            percentage: snapshot.percentage,
            current_item: snapshot.current_item.clone(),
            timestamp: Utc::now(),
        });
        Ok(())
    }
}
