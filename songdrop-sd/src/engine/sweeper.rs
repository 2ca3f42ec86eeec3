//! Storage lifecycle sweeper
//!
//! Periodically deletes blobs older than the artifact TTL, logs each
//! deletion exactly once, and clears database references to removed
//! blobs. A blob that fails to delete is skipped and retried on the next
//! sweep; its cleanup record is only written after a successful delete.

use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use songdrop_common::events::{EventBus, SdEvent};
use songdrop_common::Result;

use crate::db;
use crate::models::CleanupRecord;
use crate::services::BlobStore;

/// Result of one sweep pass
#[derive(Debug, Default)]
pub struct SweepStats {
    pub scanned: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub errors: usize,
}

pub struct StorageSweeper {
    db: SqlitePool,
    blob_store: Arc<dyn BlobStore>,
    event_bus: EventBus,
    ttl: Duration,
    interval: Duration,
}

impl StorageSweeper {
    pub fn new(
        db: SqlitePool,
        blob_store: Arc<dyn BlobStore>,
        event_bus: EventBus,
        ttl: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            db,
            blob_store,
            event_bus,
            ttl,
            interval,
        }
    }

    /// Run the sweep loop until the token is cancelled
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick fires immediately; skip it so the first sweep
            // happens one full interval after startup
            ticker.tick().await;

            tracing::info!(
                ttl_secs = self.ttl.as_secs(),
                interval_secs = self.interval.as_secs(),
                "Storage sweeper started"
            );

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("Storage sweeper stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        match self.sweep_once().await {
                            Ok(stats) => tracing::info!(
                                scanned = stats.scanned,
                                deleted = stats.deleted,
                                skipped = stats.skipped,
                                errors = stats.errors,
                                "Sweep finished"
                            ),
                            Err(e) => tracing::warn!("Sweep failed: {}", e),
                        }
                    }
                }
            }
        })
    }

    /// One full sweep over the blob store
    pub async fn sweep_once(&self) -> Result<SweepStats> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::hours(1));

        let blobs = self.blob_store.list("").await?;
        let mut stats = SweepStats::default();

        for blob in blobs {
            stats.scanned += 1;

            if blob.created_at > cutoff {
                stats.skipped += 1;
                continue;
            }
            if db::cleanup::is_logged(&self.db, &blob.path).await? {
                stats.skipped += 1;
                continue;
            }

            if let Err(e) = self.blob_store.delete(&blob.path).await {
                tracing::warn!(path = %blob.path, "Failed to delete expired blob: {} (non-fatal, continuing)", e);
                stats.errors += 1;
                continue;
            }

            let (job_id, artifact_type) = parse_blob_path(&blob.path);
            let record = CleanupRecord {
                blob_path: blob.path.clone(),
                artifact_type,
                size_bytes: blob.size as i64,
                job_id,
                reason: "ttl_expired".to_string(),
                deleted_at: Utc::now(),
            };
            db::cleanup::record_cleanup(&self.db, &record).await?;
            db::songs::clear_blob_reference(&self.db, &blob.path).await?;

            tracing::debug!(path = %blob.path, "Expired blob deleted");
            stats.deleted += 1;
        }

        self.event_bus.emit(SdEvent::SweepCompleted {
            scanned: stats.scanned,
            deleted: stats.deleted,
            errors: stats.errors,
            timestamp: Utc::now(),
        });

        Ok(stats)
    }
}

/// Split `{job_id}/{artifact_type}/{filename}` into its owning job and type
fn parse_blob_path(path: &str) -> (Option<String>, String) {
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() == 3 {
        (Some(segments[0].to_string()), segments[1].to_string())
    } else {
        (None, "unknown".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_path_parsing() {
        assert_eq!(
            parse_blob_path("7_170/lyrics/Song.txt"),
            (Some("7_170".to_string()), "lyrics".to_string())
        );
        assert_eq!(parse_blob_path("stray.txt"), (None, "unknown".to_string()));
    }
}
