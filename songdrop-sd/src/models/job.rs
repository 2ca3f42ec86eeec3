//! Scrape job state machine
//!
//! A job progresses QUEUED → RUNNING → one of COMPLETED / FAILED / CANCELLED.
//! QUEUED may also move straight to CANCELLED. Terminal states are frozen;
//! any transition out of them is rejected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use songdrop_common::{Error, Result};

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted, waiting for the worker pool
    Queued,
    /// Worker pool is processing songs
    Running,
    /// Finished with a downloadable bundle
    Completed,
    /// Finished with every song failed, or archiving failed
    Failed,
    /// Stopped by user request
    Cancelled,
}

impl JobStatus {
    /// Terminal states never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Check whether a transition to `next` is legal
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Running)
                | (JobStatus::Queued, JobStatus::Cancelled)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Cancelled)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(Error::Internal(format!("Unknown job status: {}", other))),
        }
    }
}

/// A scrape job record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Job identifier, `{user_id}_{unix_millis}`
    pub job_id: String,
    /// Submitting user
    pub user_id: i64,
    /// Current lifecycle state
    pub status: JobStatus,
    /// Songs in the batch
    pub total_songs: u32,
    /// Songs finished with at least one artifact saved
    pub completed: u32,
    /// Songs where both artifacts failed
    pub failed: u32,
    /// Lyrics artifacts saved
    pub lyrics_completed: u32,
    /// Audio artifacts saved
    pub audio_completed: u32,
    /// Blob path of the final bundle, once archived
    pub bundle_path: Option<String>,
    /// Failure message for FAILED jobs
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set when the job first enters a terminal state
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new queued job
    pub fn new(user_id: i64, total_songs: u32) -> Self {
        let now = Utc::now();
        Self {
            job_id: format!("{}_{}", user_id, now.timestamp_millis()),
            user_id,
            status: JobStatus::Queued,
            total_songs,
            completed: 0,
            failed: 0,
            lyrics_completed: 0,
            audio_completed: 0,
            bundle_path: None,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Transition to a new state, rejecting illegal moves
    pub fn transition_to(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidState(format!(
                "Job {} cannot transition from {} to {}",
                self.job_id, self.status, next
            )));
        }
        self.status = next;
        self.updated_at = Utc::now();
        if next.is_terminal() {
            self.completed_at = Some(self.updated_at);
        }
        Ok(())
    }
}
