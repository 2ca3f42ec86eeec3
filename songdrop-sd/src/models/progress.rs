//! Per-phase progress tracking
//!
//! Each job carries one progress row per artifact phase. Counters only move
//! forward and stop moving once the phase is finalized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use songdrop_common::events::Phase;

/// Phase completion state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    Running,
    Completed,
    Failed,
}

impl PhaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseStatus::Running => "running",
            PhaseStatus::Completed => "completed",
            PhaseStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for PhaseStatus {
    type Err = songdrop_common::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(PhaseStatus::Running),
            "completed" => Ok(PhaseStatus::Completed),
            "failed" => Ok(PhaseStatus::Failed),
            other => Err(songdrop_common::Error::Internal(format!(
                "Unknown phase status: {}",
                other
            ))),
        }
    }
}

/// Progress of one phase of one job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseProgress {
    pub phase: Phase,
    /// Items finished (success or failure)
    pub current: u32,
    /// Items in the phase
    pub total: u32,
    pub status: PhaseStatus,
    /// Percentage complete (0.0 - 100.0)
    pub percentage: f64,
    /// Item most recently worked on
    pub current_item: Option<String>,
    /// Failure message for FAILED phases
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl PhaseProgress {
    /// Create a fresh running phase with zero progress
    pub fn new(phase: Phase, total: u32) -> Self {
        Self {
            phase,
            current: 0,
            total,
            status: PhaseStatus::Running,
            percentage: 0.0,
            current_item: None,
            error: None,
            updated_at: Utc::now(),
        }
    }

    /// Record one finished item. Returns false (and changes nothing) if the
    /// phase is already finalized; current never exceeds total.
    pub fn record(&mut self, item: Option<String>) -> bool {
        if self.is_finished() {
            return false;
        }
        self.current = (self.current + 1).min(self.total);
        self.percentage = if self.total == 0 {
            100.0
        } else {
            (self.current as f64 / self.total as f64) * 100.0
        };
        self.current_item = item;
        self.updated_at = Utc::now();
        true
    }

    /// Finalize the phase. Only the first finalization takes effect; later
    /// calls return false and leave the recorded outcome intact.
    pub fn finalize(&mut self, status: PhaseStatus, error: Option<String>) -> bool {
        if self.is_finished() {
            return false;
        }
        self.status = status;
        self.error = error;
        self.updated_at = Utc::now();
        true
    }

    pub fn is_finished(&self) -> bool {
        self.status != PhaseStatus::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_advances_and_clamps() {
        let mut progress = PhaseProgress::new(Phase::Lyrics, 2);

        assert!(progress.record(Some("song a".to_string())));
        assert_eq!(progress.current, 1);
        assert_eq!(progress.percentage, 50.0);

        assert!(progress.record(Some("song b".to_string())));
        assert_eq!(progress.percentage, 100.0);

        // over-count clamps at total
        assert!(progress.record(None));
        assert_eq!(progress.current, 2);
        assert_eq!(progress.percentage, 100.0);
    }

    #[test]
    fn zero_total_reports_complete() {
        let mut progress = PhaseProgress::new(Phase::Audio, 0);
        progress.record(None);
        assert_eq!(progress.current, 0);
        assert_eq!(progress.percentage, 100.0);
    }

    #[test]
    fn finalize_freezes_counters() {
        let mut progress = PhaseProgress::new(Phase::Lyrics, 3);
        progress.record(None);
        assert!(progress.finalize(PhaseStatus::Failed, Some("cancelled".to_string())));

        assert!(!progress.record(Some("late".to_string())));
        assert_eq!(progress.current, 1);
        assert_eq!(progress.current_item, None);

        // second finalize is a no-op
        assert!(!progress.finalize(PhaseStatus::Completed, None));
        assert_eq!(progress.status, PhaseStatus::Failed);
        assert_eq!(progress.error.as_deref(), Some("cancelled"));
    }
}
