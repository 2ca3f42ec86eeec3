//! Event types for the songdrop event system
//!
//! Events are broadcast on an [`EventBus`] and rendered to SSE clients by
//! the HTTP layer. Emission never blocks and never fails the emitting
//! operation: a send with no subscribers is not an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Artifact phase within a scrape job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Lyrics text fetch
    Lyrics,
    /// Audio file fetch
    Audio,
    /// Bundle creation and upload
    Archiving,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Lyrics => "lyrics",
            Phase::Audio => "audio",
            Phase::Archiving => "archiving",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lyrics" => Ok(Phase::Lyrics),
            "audio" => Ok(Phase::Audio),
            "archiving" => Ok(Phase::Archiving),
            other => Err(crate::Error::Internal(format!("Unknown phase: {}", other))),
        }
    }
}

/// songdrop event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SdEvent {
    /// Job created and queued
    JobQueued {
        job_id: String,
        user_id: i64,
        total_songs: u32,
        timestamp: DateTime<Utc>,
    },

    /// Worker pool picked the job up
    JobStarted {
        job_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Per-phase progress advanced
    PhaseProgress {
        job_id: String,
        phase: Phase,
        current: u32,
        total: u32,
        percentage: f64,
        current_item: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// One song finished with at least one artifact saved
    SongCompleted {
        job_id: String,
        title: String,
        lyrics_saved: bool,
        audio_saved: bool,
        timestamp: DateTime<Utc>,
    },

    /// One song failed both artifacts
    SongFailed {
        job_id: String,
        title: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// Job reached `completed` with a downloadable bundle
    JobCompleted {
        job_id: String,
        bundle_path: String,
        lyrics_completed: u32,
        audio_completed: u32,
        timestamp: DateTime<Utc>,
    },

    /// Job reached `failed`
    JobFailed {
        job_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// Job reached `cancelled`
    JobCancelled {
        job_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Storage lifecycle sweep finished
    SweepCompleted {
        scanned: usize,
        deleted: usize,
        errors: usize,
        timestamp: DateTime<Utc>,
    },
}

impl SdEvent {
    /// Event type name for SSE `event:` fields
    pub fn event_type(&self) -> &'static str {
        match self {
            SdEvent::JobQueued { .. } => "JobQueued",
            SdEvent::JobStarted { .. } => "JobStarted",
            SdEvent::PhaseProgress { .. } => "PhaseProgress",
            SdEvent::SongCompleted { .. } => "SongCompleted",
            SdEvent::SongFailed { .. } => "SongFailed",
            SdEvent::JobCompleted { .. } => "JobCompleted",
            SdEvent::JobFailed { .. } => "JobFailed",
            SdEvent::JobCancelled { .. } => "JobCancelled",
            SdEvent::SweepCompleted { .. } => "SweepCompleted",
        }
    }
}

/// Broadcast event bus
///
/// Cheap to clone; all clones share the same channel. Slow subscribers that
/// fall more than `capacity` events behind start seeing `Lagged` errors and
/// simply miss the dropped events.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SdEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<SdEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns the subscriber count, or 0 when nobody is listening.
    pub fn emit(&self, event: SdEvent) -> usize {
        match self.tx.send(event) {
            Ok(count) => count,
            Err(_) => 0,
        }
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
