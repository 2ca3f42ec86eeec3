//! Domain models for the Scrape Director

pub mod cleanup;
pub mod job;
pub mod progress;
pub mod session;
pub mod song;

pub use cleanup::CleanupRecord;
pub use job::{Job, JobStatus};
pub use progress::{PhaseProgress, PhaseStatus};
pub use session::{Session, SessionState, SongDraft};
pub use song::{SongRecord, SongSubmission};
