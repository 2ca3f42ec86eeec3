//! Orchestration engine: job lifecycle, worker pool, progress, storage sweep

pub mod job_manager;
pub mod progress;
pub mod session_manager;
pub mod sweeper;
pub mod worker_pool;

pub use job_manager::{JobManager, JobStatusView};
pub use progress::ProgressTracker;
pub use session_manager::SessionManager;
pub use sweeper::{StorageSweeper, SweepStats};
pub use worker_pool::{JobRunStats, WorkerPool};
