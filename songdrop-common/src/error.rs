//! Common error types for songdrop

use thiserror::Error;

/// Common result type for songdrop operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error taxonomy across the scrape engine
///
/// Per-artifact fetch failures are not represented here: they are recovered
/// by the worker pool and converted into counters. A job-level failure is
/// recorded as a human-readable aggregate message, never a stack trace.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed input, rejected before any state mutation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Requested job or session not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate active session, double-cancel
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Operation not legal for the record's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Blob store operation error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Bundle creation failed; fatal for the job only, not for the process
    #[error("Archiving failed: {0}")]
    Archiving(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
