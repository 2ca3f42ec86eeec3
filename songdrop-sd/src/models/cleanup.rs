//! Storage cleanup audit records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One deleted blob, logged exactly once
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupRecord {
    /// Blob path that was deleted
    pub blob_path: String,
    /// Artifact type parsed from the path (lyrics, audio, archives)
    pub artifact_type: String,
    pub size_bytes: i64,
    /// Owning job, when the path carries one
    pub job_id: Option<String>,
    /// Why the blob was removed, e.g. "ttl_expired"
    pub reason: String,
    pub deleted_at: DateTime<Utc>,
}
