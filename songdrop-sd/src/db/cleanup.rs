//! Cleanup audit log persistence

use sqlx::SqlitePool;

use songdrop_common::Result;

use crate::models::CleanupRecord;

/// Record one deleted blob; the path is the primary key so a blob is only
/// ever logged once
pub async fn record_cleanup(pool: &SqlitePool, record: &CleanupRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO cleanup_log (
            blob_path, artifact_type, size_bytes, job_id, reason, deleted_at
        ) VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(blob_path) DO NOTHING
        "#,
    )
    .bind(&record.blob_path)
    .bind(&record.artifact_type)
    .bind(record.size_bytes)
    .bind(&record.job_id)
    .bind(&record.reason)
    .bind(record.deleted_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Check whether a blob path has already been logged as deleted
pub async fn is_logged(pool: &SqlitePool, blob_path: &str) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM cleanup_log WHERE blob_path = ?")
            .bind(blob_path)
            .fetch_one(pool)
            .await?;

    Ok(count > 0)
}

/// Total number of cleanup records
pub async fn cleanup_count(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cleanup_log")
        .fetch_one(pool)
        .await?;

    Ok(count)
}
