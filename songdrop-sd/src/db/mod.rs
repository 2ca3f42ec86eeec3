//! Database access for songdrop-sd
//!
//! SQLite via sqlx, RFC3339 TEXT timestamps, tables created on startup.

pub mod cleanup;
pub mod jobs;
pub mod progress;
pub mod sessions;
pub mod songs;

use songdrop_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Connects to songdrop.db under the data directory, creating it if needed.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create songdrop tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scrape_jobs (
            job_id TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            status TEXT NOT NULL,
            total_songs INTEGER NOT NULL,
            completed INTEGER NOT NULL DEFAULT 0,
            failed INTEGER NOT NULL DEFAULT 0,
            lyrics_completed INTEGER NOT NULL DEFAULT 0,
            audio_completed INTEGER NOT NULL DEFAULT 0,
            bundle_path TEXT,
            error TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            completed_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scraped_songs (
            job_id TEXT NOT NULL,
            url TEXT NOT NULL,
            title TEXT NOT NULL,
            artist TEXT NOT NULL,
            event TEXT,
            has_lyrics INTEGER NOT NULL DEFAULT 0,
            has_audio INTEGER NOT NULL DEFAULT 0,
            lyrics_path TEXT,
            audio_path TEXT,
            audio_size_bytes INTEGER,
            scraped_at TEXT,
            PRIMARY KEY (job_id, url)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS job_progress (
            job_id TEXT NOT NULL,
            phase TEXT NOT NULL,
            current INTEGER NOT NULL DEFAULT 0,
            total INTEGER NOT NULL,
            status TEXT NOT NULL,
            percentage REAL NOT NULL DEFAULT 0.0,
            current_item TEXT,
            error TEXT,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (job_id, phase)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_sessions (
            user_id INTEGER NOT NULL,
            session_type TEXT NOT NULL,
            state TEXT NOT NULL,
            draft TEXT NOT NULL DEFAULT '{}',
            queue TEXT NOT NULL DEFAULT '[]',
            is_active INTEGER NOT NULL DEFAULT 1,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (user_id, session_type)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cleanup_log (
            blob_path TEXT PRIMARY KEY,
            artifact_type TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            job_id TEXT,
            reason TEXT NOT NULL,
            deleted_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!(
        "Database tables initialized (scrape_jobs, scraped_songs, job_progress, user_sessions, cleanup_log)"
    );

    Ok(())
}

/// Parse an RFC3339 TEXT column into a UTC timestamp
pub(crate) fn parse_timestamp(value: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| {
            songdrop_common::Error::Internal(format!("Invalid timestamp '{}': {}", value, e))
        })
}
