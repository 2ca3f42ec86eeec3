//! Scrape job persistence

use sqlx::{Row, SqlitePool};

use songdrop_common::Result;

use crate::models::{Job, JobStatus};

/// Save a job, inserting or updating the full row
pub async fn save_job(pool: &SqlitePool, job: &Job) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO scrape_jobs (
            job_id, user_id, status, total_songs,
            completed, failed, lyrics_completed, audio_completed,
            bundle_path, error, created_at, updated_at, completed_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(job_id) DO UPDATE SET
            status = excluded.status,
            completed = excluded.completed,
            failed = excluded.failed,
            lyrics_completed = excluded.lyrics_completed,
            audio_completed = excluded.audio_completed,
            bundle_path = excluded.bundle_path,
            error = excluded.error,
            updated_at = excluded.updated_at,
            completed_at = excluded.completed_at
        "#,
    )
    .bind(&job.job_id)
    .bind(job.user_id)
    .bind(job.status.as_str())
    .bind(job.total_songs as i64)
    .bind(job.completed as i64)
    .bind(job.failed as i64)
    .bind(job.lyrics_completed as i64)
    .bind(job.audio_completed as i64)
    .bind(&job.bundle_path)
    .bind(&job.error)
    .bind(job.created_at.to_rfc3339())
    .bind(job.updated_at.to_rfc3339())
    .bind(job.completed_at.map(|dt| dt.to_rfc3339()))
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a job by id
pub async fn load_job(pool: &SqlitePool, job_id: &str) -> Result<Option<Job>> {
    let row = sqlx::query(
        r#"
        SELECT job_id, user_id, status, total_songs,
               completed, failed, lyrics_completed, audio_completed,
               bundle_path, error, created_at, updated_at, completed_at
        FROM scrape_jobs
        WHERE job_id = ?
        "#,
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(job_from_row(&row)?)),
        None => Ok(None),
    }
}

/// Load all jobs for a user, newest first
pub async fn jobs_for_user(pool: &SqlitePool, user_id: i64) -> Result<Vec<Job>> {
    let rows = sqlx::query(
        r#"
        SELECT job_id, user_id, status, total_songs,
               completed, failed, lyrics_completed, audio_completed,
               bundle_path, error, created_at, updated_at, completed_at
        FROM scrape_jobs
        WHERE user_id = ?
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(job_from_row).collect()
}

/// Atomically bump per-song counters for one finished song
///
/// Increments run in SQL so concurrent workers never lose updates.
pub async fn record_song_outcome(
    pool: &SqlitePool,
    job_id: &str,
    song_completed: bool,
    lyrics_saved: bool,
    audio_saved: bool,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE scrape_jobs SET
            completed = completed + ?,
            failed = failed + ?,
            lyrics_completed = lyrics_completed + ?,
            audio_completed = audio_completed + ?,
            updated_at = ?
        WHERE job_id = ?
        "#,
    )
    .bind(song_completed as i64)
    .bind(!song_completed as i64)
    .bind(lyrics_saved as i64)
    .bind(audio_saved as i64)
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(job_id)
    .execute(pool)
    .await?;

    Ok(())
}

fn job_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Job> {
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");
    let completed_at: Option<String> = row.get("completed_at");

    Ok(Job {
        job_id: row.get("job_id"),
        user_id: row.get("user_id"),
        status: status.parse::<JobStatus>()?,
        total_songs: row.get::<i64, _>("total_songs") as u32,
        completed: row.get::<i64, _>("completed") as u32,
        failed: row.get::<i64, _>("failed") as u32,
        lyrics_completed: row.get::<i64, _>("lyrics_completed") as u32,
        audio_completed: row.get::<i64, _>("audio_completed") as u32,
        bundle_path: row.get("bundle_path"),
        error: row.get("error"),
        created_at: super::parse_timestamp(&created_at)?,
        updated_at: super::parse_timestamp(&updated_at)?,
        completed_at: completed_at
            .as_deref()
            .map(super::parse_timestamp)
            .transpose()?,
    })
}
