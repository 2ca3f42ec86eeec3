//! Phase progress persistence

use sqlx::{Row, SqlitePool};

use songdrop_common::events::Phase;
use songdrop_common::Result;

use crate::models::{PhaseProgress, PhaseStatus};

/// Save a phase progress row, inserting or updating
pub async fn upsert_progress(
    pool: &SqlitePool,
    job_id: &str,
    progress: &PhaseProgress,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO job_progress (
            job_id, phase, current, total, status,
            percentage, current_item, error, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(job_id, phase) DO UPDATE SET
            current = excluded.current,
            status = excluded.status,
            percentage = excluded.percentage,
            current_item = excluded.current_item,
            error = excluded.error,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(job_id)
    .bind(progress.phase.as_str())
    .bind(progress.current as i64)
    .bind(progress.total as i64)
    .bind(progress.status.as_str())
    .bind(progress.percentage)
    .bind(&progress.current_item)
    .bind(&progress.error)
    .bind(progress.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load all phase rows for a job
pub async fn load_progress(pool: &SqlitePool, job_id: &str) -> Result<Vec<PhaseProgress>> {
    let rows = sqlx::query(
        r#"
        SELECT phase, current, total, status, percentage, current_item, error, updated_at
        FROM job_progress
        WHERE job_id = ?
        ORDER BY phase
        "#,
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(progress_from_row).collect()
}

/// Load one phase row for a job
pub async fn load_phase(
    pool: &SqlitePool,
    job_id: &str,
    phase: Phase,
) -> Result<Option<PhaseProgress>> {
    let row = sqlx::query(
        r#"
        SELECT phase, current, total, status, percentage, current_item, error, updated_at
        FROM job_progress
        WHERE job_id = ? AND phase = ?
        "#,
    )
    .bind(job_id)
    .bind(phase.as_str())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(progress_from_row(&row)?)),
        None => Ok(None),
    }
}

fn progress_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<PhaseProgress> {
    let phase: String = row.get("phase");
    let status: String = row.get("status");
    let updated_at: String = row.get("updated_at");

    Ok(PhaseProgress {
        phase: phase.parse::<Phase>()?,
        current: row.get::<i64, _>("current") as u32,
        total: row.get::<i64, _>("total") as u32,
        status: status.parse::<PhaseStatus>()?,
        percentage: row.get("percentage"),
        current_item: row.get("current_item"),
        error: row.get("error"),
        updated_at: super::parse_timestamp(&updated_at)?,
    })
}
