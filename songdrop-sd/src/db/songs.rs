//! Per-song outcome persistence

use sqlx::{Row, SqlitePool};

use songdrop_common::Result;

use crate::models::SongRecord;

/// Insert the initial song rows for a new job
pub async fn insert_songs(pool: &SqlitePool, songs: &[SongRecord]) -> Result<()> {
    for song in songs {
        sqlx::query(
            r#"
            INSERT INTO scraped_songs (
                job_id, url, title, artist, event,
                has_lyrics, has_audio, lyrics_path, audio_path,
                audio_size_bytes, scraped_at
            ) VALUES (?, ?, ?, ?, ?, 0, 0, NULL, NULL, NULL, NULL)
            ON CONFLICT(job_id, url) DO NOTHING
            "#,
        )
        .bind(&song.job_id)
        .bind(&song.url)
        .bind(&song.title)
        .bind(&song.artist)
        .bind(&song.event)
        .execute(pool)
        .await?;
    }
    Ok(())
}

/// Mark a song's lyrics artifact as saved
pub async fn mark_lyrics(pool: &SqlitePool, job_id: &str, url: &str, path: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE scraped_songs
        SET has_lyrics = 1, lyrics_path = ?, scraped_at = ?
        WHERE job_id = ? AND url = ?
        "#,
    )
    .bind(path)
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(job_id)
    .bind(url)
    .execute(pool)
    .await?;

    Ok(())
}

/// Mark a song's audio artifact as saved
pub async fn mark_audio(
    pool: &SqlitePool,
    job_id: &str,
    url: &str,
    path: &str,
    size_bytes: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE scraped_songs
        SET has_audio = 1, audio_path = ?, audio_size_bytes = ?, scraped_at = ?
        WHERE job_id = ? AND url = ?
        "#,
    )
    .bind(path)
    .bind(size_bytes)
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(job_id)
    .bind(url)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load all songs belonging to a job
pub async fn songs_for_job(pool: &SqlitePool, job_id: &str) -> Result<Vec<SongRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT job_id, url, title, artist, event,
               has_lyrics, has_audio, lyrics_path, audio_path,
               audio_size_bytes, scraped_at
        FROM scraped_songs
        WHERE job_id = ?
        ORDER BY title
        "#,
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let scraped_at: Option<String> = row.get("scraped_at");
            Ok(SongRecord {
                job_id: row.get("job_id"),
                url: row.get("url"),
                title: row.get("title"),
                artist: row.get("artist"),
                event: row.get("event"),
                has_lyrics: row.get::<i64, _>("has_lyrics") != 0,
                has_audio: row.get::<i64, _>("has_audio") != 0,
                lyrics_path: row.get("lyrics_path"),
                audio_path: row.get("audio_path"),
                audio_size_bytes: row.get("audio_size_bytes"),
                scraped_at: scraped_at
                    .as_deref()
                    .map(super::parse_timestamp)
                    .transpose()?,
            })
        })
        .collect()
}

/// Null out references to a deleted blob so stale paths are never served
pub async fn clear_blob_reference(pool: &SqlitePool, blob_path: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE scraped_songs SET lyrics_path = NULL WHERE lyrics_path = ?
        "#,
    )
    .bind(blob_path)
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        UPDATE scraped_songs SET audio_path = NULL WHERE audio_path = ?
        "#,
    )
    .bind(blob_path)
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        UPDATE scrape_jobs SET bundle_path = NULL WHERE bundle_path = ?
        "#,
    )
    .bind(blob_path)
    .execute(pool)
    .await?;

    Ok(())
}
