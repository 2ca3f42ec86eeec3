//! Add-song session persistence
//!
//! The draft and queue are stored as JSON TEXT columns so the conversation
//! survives restarts.

use sqlx::{Row, SqlitePool};

use songdrop_common::{Error, Result};

use crate::models::{Session, SessionState};

/// Save a session, inserting or updating
pub async fn save_session(pool: &SqlitePool, session: &Session) -> Result<()> {
    let draft = serde_json::to_string(&session.draft)
        .map_err(|e| Error::Internal(format!("Failed to serialize draft: {}", e)))?;
    let queue = serde_json::to_string(&session.queue)
        .map_err(|e| Error::Internal(format!("Failed to serialize queue: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO user_sessions (
            user_id, session_type, state, draft, queue, is_active, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id, session_type) DO UPDATE SET
            state = excluded.state,
            draft = excluded.draft,
            queue = excluded.queue,
            is_active = excluded.is_active,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(session.user_id)
    .bind(&session.session_type)
    .bind(session.state.as_str())
    .bind(&draft)
    .bind(&queue)
    .bind(session.is_active as i64)
    .bind(session.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load the active session for a user, if any
pub async fn load_active_session(
    pool: &SqlitePool,
    user_id: i64,
    session_type: &str,
) -> Result<Option<Session>> {
    let row = sqlx::query(
        r#"
        SELECT user_id, session_type, state, draft, queue, is_active, updated_at
        FROM user_sessions
        WHERE user_id = ? AND session_type = ? AND is_active = 1
        "#,
    )
    .bind(user_id)
    .bind(session_type)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let state: String = row.get("state");
            let draft: String = row.get("draft");
            let queue: String = row.get("queue");
            let updated_at: String = row.get("updated_at");

            Ok(Some(Session {
                user_id: row.get("user_id"),
                session_type: row.get("session_type"),
                state: state.parse::<SessionState>()?,
                draft: serde_json::from_str(&draft)
                    .map_err(|e| Error::Internal(format!("Failed to deserialize draft: {}", e)))?,
                queue: serde_json::from_str(&queue)
                    .map_err(|e| Error::Internal(format!("Failed to deserialize queue: {}", e)))?,
                is_active: row.get::<i64, _>("is_active") != 0,
                updated_at: super::parse_timestamp(&updated_at)?,
            }))
        }
        None => Ok(None),
    }
}
