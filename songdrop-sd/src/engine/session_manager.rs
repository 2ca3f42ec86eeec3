//! Add-song session orchestration
//!
//! Thin persistence wrapper around the [`Session`] state machine: every
//! mutation loads the active session, applies the transition, and writes
//! it back.

use sqlx::SqlitePool;

use songdrop_common::{Error, Result};

use crate::db;
use crate::models::session::SESSION_TYPE_ADDSONG;
use crate::models::{Session, SessionState, SongSubmission};

#[derive(Clone)]
pub struct SessionManager {
    db: SqlitePool,
}

impl SessionManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Start a conversation for a user
    ///
    /// An idle session row is reused (its queue survives); a session
    /// mid-conversation is a conflict.
    pub async fn start(&self, user_id: i64) -> Result<Session> {
        let session = match self.load(user_id).await? {
            Some(mut existing) => {
                if existing.state != SessionState::Idle {
                    return Err(Error::Conflict(format!(
                        "User {} already has a conversation in progress",
                        user_id
                    )));
                }
                existing.state = SessionState::AwaitingTitle;
                existing.draft = Default::default();
                existing.updated_at = chrono::Utc::now();
                existing
            }
            None => Session::new(user_id),
        };
        db::sessions::save_session(&self.db, &session).await?;
        Ok(session)
    }

    /// Current session state for a user
    pub async fn get(&self, user_id: i64) -> Result<Session> {
        self.load(user_id).await?.ok_or_else(|| {
            Error::NotFound(format!("No session for user {}", user_id))
        })
    }

    /// Feed the next field into the conversation
    pub async fn submit_field(&self, user_id: i64, value: &str) -> Result<Session> {
        let mut session = self.get(user_id).await?;
        session.submit_field(value)?;
        db::sessions::save_session(&self.db, &session).await?;
        Ok(session)
    }

    /// Confirm the current draft onto the queue
    pub async fn confirm(&self, user_id: i64) -> Result<Session> {
        let mut session = self.get(user_id).await?;
        let submission = session.confirm()?;
        db::sessions::save_session(&self.db, &session).await?;
        tracing::debug!(user_id, title = %submission.title, "Song queued in session");
        Ok(session)
    }

    /// Abandon the current draft and go idle; the queue survives
    pub async fn cancel(&self, user_id: i64) -> Result<Session> {
        let mut session = self.get(user_id).await?;
        session.cancel();
        db::sessions::save_session(&self.db, &session).await?;
        Ok(session)
    }

    /// Read the queued songs without draining them
    pub async fn queue(&self, user_id: i64) -> Result<Vec<SongSubmission>> {
        Ok(self.get(user_id).await?.queue)
    }

    /// Drain the queue and return the session to idle, e.g. to submit
    /// the queue as a scrape job
    pub async fn take_queue(&self, user_id: i64) -> Result<Vec<SongSubmission>> {
        let mut session = self.get(user_id).await?;
        let queue = session.clear_queue();
        db::sessions::save_session(&self.db, &session).await?;
        Ok(queue)
    }

    async fn load(&self, user_id: i64) -> Result<Option<Session>> {
        db::sessions::load_active_session(&self.db, user_id, SESSION_TYPE_ADDSONG).await
    }
}
