//! Conversational add-song session state machine
//!
//! A session walks the user through one song at a time:
//! AWAITING_TITLE → AWAITING_ARTIST → AWAITING_URL → AWAITING_CONFIRMATION,
//! then confirm() pushes the draft onto the queue and loops back to
//! AWAITING_TITLE. cancel() returns to IDLE, discarding only the draft.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use songdrop_common::{Error, Result};

use super::song::SongSubmission;

/// Session type key for add-song conversations
pub const SESSION_TYPE_ADDSONG: &str = "addsong";

/// Conversation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No conversation in progress
    Idle,
    AwaitingTitle,
    AwaitingArtist,
    AwaitingUrl,
    AwaitingConfirmation,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AwaitingTitle => "awaiting_title",
            SessionState::AwaitingArtist => "awaiting_artist",
            SessionState::AwaitingUrl => "awaiting_url",
            SessionState::AwaitingConfirmation => "awaiting_confirmation",
        }
    }
}

impl std::str::FromStr for SessionState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "idle" => Ok(SessionState::Idle),
            "awaiting_title" => Ok(SessionState::AwaitingTitle),
            "awaiting_artist" => Ok(SessionState::AwaitingArtist),
            "awaiting_url" => Ok(SessionState::AwaitingUrl),
            "awaiting_confirmation" => Ok(SessionState::AwaitingConfirmation),
            other => Err(Error::Internal(format!("Unknown session state: {}", other))),
        }
    }
}

/// Partially collected song fields
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SongDraft {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub url: Option<String>,
    pub event: Option<String>,
}

/// One user's add-song session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: i64,
    pub session_type: String,
    pub state: SessionState,
    pub draft: SongDraft,
    /// Confirmed songs waiting to be submitted as a job
    pub queue: Vec<SongSubmission>,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Start a new conversation for a user
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            session_type: SESSION_TYPE_ADDSONG.to_string(),
            state: SessionState::AwaitingTitle,
            draft: SongDraft::default(),
            queue: Vec::new(),
            is_active: true,
            updated_at: Utc::now(),
        }
    }

    /// Accept the next field for the current state and advance
    pub fn submit_field(&mut self, value: &str) -> Result<SessionState> {
        let value = value.trim();
        match self.state {
            SessionState::Idle => {
                return Err(Error::InvalidState(
                    "No conversation in progress; start a session first".to_string(),
                ));
            }
            SessionState::AwaitingTitle => {
                if value.is_empty() {
                    return Err(Error::Validation("Title must not be empty".to_string()));
                }
                self.draft.title = Some(value.to_string());
                self.state = SessionState::AwaitingArtist;
            }
            SessionState::AwaitingArtist => {
                if value.is_empty() {
                    return Err(Error::Validation("Artist must not be empty".to_string()));
                }
                self.draft.artist = Some(value.to_string());
                self.state = SessionState::AwaitingUrl;
            }
            SessionState::AwaitingUrl => {
                if !value.starts_with("http://") && !value.starts_with("https://") {
                    return Err(Error::Validation(format!("Invalid URL: {}", value)));
                }
                self.draft.url = Some(value.to_string());
                self.state = SessionState::AwaitingConfirmation;
            }
            SessionState::AwaitingConfirmation => {
                // optional event tag; stays in confirmation until confirm/cancel
                if !value.is_empty() {
                    self.draft.event = Some(value.to_string());
                }
            }
        }
        self.updated_at = Utc::now();
        Ok(self.state)
    }

    /// Confirm the draft: push it onto the queue and start the next song
    pub fn confirm(&mut self) -> Result<SongSubmission> {
        if self.state != SessionState::AwaitingConfirmation {
            return Err(Error::InvalidState(format!(
                "Cannot confirm in state {}",
                self.state.as_str()
            )));
        }
        let draft = std::mem::take(&mut self.draft);
        let submission = SongSubmission {
            title: draft
                .title
                .ok_or_else(|| Error::InvalidState("Draft missing title".to_string()))?,
            artist: draft
                .artist
                .ok_or_else(|| Error::InvalidState("Draft missing artist".to_string()))?,
            url: draft
                .url
                .ok_or_else(|| Error::InvalidState("Draft missing url".to_string()))?,
            event: draft.event,
        };
        self.queue.push(submission.clone());
        self.state = SessionState::AwaitingTitle;
        self.updated_at = Utc::now();
        Ok(submission)
    }

    /// Abandon the current draft and return to idle; the queue survives
    pub fn cancel(&mut self) {
        self.draft = SongDraft::default();
        self.state = SessionState::Idle;
        self.updated_at = Utc::now();
    }

    /// Drain the queue and end the conversation, e.g. after submitting
    /// the queue as a job. Any in-progress draft is discarded.
    pub fn clear_queue(&mut self) -> Vec<SongSubmission> {
        self.draft = SongDraft::default();
        self.state = SessionState::Idle;
        self.updated_at = Utc::now();
        std::mem::take(&mut self.queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_conversation_queues_a_song() {
        let mut session = Session::new(7);
        assert_eq!(session.state, SessionState::AwaitingTitle);

        session.submit_field("Reign of Fire").unwrap();
        assert_eq!(session.state, SessionState::AwaitingArtist);
        session.submit_field("The Band").unwrap();
        session.submit_field("https://example.com/reign").unwrap();
        assert_eq!(session.state, SessionState::AwaitingConfirmation);

        let submission = session.confirm().unwrap();
        assert_eq!(submission.title, "Reign of Fire");
        assert_eq!(session.queue.len(), 1);
        // loops back for the next song
        assert_eq!(session.state, SessionState::AwaitingTitle);
    }

    #[test]
    fn optional_event_captured_during_confirmation() {
        let mut session = Session::new(7);
        session.submit_field("Song").unwrap();
        session.submit_field("Artist").unwrap();
        session.submit_field("https://example.com/s").unwrap();

        session.submit_field("Summer Fest 2026").unwrap();
        assert_eq!(session.state, SessionState::AwaitingConfirmation);

        let submission = session.confirm().unwrap();
        assert_eq!(submission.event.as_deref(), Some("Summer Fest 2026"));
    }

    #[test]
    fn invalid_url_keeps_state() {
        let mut session = Session::new(7);
        session.submit_field("Song").unwrap();
        session.submit_field("Artist").unwrap();

        assert!(session.submit_field("not-a-url").is_err());
        assert_eq!(session.state, SessionState::AwaitingUrl);
    }

    #[test]
    fn cancel_discards_draft_but_keeps_queue() {
        let mut session = Session::new(7);
        session.submit_field("Kept Song").unwrap();
        session.submit_field("Artist").unwrap();
        session.submit_field("https://example.com/kept").unwrap();
        session.confirm().unwrap();

        session.submit_field("Abandoned Song").unwrap();
        session.cancel();

        assert_eq!(session.state, SessionState::Idle);
        assert!(session.draft.title.is_none());
        assert_eq!(session.queue.len(), 1);
        assert_eq!(session.queue[0].title, "Kept Song");
    }

    #[test]
    fn clear_queue_drains_and_returns_to_idle() {
        let mut session = Session::new(7);
        session.submit_field("Song").unwrap();
        session.submit_field("Artist").unwrap();
        session.submit_field("https://example.com/s").unwrap();
        session.confirm().unwrap();
        // next conversation already underway
        session.submit_field("Next Song").unwrap();

        let drained = session.clear_queue();
        assert_eq!(drained.len(), 1);
        assert!(session.queue.is_empty());
        assert_eq!(session.state, SessionState::Idle);
        assert!(session.draft.title.is_none());
    }

    #[test]
    fn idle_session_rejects_input() {
        let mut session = Session::new(7);
        session.cancel();
        let err = session.submit_field("Song").unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[test]
    fn confirm_outside_confirmation_rejected() {
        let mut session = Session::new(7);
        assert!(session.confirm().is_err());
    }
}
