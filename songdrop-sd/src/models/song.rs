//! Song submissions and per-song scrape records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use songdrop_common::{Error, Result};

/// A song requested for scraping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongSubmission {
    pub title: String,
    pub artist: String,
    /// Source page to scrape lyrics and audio from
    pub url: String,
    /// Optional event / album tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}

impl SongSubmission {
    /// Validate required fields before a job is created
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::Validation("Song title must not be empty".to_string()));
        }
        if self.artist.trim().is_empty() {
            return Err(Error::Validation(format!(
                "Artist must not be empty for '{}'",
                self.title
            )));
        }
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(Error::Validation(format!(
                "Invalid URL for '{}': {}",
                self.title, self.url
            )));
        }
        Ok(())
    }
}

/// Per-song outcome row for a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongRecord {
    pub job_id: String,
    pub title: String,
    pub artist: String,
    pub url: String,
    pub event: Option<String>,
    pub has_lyrics: bool,
    pub has_audio: bool,
    /// Blob path of the saved lyrics text, cleared when swept
    pub lyrics_path: Option<String>,
    /// Blob path of the saved audio file, cleared when swept
    pub audio_path: Option<String>,
    pub audio_size_bytes: Option<i64>,
    /// When scraping of this song finished
    pub scraped_at: Option<DateTime<Utc>>,
}

impl SongRecord {
    pub fn from_submission(job_id: &str, submission: &SongSubmission) -> Self {
        Self {
            job_id: job_id.to_string(),
            title: submission.title.clone(),
            artist: submission.artist.clone(),
            url: submission.url.clone(),
            event: submission.event.clone(),
            has_lyrics: false,
            has_audio: false,
            lyrics_path: None,
            audio_path: None,
            audio_size_bytes: None,
            scraped_at: None,
        }
    }
}
