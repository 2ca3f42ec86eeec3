//! Remote song page fetching
//!
//! The [`Fetcher`] trait isolates the worker pool from the network. The
//! production [`HttpFetcher`] scrapes a song page for lyrics text and an
//! audio file link, with bounded retries on transient failures.

use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

/// Fetch failure, per artifact
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Request(String),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("No lyrics found on page")]
    NoLyrics,
    #[error("No audio link found on page")]
    NoAudio,
    #[error("Request timed out")]
    Timeout,
}

/// A downloaded audio artifact
#[derive(Debug, Clone)]
pub struct FetchedAudio {
    pub bytes: Vec<u8>,
    /// Filename derived from the audio URL
    pub filename: String,
}

/// Artifact fetching seam
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch and extract lyrics text from a song page
    async fn fetch_lyrics(&self, url: &str) -> Result<String, FetchError>;

    /// Fetch the audio file linked from a song page
    async fn fetch_audio(&self, url: &str) -> Result<FetchedAudio, FetchError>;
}

/// reqwest-backed fetcher with retries
pub struct HttpFetcher {
    page_client: reqwest::Client,
    download_client: reqwest::Client,
    retries: u32,
}

const USER_AGENT: &str = concat!("songdrop/", env!("CARGO_PKG_VERSION"));

impl HttpFetcher {
    pub fn new(
        fetch_timeout: Duration,
        download_timeout: Duration,
        retries: u32,
    ) -> Result<Self, songdrop_common::Error> {
        let page_client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                songdrop_common::Error::Config(format!("Failed to build HTTP client: {}", e))
            })?;
        let download_client = reqwest::Client::builder()
            .timeout(download_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                songdrop_common::Error::Config(format!("Failed to build HTTP client: {}", e))
            })?;
        Ok(Self {
            page_client,
            download_client,
            retries,
        })
    }

    /// GET with bounded retries on timeouts, connection errors, 429 and 5xx
    async fn get_with_retry(
        &self,
        client: &reqwest::Client,
        url: &str,
    ) -> Result<reqwest::Response, FetchError> {
        let mut attempt = 0u32;
        loop {
            match client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    if !retryable || attempt >= self.retries {
                        return Err(FetchError::Status(status.as_u16()));
                    }
                }
                Err(e) => {
                    let retryable = e.is_timeout() || e.is_connect();
                    if !retryable || attempt >= self.retries {
                        return Err(if e.is_timeout() {
                            FetchError::Timeout
                        } else {
                            FetchError::Request(e.to_string())
                        });
                    }
                }
            }

            // 0.5s, 1s, 2s, ...
            let backoff = Duration::from_millis(500 * (1u64 << attempt.min(6)));
            tracing::debug!(url, attempt, "Retrying fetch after {:?}", backoff);
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_lyrics(&self, url: &str) -> Result<String, FetchError> {
        let response = self.get_with_retry(&self.page_client, url).await?;
        let html = response
            .text()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;
        extract_lyrics(&html).ok_or(FetchError::NoLyrics)
    }

    async fn fetch_audio(&self, url: &str) -> Result<FetchedAudio, FetchError> {
        let response = self.get_with_retry(&self.page_client, url).await?;
        let html = response
            .text()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;
        let audio_url = extract_audio_url(&html, url).ok_or(FetchError::NoAudio)?;

        let response = self.get_with_retry(&self.download_client, &audio_url).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        let filename = audio_url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("audio.mp3")
            .to_string();

        Ok(FetchedAudio {
            bytes: bytes.to_vec(),
            filename,
        })
    }
}

fn content_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)<div[^>]*class="[^"]*entry-content[^"]*"[^>]*>(.*?)</div>"#)
            .expect("static regex")
    })
}

fn paragraph_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<p[^>]*>(.*?)</p>").expect("static regex"))
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("static regex"))
}

fn audio_src_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<(?:audio|source)[^>]*\bsrc="([^"]+)""#).expect("static regex")
    })
}

fn audio_href_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<a[^>]*\bhref="([^"]+\.(?:mp3|wav|m4a))""#).expect("static regex")
    })
}

/// Extract lyrics text from a song page
///
/// Takes the paragraphs of the entry-content block, converts `<br>` to
/// newlines, strips remaining tags, and skips navigation-only paragraphs.
pub fn extract_lyrics(html: &str) -> Option<String> {
    let content = content_regex().captures(html)?.get(1)?.as_str();

    let mut verses = Vec::new();
    for paragraph in paragraph_regex().captures_iter(content) {
        let raw = paragraph.get(1)?.as_str();
        let with_breaks = raw
            .replace("<br>", "\n")
            .replace("<br/>", "\n")
            .replace("<br />", "\n");
        let text = tag_regex().replace_all(&with_breaks, "");
        let text = decode_entities(text.trim());
        if text.is_empty() {
            continue;
        }
        // skip the page's action links
        let lowered = text.to_lowercase();
        if lowered.starts_with("download") || lowered.starts_with("listen") || lowered.starts_with("share")
        {
            continue;
        }
        verses.push(text);
    }

    if verses.is_empty() {
        None
    } else {
        Some(verses.join("\n\n"))
    }
}

/// Find the audio file URL on a song page
///
/// Checks `<audio>`/`<source>` src attributes first, then direct links to
/// audio files. Relative URLs are resolved against the page URL's origin.
pub fn extract_audio_url(html: &str, page_url: &str) -> Option<String> {
    let found = audio_src_regex()
        .captures(html)
        .or_else(|| audio_href_regex().captures(html))?;
    let url = found.get(1)?.as_str();

    if url.starts_with("http://") || url.starts_with("https://") {
        return Some(url.to_string());
    }
    if let Some(path) = url.strip_prefix('/') {
        let origin = page_url
            .splitn(4, '/')
            .take(3)
            .collect::<Vec<_>>()
            .join("/");
        return Some(format!("{}/{}", origin, path));
    }
    Some(format!("{}/{}", page_url.trim_end_matches('/'), url))
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}
