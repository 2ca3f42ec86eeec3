//! Service configuration
//!
//! Values resolve in priority order:
//! 1. `SONGDROP_*` environment variables (highest priority)
//! 2. TOML config file (path from `SONGDROP_CONFIG`, if set)
//! 3. Compiled defaults

use serde::Deserialize;
use songdrop_common::{Error, Result};
use std::path::PathBuf;

/// Scrape Director configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SdConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Root directory for the database and blob store
    pub data_dir: PathBuf,
    /// Maximum concurrent song workers across all jobs
    pub max_workers: usize,
    /// Maximum songs accepted in a single scrape request
    pub max_batch_size: usize,
    /// Age in seconds after which stored artifacts become sweepable
    pub artifact_ttl_secs: u64,
    /// Interval in seconds between storage sweeps
    pub sweep_interval_secs: u64,
    /// Timeout in seconds for page fetches (lyrics, audio page)
    pub fetch_timeout_secs: u64,
    /// Timeout in seconds for audio file downloads
    pub download_timeout_secs: u64,
    /// Retry attempts after the first failed fetch
    pub fetch_retries: u32,
}

impl Default for SdConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            data_dir: PathBuf::from("./songdrop-data"),
            max_workers: 3,
            max_batch_size: 50,
            artifact_ttl_secs: 3600,
            sweep_interval_secs: 3600,
            fetch_timeout_secs: 15,
            download_timeout_secs: 120,
            fetch_retries: 2,
        }
    }
}

impl SdConfig {
    /// Load configuration from the config file (if any) and the environment
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var("SONGDROP_CONFIG") {
            Ok(path) => {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    Error::Config(format!("Failed to read config file {}: {}", path, e))
                })?;
                toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path, e)))?
            }
            Err(_) => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `SONGDROP_*` environment variables
    fn apply_env(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("SONGDROP_HOST") {
            self.host = host;
        }
        if let Ok(port) = std::env::var("SONGDROP_PORT") {
            self.port = parse_env("SONGDROP_PORT", &port)?;
        }
        if let Ok(dir) = std::env::var("SONGDROP_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(v) = std::env::var("SONGDROP_MAX_WORKERS") {
            self.max_workers = parse_env("SONGDROP_MAX_WORKERS", &v)?;
        }
        if let Ok(v) = std::env::var("SONGDROP_MAX_BATCH_SIZE") {
            self.max_batch_size = parse_env("SONGDROP_MAX_BATCH_SIZE", &v)?;
        }
        if let Ok(v) = std::env::var("SONGDROP_ARTIFACT_TTL_SECS") {
            self.artifact_ttl_secs = parse_env("SONGDROP_ARTIFACT_TTL_SECS", &v)?;
        }
        if let Ok(v) = std::env::var("SONGDROP_SWEEP_INTERVAL_SECS") {
            self.sweep_interval_secs = parse_env("SONGDROP_SWEEP_INTERVAL_SECS", &v)?;
        }
        if let Ok(v) = std::env::var("SONGDROP_FETCH_TIMEOUT_SECS") {
            self.fetch_timeout_secs = parse_env("SONGDROP_FETCH_TIMEOUT_SECS", &v)?;
        }
        if let Ok(v) = std::env::var("SONGDROP_DOWNLOAD_TIMEOUT_SECS") {
            self.download_timeout_secs = parse_env("SONGDROP_DOWNLOAD_TIMEOUT_SECS", &v)?;
        }
        if let Ok(v) = std::env::var("SONGDROP_FETCH_RETRIES") {
            self.fetch_retries = parse_env("SONGDROP_FETCH_RETRIES", &v)?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(Error::Config("max_workers must be at least 1".to_string()));
        }
        if self.max_batch_size == 0 {
            return Err(Error::Config(
                "max_batch_size must be at least 1".to_string(),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(Error::Config(
                "sweep_interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Path to the SQLite database file under the data directory
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("songdrop.db")
    }

    /// Root of the filesystem blob store
    pub fn blob_root(&self) -> PathBuf {
        self.data_dir.join("blobs")
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("Invalid value for {}: {}", name, value)))
}
