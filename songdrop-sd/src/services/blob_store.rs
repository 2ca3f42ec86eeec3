//! Blob storage abstraction
//!
//! Artifacts live under `{job_id}/{artifact_type}/{filename}`. The
//! filesystem store is the production backend; the in-memory store backs
//! tests and lets them control blob timestamps.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use songdrop_common::{Error, Result};

/// Metadata for one stored blob
#[derive(Debug, Clone)]
pub struct BlobInfo {
    pub path: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

/// Content-addressed-by-path blob storage
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes at a path, returning the stored path
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<String>;

    /// Read a blob back
    async fn get(&self, path: &str) -> Result<Vec<u8>>;

    /// Delete a blob
    async fn delete(&self, path: &str) -> Result<()>;

    /// List blobs under a prefix ("" lists everything)
    async fn list(&self, prefix: &str) -> Result<Vec<BlobInfo>>;
}

/// Build the canonical blob path for a job artifact
pub fn blob_path(job_id: &str, artifact_type: &str, filename: &str) -> String {
    format!("{}/{}/{}", job_id, artifact_type, sanitize_filename(filename))
}

/// Strip characters unsafe for filenames and collapse whitespace
///
/// Removes `\ / * ? : " < > |`, trims, and truncates to 200 characters.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|'))
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(200).collect()
}

/// Filesystem-backed blob store rooted at a directory
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a blob path under the root, rejecting traversal
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        for component in relative.components() {
            match component {
                Component::Normal(_) => {}
                _ => {
                    return Err(Error::Storage(format!("Invalid blob path: {}", path)));
                }
            }
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<String> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes).await?;
        Ok(path.to_string())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("Blob not found: {}", path)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("Blob not found: {}", path)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BlobInfo>> {
        let mut blobs = Vec::new();
        let mut dirs = vec![self.root.clone()];

        while let Some(dir) = dirs.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let entry_path = entry.path();
                let metadata = entry.metadata().await?;
                if metadata.is_dir() {
                    dirs.push(entry_path);
                    continue;
                }
                let relative = entry_path
                    .strip_prefix(&self.root)
                    .map_err(|_| Error::Storage("Blob outside store root".to_string()))?;
                let relative = relative.to_string_lossy().replace('\\', "/");
                if !relative.starts_with(prefix) {
                    continue;
                }
                let created_at = metadata
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now());
                blobs.push(BlobInfo {
                    path: relative,
                    size: metadata.len(),
                    created_at,
                });
            }
        }

        blobs.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(blobs)
    }
}

#[derive(Clone)]
struct MemoryBlob {
    bytes: Vec<u8>,
    created_at: DateTime<Utc>,
}

/// In-memory blob store for tests
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<Mutex<BTreeMap<String, MemoryBlob>>>,
    fail_deletes: Arc<AtomicBool>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a blob with an explicit creation time
    pub async fn put_with_timestamp(
        &self,
        path: &str,
        bytes: &[u8],
        created_at: DateTime<Utc>,
    ) -> String {
        self.blobs.lock().await.insert(
            path.to_string(),
            MemoryBlob {
                bytes: bytes.to_vec(),
                created_at,
            },
        );
        path.to_string()
    }

    /// Make every subsequent delete fail
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<String> {
        Ok(self.put_with_timestamp(path, bytes, Utc::now()).await)
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        self.blobs
            .lock()
            .await
            .get(path)
            .map(|blob| blob.bytes.clone())
            .ok_or_else(|| Error::NotFound(format!("Blob not found: {}", path)))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Error::Storage(format!("Delete failed for {}", path)));
        }
        self.blobs
            .lock()
            .await
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("Blob not found: {}", path)))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BlobInfo>> {
        Ok(self
            .blobs
            .lock()
            .await
            .iter()
            .filter(|(path, _)| path.starts_with(prefix))
            .map(|(path, blob)| BlobInfo {
                path: path.clone(),
                size: blob.bytes.len() as u64,
                created_at: blob.created_at,
            })
            .collect())
    }
}
