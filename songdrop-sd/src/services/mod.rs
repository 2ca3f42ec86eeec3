//! Collaborator services: blob storage, remote fetching, bundle archiving

pub mod archive;
pub mod blob_store;
pub mod fetcher;

pub use blob_store::{BlobInfo, BlobStore, FsBlobStore, MemoryBlobStore};
pub use fetcher::{FetchError, FetchedAudio, Fetcher, HttpFetcher};
