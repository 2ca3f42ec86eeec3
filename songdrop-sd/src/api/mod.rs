//! HTTP API handlers

pub mod health;
pub mod jobs;
pub mod sessions;
pub mod sse;
