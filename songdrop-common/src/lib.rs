//! Shared types for songdrop services
//!
//! Error taxonomy and the broadcast event bus used by the scrape engine
//! and its HTTP/SSE surface.

pub mod error;
pub mod events;

pub use error::{Error, Result};
