//! Transcript Relay - an HTTP service that turns video URLs into plain-text transcripts
//!
//! This library fetches caption tracks for a video, optionally falls back to
//! speech-to-text when no captions exist, and caches results across three tiers
//! (in-process LRU, Redis, persistent row store) to avoid repeated upstream calls.

pub mod cache;
pub mod captions;
pub mod cli;
pub mod config;
pub mod fetch;
pub mod media;
pub mod server;
pub mod stt;
pub mod utils;

pub use cache::{CacheKey, CacheManager, TranscriptResult, TranscriptSource};
pub use config::Config;
pub use fetch::FetchOrchestrator;

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Errors a transcript resolution can surface to callers
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    /// No caption track and no usable speech-to-text result
    #[error("no transcript available: {0}")]
    NoTranscript(String),

    /// The upstream rate-limited or IP-blocked us; retrying would make it worse
    #[error("upstream blocked the request: {0}")]
    Blocked(String),

    /// Transient upstream failure outside the per-language fallback chain
    #[error("transcript source unavailable: {0}")]
    SourceUnavailable(String),
}
