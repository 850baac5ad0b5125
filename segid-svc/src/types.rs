//! Collaborator trait definitions
//!
//! The pipeline only talks to the outside world through these three seams:
//! - [`AssetSource`]: metadata, window fetches, full downloads and local splitting
//! - [`Recognizer`]: identifies a short audio clip
//! - [`ArtifactStore`]: scoped storage for fetched audio
//!
//! Production implementations live in `extractors` and `storage`; tests
//! substitute scripted doubles.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use thiserror::Error;

use crate::models::AssetInfo;

// ============================================================================
// Asset source
// ============================================================================

/// Access to a remote media asset
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Resolve duration, title and related metadata
    async fn get_info(&self, url: &str) -> Result<AssetInfo, AssetError>;

    /// Prepare `url` for window fetching (e.g. resolve a direct stream URL)
    async fn prepare(&self, _url: &str) -> Result<(), AssetError> {
        Ok(())
    }

    /// Fetch audio for `[start, end)` seconds without downloading the whole asset
    async fn fetch_window(&self, url: &str, start: f64, end: f64) -> Result<Bytes, AssetError>;

    /// Download the whole asset's audio
    async fn fetch_full(&self, url: &str) -> Result<Bytes, AssetError>;

    /// Split full audio into consecutive clips of `window_length` seconds
    async fn split_full(&self, audio: Bytes, window_length: f64) -> Result<Vec<Bytes>, AssetError>;
}

/// Asset source failure
#[derive(Debug, Error)]
pub enum AssetError {
    /// External command exited unsuccessfully
    #[error("{command} failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// Call exceeded its timeout
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Output could not be interpreted
    #[error("Parse error: {0}")]
    Parse(String),

    /// Source returned no audio
    #[error("Empty audio output")]
    EmptyOutput,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Recognizer
// ============================================================================

/// Track metadata returned by the recognition service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMatch {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub release_date: Option<String>,
    pub duration_seconds: Option<u32>,
    /// Match score 0-100 when the service reports one
    pub score: Option<u32>,
    pub external_ids: BTreeMap<String, String>,
}

/// Identifies short audio clips
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// `Ok(None)` when the service found no match
    async fn identify(&self, audio: Bytes) -> Result<Option<TrackMatch>, RecognitionError>;
}

/// Recognition failure; always absorbed as "no track" for the window
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("Recognition timed out after {0:?}")]
    Timeout(Duration),

    #[error("Payload is empty")]
    EmptyPayload,

    #[error("Payload too small: {size} bytes (minimum {min})")]
    PayloadTooSmall { size: usize, min: usize },

    #[error("Payload too large: {size} bytes (maximum {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("No match")]
    NoMatch,

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },
}

// ============================================================================
// Artifact store
// ============================================================================

/// Stored artifact as seen by the reaper
#[derive(Debug, Clone)]
pub struct ArtifactEntry {
    pub name: String,
    pub size: u64,
    /// Last access time, falling back to modification time where atime is unavailable
    pub last_access: SystemTime,
}

/// Scoped byte-blob storage
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn write(&self, name: &str, data: &[u8]) -> Result<(), ArtifactError>;

    async fn read(&self, name: &str) -> Result<Bytes, ArtifactError>;

    async fn delete(&self, name: &str) -> Result<(), ArtifactError>;

    async fn list(&self) -> Result<Vec<ArtifactEntry>, ArtifactError>;

    /// Absolute path of `name`, refusing names that escape the store root
    fn resolve(&self, name: &str) -> Result<PathBuf, ArtifactError>;
}

/// Artifact storage failure; logged, never surfaced on a job
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Invalid artifact name: {0}")]
    InvalidName(String),

    #[error("Artifact path escapes the artifact root: {0}")]
    EscapesRoot(String),

    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
