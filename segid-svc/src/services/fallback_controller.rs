//! Segment/full-download fallback state machine
//!
//! ```text
//! Segment ──(≥1 window fetched)──► SegmentSucceeded
//!    │
//!    └──(0 windows or aborted)──► FullPath
//! ```
//!
//! The switch is one-way. A second decision is refused, and the full download
//! runs at most once per controller (one controller per job).

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::job_store::{JobUpdate, UpdateSender};
use super::segment_fetcher::{store_artifact, FetchAborted};
use crate::models::{AudioHandle, FetchedWindow, PipelineMode, SegmentWindow};
use crate::types::{ArtifactStore, AssetError, AssetSource};

/// Fetch path state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    /// Sampled windows being fetched
    Segment,
    /// At least one window fetched; terminal
    SegmentSucceeded,
    /// Whole-asset download engaged; terminal
    FullPath,
}

/// What the pipeline should do after the segment fetch
#[derive(Debug)]
pub enum Decision {
    /// Recognize these windows
    UseSegments(Vec<FetchedWindow>),
    /// Switch to the full download
    FullPath { reason: String },
}

#[derive(Debug, Error)]
pub enum FallbackError {
    /// Full download, split or empty split result
    #[error("Full download failed: {0}")]
    FullFetch(String),

    #[error("Invalid fetch state transition from {from:?}")]
    InvalidTransition { from: FetchState },
}

/// Artifact name of the whole downloaded asset
pub fn full_artifact_name(job_id: Uuid) -> String {
    format!("{}_full.mp3", job_id)
}

/// Artifact name of one locally split part
pub fn part_artifact_name(job_id: Uuid, index: usize) -> String {
    format!("{}_part_{}.mp3", job_id, index)
}

/// Per-job fallback controller
pub struct FallbackController {
    state: FetchState,
    full_attempted: bool,
    full_artifact: Option<String>,
    source: Arc<dyn AssetSource>,
    artifacts: Arc<dyn ArtifactStore>,
    full_timeout: Duration,
    window_length: f64,
}

impl FallbackController {
    pub fn new(
        source: Arc<dyn AssetSource>,
        artifacts: Arc<dyn ArtifactStore>,
        full_timeout: Duration,
        window_length: f64,
    ) -> Self {
        Self {
            state: FetchState::Segment,
            full_attempted: false,
            full_artifact: None,
            source,
            artifacts,
            full_timeout,
            window_length,
        }
    }

    pub fn state(&self) -> FetchState {
        self.state
    }

    /// Stored name of the full download, once it succeeded
    pub fn full_artifact(&self) -> Option<&str> {
        self.full_artifact.as_deref()
    }

    /// Mode reported in job metrics
    pub fn mode(&self) -> PipelineMode {
        match self.state {
            FetchState::FullPath => PipelineMode::FullFallback,
            FetchState::Segment | FetchState::SegmentSucceeded => PipelineMode::Segment,
        }
    }

    /// Decide on the segment fetch outcome; legal once, from `Segment`
    pub fn decide(
        &mut self,
        segment: Result<Vec<FetchedWindow>, FetchAborted>,
    ) -> Result<Decision, FallbackError> {
        if self.state != FetchState::Segment {
            return Err(FallbackError::InvalidTransition { from: self.state });
        }

        match segment {
            Ok(windows) if !windows.is_empty() => {
                self.state = FetchState::SegmentSucceeded;
                Ok(Decision::UseSegments(windows))
            }
            Ok(_) => {
                self.state = FetchState::FullPath;
                Ok(Decision::FullPath {
                    reason: "No sampled window could be fetched".to_string(),
                })
            }
            Err(aborted) => {
                self.state = FetchState::FullPath;
                Ok(Decision::FullPath {
                    reason: aborted.to_string(),
                })
            }
        }
    }

    /// Download the whole asset once and split it into consecutive windows
    pub async fn fetch_full(
        &mut self,
        job_id: Uuid,
        url: &str,
        duration: f64,
        updates: &UpdateSender,
    ) -> Result<Vec<FetchedWindow>, FallbackError> {
        if self.state != FetchState::FullPath || self.full_attempted {
            return Err(FallbackError::InvalidTransition { from: self.state });
        }
        self.full_attempted = true;

        info!(job_id = %job_id, "Downloading full asset");
        let _ = updates.send(JobUpdate::DownloadProgress(0));

        let audio = self
            .timed(self.source.fetch_full(url))
            .await
            .map_err(|e| FallbackError::FullFetch(e.to_string()))?;
        if audio.is_empty() {
            return Err(FallbackError::FullFetch(AssetError::EmptyOutput.to_string()));
        }
        let _ = updates.send(JobUpdate::DownloadProgress(100));

        self.full_artifact =
            store_artifact(self.artifacts.as_ref(), full_artifact_name(job_id), &audio).await;

        let parts = self
            .timed(self.source.split_full(audio, self.window_length))
            .await
            .map_err(|e| FallbackError::FullFetch(e.to_string()))?;

        let mut windows = Vec::with_capacity(parts.len());
        for (index, data) in parts.into_iter().enumerate() {
            let start = index as f64 * self.window_length;
            if start >= duration {
                warn!(job_id = %job_id, part = index, "Split part starts past the asset end, skipped");
                continue;
            }
            let end = ((index + 1) as f64 * self.window_length).min(duration);
            let artifact =
                store_artifact(self.artifacts.as_ref(), part_artifact_name(job_id, index), &data)
                    .await;

            windows.push(FetchedWindow {
                window: SegmentWindow::new(index, start, end),
                audio: AudioHandle { artifact, data },
            });
        }

        if windows.is_empty() {
            return Err(FallbackError::FullFetch(
                "Splitting produced no audio parts".to_string(),
            ));
        }

        info!(job_id = %job_id, parts = windows.len(), "Full asset split");
        Ok(windows)
    }

    async fn timed<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, AssetError>>,
    ) -> Result<T, AssetError> {
        tokio::time::timeout(self.full_timeout, call)
            .await
            .map_err(|_| AssetError::Timeout(self.full_timeout))?
    }
}
