//! Job pipeline
//!
//! Drives one job from URL to result:
//!
//! 1. Resolve metadata (cached) and check the duration
//! 2. Plan windows and fetch them concurrently
//! 3. Fall back to a single full download when no window could be fetched
//! 4. Recognize windows under the global rate limit
//! 5. Deduplicate hits and compile the result
//!
//! The job record is only touched through the job's update channel.

use segid_common::config::TomlConfig;
use segid_common::events::{EventBus, SegidEvent};
use segid_common::human_time::{format_millis, format_range, format_seconds};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::deduplicator::deduplicate;
use super::fallback_controller::{Decision, FallbackController, FallbackError};
use super::job_store::{JobStore, JobUpdate, UpdateSender};
use super::metadata_cache::MetadataCache;
use super::recognition_dispatcher::RecognitionDispatcher;
use super::segment_fetcher::SegmentFetcher;
use super::segment_planner::{PlanError, SegmentPlanner};
use crate::models::{JobMetrics, JobResult};
use crate::types::{ArtifactStore, AssetError, AssetSource, Recognizer};

/// Progress published when a job starts
const PROGRESS_STARTED: u8 = 1;

/// Progress published once metadata is validated and fetching begins
const PROGRESS_FETCHING: u8 = 5;

/// Progress published before recognition
const PROGRESS_RECOGNIZING: u8 = 50;

/// Progress published before results are compiled
const PROGRESS_COMPILING: u8 = 90;

/// Job failure, reduced to a user-facing message when stored
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input rejected; the message is already user-facing
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Could not resolve asset metadata: {0}")]
    AssetInfo(#[from] AssetError),

    #[error("Full download failed: {0}")]
    FullFetch(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Message stored on the failed job; never carries internal detail
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Validation(msg) => msg.clone(),
            PipelineError::AssetInfo(_) => "Could not read video information".to_string(),
            PipelineError::FullFetch(_) => "Could not download audio from the video".to_string(),
            PipelineError::Internal(_) => "Internal processing error".to_string(),
        }
    }
}

impl From<PlanError> for PipelineError {
    fn from(err: PlanError) -> Self {
        PipelineError::Validation(match err {
            PlanError::InvalidDuration(_) => "Video duration is unavailable".to_string(),
            other => other.to_string(),
        })
    }
}

impl From<FallbackError> for PipelineError {
    fn from(err: FallbackError) -> Self {
        match err {
            FallbackError::FullFetch(msg) => PipelineError::FullFetch(msg),
            other @ FallbackError::InvalidTransition { .. } => {
                PipelineError::Internal(other.to_string())
            }
        }
    }
}

/// Per-call timeouts and limits taken from configuration
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub window_length: f64,
    pub window_count: usize,
    pub max_duration: f64,
    pub info_timeout: Duration,
    pub window_timeout: Duration,
    pub full_timeout: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &TomlConfig) -> Self {
        Self {
            window_length: config.pipeline.window_length_secs as f64,
            window_count: config.pipeline.window_count,
            max_duration: config.pipeline.max_duration_secs as f64,
            info_timeout: config.fetch.info_timeout(),
            window_timeout: config.fetch.window_timeout(),
            full_timeout: config.fetch.full_timeout(),
        }
    }
}

/// Shared job pipeline; one instance per process
pub struct Pipeline {
    settings: PipelineSettings,
    source: Arc<dyn AssetSource>,
    artifacts: Arc<dyn ArtifactStore>,
    store: Arc<JobStore>,
    cache: MetadataCache,
    planner: SegmentPlanner,
    fetcher: SegmentFetcher,
    dispatcher: RecognitionDispatcher,
    event_bus: EventBus,
}

impl Pipeline {
    pub fn new(
        config: &TomlConfig,
        source: Arc<dyn AssetSource>,
        recognizer: Arc<dyn Recognizer>,
        artifacts: Arc<dyn ArtifactStore>,
        store: Arc<JobStore>,
        event_bus: EventBus,
    ) -> Self {
        let settings = PipelineSettings::from_config(config);
        Self {
            planner: SegmentPlanner::new(settings.window_length, settings.window_count),
            fetcher: SegmentFetcher::new(
                Arc::clone(&source),
                Arc::clone(&artifacts),
                settings.window_timeout,
            ),
            dispatcher: RecognitionDispatcher::new(recognizer, &config.recognition),
            cache: MetadataCache::new(config.cache_ttl()),
            settings,
            source,
            artifacts,
            store,
            event_bus,
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Create a job for `url` and run it in the background
    ///
    /// Returns as soon as the job exists; `url` must already be validated.
    pub fn submit(self: &Arc<Self>, url: &str) -> Uuid {
        let job = self.store.create(url);
        let job_id = job.id;
        let pipeline = Arc::clone(self);

        tokio::spawn(async move {
            pipeline.run(job_id, &job.source_url).await;
        });

        job_id
    }

    /// Run job `job_id` to completion; the record is final when this returns
    pub async fn run(&self, job_id: Uuid, url: &str) {
        let started = Instant::now();
        let updates = self.store.open_updates(job_id);
        info!(job_id = %job_id, url = %url, "Job started");

        match self.execute(job_id, url, updates.sender(), started).await {
            Ok(result) => {
                info!(
                    job_id = %job_id,
                    tracks = result.tracks.len(),
                    mode = result.metrics.mode.as_str(),
                    elapsed = %format_millis(result.metrics.elapsed_ms),
                    "Job completed"
                );
                updates.send(JobUpdate::Completed(result));
            }
            Err(e) => {
                match &e {
                    PipelineError::Internal(_) => error!(job_id = %job_id, error = %e, "Job failed"),
                    _ => warn!(job_id = %job_id, error = %e, "Job failed"),
                }
                updates.send(JobUpdate::Failed(e.user_message()));
            }
        }

        updates.close().await;
    }

    async fn execute(
        &self,
        job_id: Uuid,
        url: &str,
        updates: &UpdateSender,
        started: Instant,
    ) -> Result<JobResult, PipelineError> {
        let _ = updates.send(JobUpdate::Progress(PROGRESS_STARTED));

        let asset = self
            .cache
            .resolve(url, self.source.as_ref(), self.settings.info_timeout)
            .await?;
        self.check_duration(asset.duration)?;
        info!(
            job_id = %job_id,
            title = %asset.title,
            platform = ?asset.platform,
            duration = %format_seconds(asset.duration),
            "Asset resolved"
        );

        let _ = updates.send(JobUpdate::Progress(PROGRESS_FETCHING));
        let windows = self.planner.plan(asset.duration)?;
        for window in &windows {
            debug!(
                job_id = %job_id,
                window = window.index,
                range = %format_range(window.start, window.end),
                "Window planned"
            );
        }

        let segment = self.fetcher.fetch_all(job_id, url, &windows, updates).await;

        let mut controller = FallbackController::new(
            Arc::clone(&self.source),
            Arc::clone(&self.artifacts),
            self.settings.full_timeout,
            self.planner.window_length(),
        );
        let fetched = match controller.decide(segment)? {
            Decision::UseSegments(fetched) => fetched,
            Decision::FullPath { reason } => {
                warn!(job_id = %job_id, reason = %reason, "Falling back to full download");
                self.event_bus.emit_lossy(SegidEvent::FallbackEngaged {
                    job_id,
                    reason,
                    timestamp: chrono::Utc::now(),
                });
                controller
                    .fetch_full(job_id, url, asset.duration, updates)
                    .await?
            }
        };

        let _ = updates.send(JobUpdate::Progress(PROGRESS_RECOGNIZING));
        let outcomes = self.dispatcher.dispatch(job_id, &fetched, updates).await;

        let _ = updates.send(JobUpdate::Progress(PROGRESS_COMPILING));
        let windows_analyzed = outcomes.len();
        let tracks = deduplicate(outcomes.into_iter().filter_map(|o| o.track));

        let mut artifacts: Vec<String> = fetched
            .iter()
            .filter_map(|w| w.audio.artifact.clone())
            .collect();
        if let Some(full) = controller.full_artifact() {
            artifacts.insert(0, full.to_string());
        }

        Ok(JobResult {
            metrics: JobMetrics {
                elapsed_ms: started.elapsed().as_millis() as u64,
                windows_planned: windows.len(),
                windows_fetched: fetched.len(),
                windows_analyzed,
                tracks_found: tracks.len(),
                mode: controller.mode(),
            },
            asset,
            tracks,
            artifacts,
        })
    }

    fn check_duration(&self, duration: f64) -> Result<(), PipelineError> {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(PipelineError::Validation(
                "Video duration is unavailable".to_string(),
            ));
        }
        if duration > self.settings.max_duration {
            return Err(PipelineError::Validation(format!(
                "Video is too long (maximum {})",
                format_seconds(self.settings.max_duration)
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fallback_controller::FetchState;

    #[test]
    fn test_user_messages_hide_detail() {
        let err = PipelineError::AssetInfo(AssetError::CommandFailed {
            command: "yt-dlp".to_string(),
            status: "1".to_string(),
            stderr: "HTTP Error 403 at /home/user".to_string(),
        });
        assert_eq!(err.user_message(), "Could not read video information");

        let err: PipelineError = FallbackError::FullFetch("ffmpeg exit 1".to_string()).into();
        assert_eq!(err.user_message(), "Could not download audio from the video");

        let err: PipelineError = FallbackError::InvalidTransition {
            from: FetchState::FullPath,
        }
        .into();
        assert!(matches!(err, PipelineError::Internal(_)));
        assert_eq!(err.user_message(), "Internal processing error");
    }

    #[test]
    fn test_plan_errors_are_validation() {
        let err: PipelineError = PlanError::InvalidDuration(-1.0).into();
        assert_eq!(err.user_message(), "Video duration is unavailable");
    }

    #[test]
    fn test_settings_from_defaults() {
        let settings = PipelineSettings::from_config(&TomlConfig::default());
        assert_eq!(settings.window_length, 15.0);
        assert_eq!(settings.window_count, 6);
        assert_eq!(settings.max_duration, 10_800.0);
        assert_eq!(settings.info_timeout, Duration::from_secs(30));
    }
}
