//! Rate-limited recognition fan-out
//!
//! One dispatcher serves the whole process. In-flight calls are capped by a
//! shared [`Semaphore`], and each job submits its windows in batches of at
//! most the cap with a short pause between batches. Every failure degrades to
//! "no track" for that window.

use futures::future::join_all;
use segid_common::config::RecognitionConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::job_store::{JobUpdate, UpdateSender};
use super::segment_fetcher::scaled;
use crate::models::{FetchedWindow, IdentifiedTrack, SegmentWindow, TimeRange};
use crate::types::{RecognitionError, Recognizer, TrackMatch};

/// Progress reached when recognition starts
pub const RECOGNITION_PROGRESS_START: u8 = 50;

/// Progress reached when recognition ends
pub const RECOGNITION_PROGRESS_END: u8 = 90;

/// Recognition result for one window
#[derive(Debug, Clone)]
pub struct RecognitionOutcome {
    pub window: SegmentWindow,
    pub track: Option<IdentifiedTrack>,
}

pub struct RecognitionDispatcher {
    recognizer: Arc<dyn Recognizer>,
    permits: Arc<Semaphore>,
    batch_size: usize,
    batch_delay: Duration,
    timeout: Duration,
    min_payload: usize,
    max_payload: usize,
}

impl RecognitionDispatcher {
    pub fn new(recognizer: Arc<dyn Recognizer>, config: &RecognitionConfig) -> Self {
        let cap = config.concurrency.max(1);
        Self {
            recognizer,
            permits: Arc::new(Semaphore::new(cap)),
            batch_size: cap,
            batch_delay: config.batch_delay(),
            timeout: config.timeout(),
            min_payload: config.min_payload_bytes,
            max_payload: config.max_payload_bytes,
        }
    }

    /// Identify every window; outcomes are ordered by window index
    pub async fn dispatch(
        &self,
        job_id: Uuid,
        windows: &[FetchedWindow],
        updates: &UpdateSender,
    ) -> Vec<RecognitionOutcome> {
        let total_batches = windows.len().div_ceil(self.batch_size);
        let mut outcomes = Vec::with_capacity(windows.len());

        for (batch_index, batch) in windows.chunks(self.batch_size).enumerate() {
            if batch_index > 0 && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }

            let results = join_all(batch.iter().map(|w| self.identify_window(job_id, w))).await;
            outcomes.extend(results);

            let _ = updates.send(JobUpdate::Progress(scaled(
                batch_index + 1,
                total_batches,
                RECOGNITION_PROGRESS_START,
                RECOGNITION_PROGRESS_END,
            )));
        }

        outcomes.sort_by_key(|o| o.window.index);
        info!(
            job_id = %job_id,
            windows = windows.len(),
            matched = outcomes.iter().filter(|o| o.track.is_some()).count(),
            batches = total_batches,
            "Recognition finished"
        );
        outcomes
    }

    async fn identify_window(&self, job_id: Uuid, fetched: &FetchedWindow) -> RecognitionOutcome {
        let window = fetched.window;
        let track = match self.identify(&fetched.audio.data).await {
            Ok(track_match) => Some(to_identified(track_match, &window)),
            Err(RecognitionError::NoMatch) => {
                debug!(job_id = %job_id, window = window.index, "No match");
                None
            }
            Err(e) => {
                warn!(job_id = %job_id, window = window.index, error = %e, "Recognition failed");
                None
            }
        };
        RecognitionOutcome { window, track }
    }

    async fn identify(&self, audio: &bytes::Bytes) -> Result<TrackMatch, RecognitionError> {
        self.validate_payload(audio.len())?;

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| RecognitionError::Network(e.to_string()))?;

        tokio::time::timeout(self.timeout, self.recognizer.identify(audio.clone()))
            .await
            .map_err(|_| RecognitionError::Timeout(self.timeout))??
            .ok_or(RecognitionError::NoMatch)
    }

    fn validate_payload(&self, size: usize) -> Result<(), RecognitionError> {
        if size == 0 {
            return Err(RecognitionError::EmptyPayload);
        }
        if size < self.min_payload {
            return Err(RecognitionError::PayloadTooSmall {
                size,
                min: self.min_payload,
            });
        }
        if size > self.max_payload {
            return Err(RecognitionError::PayloadTooLarge {
                size,
                max: self.max_payload,
            });
        }
        Ok(())
    }
}

fn to_identified(track: TrackMatch, window: &SegmentWindow) -> IdentifiedTrack {
    IdentifiedTrack {
        title: track.title,
        artist: track.artist,
        album: track.album,
        genre: track.genre,
        release_date: track.release_date,
        duration_seconds: track.duration_seconds,
        time_range: TimeRange {
            start: window.start,
            end: window.end,
        },
        confidence: track.score.map(|s| s.min(100) as u8).unwrap_or(100),
        external_ids: track.external_ids,
    }
}
