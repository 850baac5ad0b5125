//! Concurrent window fetching
//!
//! Every planned window is fetched at once through [`AssetSource::fetch_window`],
//! each under its own timeout. A failed window only marks itself; the caller
//! decides what an all-failed outcome means (see `fallback_controller`).

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::job_store::{JobUpdate, UpdateSender};
use crate::models::{AudioHandle, FetchedWindow, SegmentWindow, WindowOutcome};
use crate::types::{ArtifactStore, AssetError, AssetSource};

/// Progress reached when the fetch phase starts
pub const FETCH_PROGRESS_START: u8 = 5;

/// Progress reached when the fetch phase ends
pub const FETCH_PROGRESS_END: u8 = 50;

/// Fetching could not start; no window outcome exists
#[derive(Debug, Error)]
#[error("Segment fetch aborted: {0}")]
pub struct FetchAborted(#[from] pub AssetError);

/// Artifact name of a fetched window
pub fn segment_artifact_name(job_id: Uuid, index: usize) -> String {
    format!("{}_seg_{}.mp3", job_id, index)
}

/// Store `data` as `name`, logging (not surfacing) failures
pub(crate) async fn store_artifact(
    artifacts: &dyn ArtifactStore,
    name: String,
    data: &[u8],
) -> Option<String> {
    match artifacts.write(&name, data).await {
        Ok(()) => Some(name),
        Err(e) => {
            warn!(artifact = %name, error = %e, "Failed to store artifact");
            None
        }
    }
}

/// Fans out window fetches for one job
pub struct SegmentFetcher {
    source: Arc<dyn AssetSource>,
    artifacts: Arc<dyn ArtifactStore>,
    window_timeout: Duration,
}

impl SegmentFetcher {
    pub fn new(
        source: Arc<dyn AssetSource>,
        artifacts: Arc<dyn ArtifactStore>,
        window_timeout: Duration,
    ) -> Self {
        Self {
            source,
            artifacts,
            window_timeout,
        }
    }

    /// Fetch all `windows`, returning the successful ones sorted by index
    ///
    /// An empty vector means every window failed. Progress is published on
    /// `updates` after each window completes.
    pub async fn fetch_all(
        &self,
        job_id: Uuid,
        url: &str,
        windows: &[SegmentWindow],
        updates: &UpdateSender,
    ) -> Result<Vec<FetchedWindow>, FetchAborted> {
        tokio::time::timeout(self.window_timeout, self.source.prepare(url))
            .await
            .map_err(|_| AssetError::Timeout(self.window_timeout))??;

        let planned = windows.len();
        let mut pending: FuturesUnordered<_> = windows
            .iter()
            .map(|window| self.fetch_one(job_id, url, *window))
            .collect();

        let mut fetched = Vec::with_capacity(planned);
        let mut done = 0usize;

        while let Some(outcome) = pending.next().await {
            done += 1;
            match outcome {
                WindowOutcome::Fetched(window) => fetched.push(window),
                WindowOutcome::Failed { window, reason } => {
                    warn!(
                        job_id = %job_id,
                        window = window.index,
                        start = window.start,
                        end = window.end,
                        reason = %reason,
                        "Window fetch failed"
                    );
                }
            }

            let _ = updates.send(JobUpdate::DownloadProgress(scaled(done, planned, 0, 100)));
            let _ = updates.send(JobUpdate::Progress(scaled(
                done,
                planned,
                FETCH_PROGRESS_START,
                FETCH_PROGRESS_END,
            )));
        }

        fetched.sort_by_key(|w| w.window.index);
        info!(
            job_id = %job_id,
            planned,
            fetched = fetched.len(),
            "Segment fetch finished"
        );
        Ok(fetched)
    }

    async fn fetch_one(&self, job_id: Uuid, url: &str, window: SegmentWindow) -> WindowOutcome {
        let data = match tokio::time::timeout(
            self.window_timeout,
            self.source.fetch_window(url, window.start, window.end),
        )
        .await
        {
            Ok(Ok(data)) if !data.is_empty() => data,
            Ok(Ok(_)) => {
                return WindowOutcome::Failed {
                    window,
                    reason: AssetError::EmptyOutput.to_string(),
                }
            }
            Ok(Err(e)) => {
                return WindowOutcome::Failed {
                    window,
                    reason: e.to_string(),
                }
            }
            Err(_) => {
                return WindowOutcome::Failed {
                    window,
                    reason: AssetError::Timeout(self.window_timeout).to_string(),
                }
            }
        };

        debug!(job_id = %job_id, window = window.index, bytes = data.len(), "Window fetched");
        let artifact = store_artifact(
            self.artifacts.as_ref(),
            segment_artifact_name(job_id, window.index),
            &data,
        )
        .await;

        WindowOutcome::Fetched(FetchedWindow {
            window,
            audio: AudioHandle { artifact, data },
        })
    }
}

/// Map `done / total` onto the `[from, to]` progress band
pub(crate) fn scaled(done: usize, total: usize, from: u8, to: u8) -> u8 {
    if total == 0 {
        return to;
    }
    let span = (to - from) as usize;
    from + (done.min(total) * span / total) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{drain_updates, ScriptedSource};
    use crate::storage::FsArtifactStore;
    use tokio::sync::mpsc;

    fn windows(n: usize) -> Vec<SegmentWindow> {
        (0..n)
            .map(|i| SegmentWindow::new(i, i as f64 * 15.0, (i + 1) as f64 * 15.0))
            .collect()
    }

    fn fetcher(source: ScriptedSource) -> (tempfile::TempDir, Arc<FsArtifactStore>, SegmentFetcher) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsArtifactStore::open(dir.path()).unwrap());
        let fetcher = SegmentFetcher::new(Arc::new(source), store.clone(), Duration::from_secs(5));
        (dir, store, fetcher)
    }

    #[test]
    fn test_scaled_bands() {
        assert_eq!(scaled(0, 6, 5, 50), 5);
        assert_eq!(scaled(3, 6, 5, 50), 27);
        assert_eq!(scaled(6, 6, 5, 50), 50);
        assert_eq!(scaled(2, 3, 0, 100), 66);
        assert_eq!(scaled(0, 0, 50, 90), 90);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_successes_in_order() {
        let source = ScriptedSource::new(600.0).failing_windows(|start| start == 15.0);
        let (_dir, store, fetcher) = fetcher(source);
        let job_id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let fetched = fetcher
            .fetch_all(job_id, "https://youtu.be/abc", &windows(4), &tx)
            .await
            .unwrap();

        let indices: Vec<_> = fetched.iter().map(|w| w.window.index).collect();
        assert_eq!(indices, vec![0, 2, 3]);
        assert_eq!(
            fetched[0].audio.artifact.as_deref(),
            Some(segment_artifact_name(job_id, 0).as_str())
        );
        assert!(store.read(&segment_artifact_name(job_id, 2)).await.is_ok());
        assert!(store.read(&segment_artifact_name(job_id, 1)).await.is_err());

        let (progress, download) = drain_updates(&mut rx);
        assert_eq!(progress, vec![16, 27, 38, 50]);
        assert_eq!(download, vec![25, 50, 75, 100]);
    }

    #[tokio::test]
    async fn test_all_windows_failed_is_empty_not_error() {
        let source = ScriptedSource::new(600.0).failing_windows(|_| true);
        let (_dir, _store, fetcher) = fetcher(source);
        let (tx, _rx) = mpsc::unbounded_channel();

        let fetched = fetcher
            .fetch_all(Uuid::new_v4(), "https://youtu.be/abc", &windows(6), &tx)
            .await
            .unwrap();
        assert!(fetched.is_empty());
    }

    #[tokio::test]
    async fn test_prepare_failure_aborts() {
        let source = ScriptedSource::new(600.0).failing_prepare();
        let (_dir, _store, fetcher) = fetcher(source);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let result = fetcher
            .fetch_all(Uuid::new_v4(), "https://youtu.be/abc", &windows(6), &tx)
            .await;
        assert!(result.is_err());
        assert_eq!(drain_updates(&mut rx), (vec![], vec![]));
    }
}
