//! Periodic artifact cleanup
//!
//! Deletes artifacts whose last access is older than the configured maximum
//! age with a 1.5x margin, so files of a job still being served are left
//! alone. Runs until its [`CancellationToken`] is cancelled.

use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::types::{ArtifactError, ArtifactStore};

/// Margin applied to the nominal artifact lifetime
pub const AGE_MARGIN: f64 = 1.5;

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub scanned: usize,
    pub removed: usize,
    pub failed: usize,
}

pub struct Reaper {
    artifacts: Arc<dyn ArtifactStore>,
    max_age: Duration,
    interval: Duration,
}

impl Reaper {
    pub fn new(artifacts: Arc<dyn ArtifactStore>, max_age: Duration, interval: Duration) -> Self {
        Self {
            artifacts,
            max_age,
            interval,
        }
    }

    /// Age past which an artifact is deleted
    pub fn cutoff_age(&self) -> Duration {
        self.max_age.mul_f64(AGE_MARGIN)
    }

    pub async fn sweep_once(&self) -> Result<ReapReport, ArtifactError> {
        self.sweep_at(SystemTime::now()).await
    }

    async fn sweep_at(&self, now: SystemTime) -> Result<ReapReport, ArtifactError> {
        let cutoff = self.cutoff_age();
        let entries = self.artifacts.list().await?;
        let mut report = ReapReport {
            scanned: entries.len(),
            ..Default::default()
        };

        for entry in entries {
            // Clock skew (access in the future) counts as fresh
            let age = now.duration_since(entry.last_access).unwrap_or_default();
            if age <= cutoff {
                continue;
            }

            match self.artifacts.delete(&entry.name).await {
                Ok(()) => {
                    debug!(artifact = %entry.name, age_secs = age.as_secs(), "Artifact removed");
                    report.removed += 1;
                }
                Err(e) => {
                    warn!(artifact = %entry.name, error = %e, "Failed to remove artifact");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Sweep every interval until `shutdown` is cancelled
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                interval_secs = self.interval.as_secs(),
                cutoff_secs = self.cutoff_age().as_secs(),
                "Artifact reaper starting"
            );

            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // Skip the first immediate tick
            interval.tick().await;

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown.cancelled() => {
                        info!("Artifact reaper shutting down");
                        break;
                    }

                    _ = interval.tick() => {
                        match self.sweep_once().await {
                            Ok(report) => info!(
                                scanned = report.scanned,
                                removed = report.removed,
                                failed = report.failed,
                                "Artifact sweep finished"
                            ),
                            Err(e) => warn!(error = %e, "Artifact sweep failed"),
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ArtifactEntry;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Store with fixed entries; deleting `locked*` names fails
    struct ListedStore {
        entries: Mutex<Vec<ArtifactEntry>>,
    }

    impl ListedStore {
        fn with_ages(now: SystemTime, ages: &[(&str, u64)]) -> Self {
            let entries = ages
                .iter()
                .map(|(name, age)| ArtifactEntry {
                    name: name.to_string(),
                    size: 1,
                    last_access: now - Duration::from_secs(*age),
                })
                .collect();
            Self {
                entries: Mutex::new(entries),
            }
        }

        fn names(&self) -> Vec<String> {
            self.entries.lock().unwrap().iter().map(|e| e.name.clone()).collect()
        }
    }

    #[async_trait]
    impl ArtifactStore for ListedStore {
        async fn write(&self, _: &str, _: &[u8]) -> Result<(), ArtifactError> {
            unreachable!()
        }

        async fn read(&self, name: &str) -> Result<Bytes, ArtifactError> {
            Err(ArtifactError::NotFound(name.to_string()))
        }

        async fn delete(&self, name: &str) -> Result<(), ArtifactError> {
            if name.starts_with("locked") {
                return Err(ArtifactError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "locked",
                )));
            }
            self.entries.lock().unwrap().retain(|e| e.name != name);
            Ok(())
        }

        async fn list(&self) -> Result<Vec<ArtifactEntry>, ArtifactError> {
            Ok(self.entries.lock().unwrap().clone())
        }

        fn resolve(&self, name: &str) -> Result<PathBuf, ArtifactError> {
            Ok(PathBuf::from(name))
        }
    }

    #[tokio::test]
    async fn test_sweep_removes_only_stale() {
        let now = SystemTime::now();
        // Max age one hour: cutoff is 90 minutes
        let store = Arc::new(ListedStore::with_ages(
            now,
            &[("fresh.mp3", 60 * 60), ("edge.mp3", 90 * 60), ("stale.mp3", 91 * 60)],
        ));
        let reaper = Reaper::new(store.clone(), Duration::from_secs(3600), Duration::from_secs(60));

        let report = reaper.sweep_at(now).await.unwrap();
        assert_eq!(
            report,
            ReapReport {
                scanned: 3,
                removed: 1,
                failed: 0
            }
        );
        assert_eq!(store.names(), vec!["fresh.mp3", "edge.mp3"]);
    }

    #[tokio::test]
    async fn test_delete_failure_is_skipped() {
        let now = SystemTime::now();
        let store = Arc::new(ListedStore::with_ages(
            now,
            &[("locked.mp3", 10_000), ("old.mp3", 10_000)],
        ));
        let reaper = Reaper::new(store.clone(), Duration::from_secs(3600), Duration::from_secs(60));

        let report = reaper.sweep_at(now).await.unwrap();
        assert_eq!(report.removed, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(store.names(), vec!["locked.mp3"]);
    }

    #[tokio::test]
    async fn test_spawn_stops_on_cancel() {
        let store = Arc::new(ListedStore::with_ages(SystemTime::now(), &[]));
        let reaper = Reaper::new(store, Duration::from_secs(1), Duration::from_millis(5));
        let token = CancellationToken::new();

        let handle = reaper.spawn(token.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("reaper did not stop")
            .unwrap();
    }
}
