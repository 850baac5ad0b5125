//! In-memory job store
//!
//! Jobs live in a sharded [`DashMap`] keyed by id. The pipeline never writes
//! records directly: it sends [`JobUpdate`]s through a per-job channel opened
//! with [`JobStore::open_updates`], and a consumer task applies them in order.
//! Every applied change is published on the [`EventBus`].

use chrono::Utc;
use dashmap::DashMap;
use segid_common::events::{EventBus, SegidEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Job, JobResult, JobStatus};

/// Change requested by the pipeline for one job
#[derive(Debug, Clone)]
pub enum JobUpdate {
    /// Overall progress; lower values than the stored one are ignored
    Progress(u8),
    /// Download phase progress
    DownloadProgress(u8),
    Completed(JobResult),
    Failed(String),
}

/// Sending half of a job's update channel
pub type UpdateSender = mpsc::UnboundedSender<JobUpdate>;

/// Open update channel for one job
///
/// The record is final once [`JobUpdates::close`] returns.
pub struct JobUpdates {
    tx: UpdateSender,
    consumer: JoinHandle<()>,
}

impl JobUpdates {
    pub fn sender(&self) -> &UpdateSender {
        &self.tx
    }

    /// Shorthand for sending on the channel; a closed channel is ignored
    pub fn send(&self, update: JobUpdate) {
        let _ = self.tx.send(update);
    }

    /// Close the channel and wait until every queued update is applied
    pub async fn close(self) {
        drop(self.tx);
        if let Err(e) = self.consumer.await {
            warn!(error = %e, "Job update consumer ended abnormally");
        }
    }
}

/// Keyed job registry
pub struct JobStore {
    jobs: DashMap<Uuid, Job>,
    event_bus: EventBus,
}

impl JobStore {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            jobs: DashMap::new(),
            event_bus,
        }
    }

    /// Insert a new job and move it straight to processing
    ///
    /// Input validation is the caller's responsibility.
    pub fn create(&self, source_url: &str) -> Job {
        let mut job = Job::new(source_url.to_string());
        job.transition_to(JobStatus::Processing);

        self.jobs.insert(job.id, job.clone());
        self.event_bus.emit_lossy(SegidEvent::JobCreated {
            job_id: job.id,
            source_url: job.source_url.clone(),
            timestamp: Utc::now(),
        });
        debug!(job_id = %job.id, "Job created");
        job
    }

    /// Snapshot of a job
    pub fn get(&self, id: &Uuid) -> Option<Job> {
        self.jobs.get(id).map(|job| job.clone())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Apply one update; returns whether the record changed
    ///
    /// Updates to unknown or terminal jobs are dropped.
    pub fn apply(&self, id: Uuid, update: JobUpdate) -> bool {
        let event = {
            let Some(mut job) = self.jobs.get_mut(&id) else {
                warn!(job_id = %id, "Update for unknown job dropped");
                return false;
            };
            if job.is_terminal() {
                debug!(job_id = %id, "Update for finished job dropped");
                return false;
            }

            match update {
                JobUpdate::Progress(progress) => {
                    if !job.advance_progress(progress) {
                        return false;
                    }
                    progress_event(&job)
                }
                JobUpdate::DownloadProgress(download_progress) => {
                    if !job.set_download_progress(download_progress) {
                        return false;
                    }
                    progress_event(&job)
                }
                JobUpdate::Completed(result) => {
                    let tracks_found = result.tracks.len();
                    let mode = result.metrics.mode.as_str().to_string();
                    if !job.complete(result) {
                        return false;
                    }
                    SegidEvent::JobCompleted {
                        job_id: id,
                        tracks_found,
                        mode,
                        timestamp: Utc::now(),
                    }
                }
                JobUpdate::Failed(error) => {
                    if !job.fail(error.clone()) {
                        return false;
                    }
                    SegidEvent::JobFailed {
                        job_id: id,
                        error,
                        timestamp: Utc::now(),
                    }
                }
            }
        };

        // Shard lock released before publishing
        self.event_bus.emit_lossy(event);
        true
    }

    /// Open the update channel for `id`, spawning its consumer task
    pub fn open_updates(self: &Arc<Self>, id: Uuid) -> JobUpdates {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let store = Arc::clone(self);

        let consumer = tokio::spawn(async move {
            while let Some(update) = rx.recv().await {
                store.apply(id, update);
            }
        });

        JobUpdates { tx, consumer }
    }
}

fn progress_event(job: &Job) -> SegidEvent {
    SegidEvent::JobProgress {
        job_id: job.id,
        progress: job.progress,
        download_progress: job.download_progress,
        timestamp: Utc::now(),
    }
}
