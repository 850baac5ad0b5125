//! Job record and state machine
//!
//! A job progresses QUEUED → PROCESSING → COMPLETED | FAILED and never regresses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AssetInfo, IdentifiedTrack};

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted, pipeline not yet started
    Queued,
    /// Pipeline running
    Processing,
    /// Finished with a result (possibly with zero tracks)
    Completed,
    /// Finished with an error
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether `self → next` is a legal transition
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

/// Fetch strategy a job ended up using
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineMode {
    /// Sampled windows fetched directly
    #[serde(rename = "segment")]
    Segment,
    /// Whole asset downloaded, then split locally
    #[serde(rename = "full-fallback")]
    FullFallback,
}

impl PipelineMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineMode::Segment => "segment",
            PipelineMode::FullFallback => "full-fallback",
        }
    }
}

/// Processing metrics reported with a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMetrics {
    pub elapsed_ms: u64,
    pub windows_planned: usize,
    pub windows_fetched: usize,
    pub windows_analyzed: usize,
    pub tracks_found: usize,
    pub mode: PipelineMode,
}

/// Compiled output of a completed job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub asset: AssetInfo,
    pub tracks: Vec<IdentifiedTrack>,
    pub metrics: JobMetrics,
    /// Artifact file names downloadable through `/api/download`
    pub artifacts: Vec<String>,
}

/// Job record held by the job store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    /// Overall progress 0-100, non-decreasing
    pub progress: u8,
    /// Download phase progress 0-100
    pub download_progress: u8,
    pub source_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    /// Create a queued job
    pub fn new(source_url: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Queued,
            progress: 0,
            download_progress: 0,
            source_url,
            created_at: now,
            updated_at: now,
            result: None,
            error: None,
        }
    }

    /// Move to `next`; illegal transitions are refused and leave the job unchanged
    pub fn transition_to(&mut self, next: JobStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.updated_at = Utc::now();
        true
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Raise progress; lower values are ignored
    pub fn advance_progress(&mut self, progress: u8) -> bool {
        let progress = progress.min(100);
        if progress <= self.progress {
            return false;
        }
        self.progress = progress;
        self.updated_at = Utc::now();
        true
    }

    pub fn set_download_progress(&mut self, download_progress: u8) -> bool {
        let download_progress = download_progress.min(100);
        if download_progress == self.download_progress {
            return false;
        }
        self.download_progress = download_progress;
        self.updated_at = Utc::now();
        true
    }

    /// Terminal success; only legal from PROCESSING
    pub fn complete(&mut self, result: JobResult) -> bool {
        if !self.transition_to(JobStatus::Completed) {
            return false;
        }
        self.result = Some(result);
        self.error = None;
        self.progress = 100;
        true
    }

    /// Terminal failure; only legal from PROCESSING
    pub fn fail(&mut self, error: String) -> bool {
        if !self.transition_to(JobStatus::Failed) {
            return false;
        }
        self.error = Some(error);
        self.result = None;
        true
    }
}
