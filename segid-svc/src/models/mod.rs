//! Data models for segid-svc

pub mod asset;
pub mod job;
pub mod track;
pub mod window;

pub use asset::{AssetInfo, Platform};
pub use job::{Job, JobMetrics, JobResult, JobStatus, PipelineMode};
pub use track::{IdentifiedTrack, TimeRange};
pub use window::{AudioHandle, FetchedWindow, SegmentWindow, WindowOutcome};
