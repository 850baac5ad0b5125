//! Pipeline services
//!
//! Each stage of a job lives in its own module; [`pipeline`] wires them together.

pub mod deduplicator;
pub mod fallback_controller;
pub mod job_store;
pub mod metadata_cache;
pub mod pipeline;
pub mod reaper;
pub mod recognition_dispatcher;
pub mod segment_fetcher;
pub mod segment_planner;

#[cfg(test)]
pub(crate) mod test_support;

pub use deduplicator::deduplicate;
pub use fallback_controller::{Decision, FallbackController, FallbackError, FetchState};
pub use job_store::{JobStore, JobUpdate, JobUpdates, UpdateSender};
pub use metadata_cache::MetadataCache;
pub use pipeline::{Pipeline, PipelineError, PipelineSettings};
pub use reaper::{ReapReport, Reaper};
pub use recognition_dispatcher::{RecognitionDispatcher, RecognitionOutcome};
pub use segment_fetcher::{FetchAborted, SegmentFetcher};
pub use segment_planner::{plan_windows, PlanError, SegmentPlanner};
