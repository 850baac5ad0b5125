//! Test Helper Utilities
//!
//! Scripted collaborators and an in-process service for integration tests.

#![allow(dead_code)]

use segid_common::config::TomlConfig;
use segid_common::events::EventBus;
use segid_svc::models::Job;
use segid_svc::services::{JobStore, Pipeline};
use segid_svc::storage::FsArtifactStore;
use segid_svc::types::{ArtifactStore, AssetSource, Recognizer};
use segid_svc::AppState;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

#[path = "../../src/services/test_support.rs"]
mod doubles;

pub use doubles::*;

// ============================================================================
// Service
// ============================================================================

/// Defaults with the inter-batch delay removed
pub fn test_config() -> TomlConfig {
    let mut config = TomlConfig::default();
    config.recognition.batch_delay_ms = 0;
    config.fetch.window_timeout_secs = 5;
    config.fetch.full_timeout_secs = 5;
    config.fetch.info_timeout_secs = 5;
    config.recognition.timeout_secs = 5;
    config
}

/// In-process service over scripted collaborators
pub struct TestService {
    pub state: AppState,
    pub pipeline: Arc<Pipeline>,
    pub jobs: Arc<JobStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub event_bus: EventBus,
    pub source: Arc<ScriptedSource>,
    pub recognizer: Arc<ScriptedRecognizer>,
    _dir: TempDir,
}

impl TestService {
    pub fn new(source: ScriptedSource, recognizer: ScriptedRecognizer) -> Self {
        Self::with_config(&test_config(), source, recognizer)
    }

    pub fn with_config(
        config: &TomlConfig,
        source: ScriptedSource,
        recognizer: ScriptedRecognizer,
    ) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let artifacts: Arc<dyn ArtifactStore> = Arc::new(
            FsArtifactStore::open(dir.path().join("artifacts"))
                .expect("Failed to open artifact store"),
        );
        let source = Arc::new(source);
        let recognizer = Arc::new(recognizer);

        let event_bus = EventBus::new(1024);
        let jobs = Arc::new(JobStore::new(event_bus.clone()));
        let pipeline = Arc::new(Pipeline::new(
            config,
            Arc::clone(&source) as Arc<dyn AssetSource>,
            Arc::clone(&recognizer) as Arc<dyn Recognizer>,
            Arc::clone(&artifacts),
            Arc::clone(&jobs),
            event_bus.clone(),
        ));
        let state = AppState::new(Arc::clone(&pipeline), Arc::clone(&artifacts), event_bus.clone());

        Self {
            state,
            pipeline,
            jobs,
            artifacts,
            event_bus,
            source,
            recognizer,
            _dir: dir,
        }
    }

    pub fn router(&self) -> axum::Router {
        segid_svc::build_router(self.state.clone())
    }

    /// Create a job and run it to completion
    pub async fn run_job(&self, url: &str) -> Job {
        let job = self.jobs.create(url);
        self.pipeline.run(job.id, url).await;
        self.jobs.get(&job.id).expect("job exists")
    }

    /// Poll until the job reaches a terminal state
    pub async fn wait_for_terminal(&self, id: Uuid) -> Job {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let job = self.jobs.get(&id).expect("job exists");
            if job.is_terminal() {
                return job;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "job {} did not finish",
                id
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
