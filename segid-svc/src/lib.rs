//! segid-svc library interface
//!
//! Exposes the pipeline, collaborators and router for the binary and for
//! integration tests.

#[cfg(test)]
extern crate self as segid_svc;

pub mod api;
pub mod config;
pub mod error;
pub mod extractors;
pub mod models;
pub mod services;
pub mod storage;
pub mod types;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use segid_common::events::EventBus;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::services::{JobStore, Pipeline};
use crate::types::ArtifactStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Job pipeline; submits and runs jobs
    pub pipeline: Arc<Pipeline>,
    /// Job records read by the polling endpoints
    pub jobs: Arc<JobStore>,
    /// Artifact store served by the download endpoint
    pub artifacts: Arc<dyn ArtifactStore>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        pipeline: Arc<Pipeline>,
        artifacts: Arc<dyn ArtifactStore>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            jobs: Arc::clone(pipeline.store()),
            pipeline,
            artifacts,
            event_bus,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::extract_routes())
        .merge(api::download_routes())
        .merge(api::event_routes())
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
