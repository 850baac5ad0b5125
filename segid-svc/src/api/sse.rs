//! Server-Sent Events for job progress
//!
//! Streams `JobCreated`, `JobProgress`, `FallbackEngaged`, `JobCompleted`
//! and `JobFailed`, optionally limited to one job with `?taskId=`.

use axum::{
    extract::{Query, State},
    response::sse::{Event, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use segid_common::sse::create_event_sse_stream;
use serde::Deserialize;
use std::convert::Infallible;
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventQuery {
    pub task_id: Option<String>,
}

/// GET /api/events
pub async fn job_event_stream(
    State(state): State<AppState>,
    Query(query): Query<EventQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let filter = match query.task_id.as_deref() {
        Some(raw) => Some(
            Uuid::parse_str(raw)
                .map_err(|_| ApiError::BadRequest("Invalid taskId".to_string()))?,
        ),
        None => None,
    };

    Ok(create_event_sse_stream(&state.event_bus, filter))
}

/// Build event stream routes
pub fn event_routes() -> Router<AppState> {
    Router::new().route("/api/events", get(job_event_stream))
}
