//! Server-Sent Events (SSE) utilities
//!
//! Bridges the [`EventBus`] to axum SSE responses.

use crate::events::{EventBus, SegidEvent};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Heartbeat interval for idle connections
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Create an SSE stream forwarding bus events, optionally limited to one job
///
/// Starts with a `ConnectionStatus` event. Lagged subscribers skip the
/// dropped events and keep streaming; the stream ends when the bus closes.
pub fn create_event_sse_stream(
    event_bus: &EventBus,
    job_filter: Option<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(job_filter = ?job_filter, "New SSE client connected");
    let mut rx = event_bus.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            match rx.recv().await {
                Ok(event) => {
                    if job_filter.is_some_and(|id| id != event.job_id()) {
                        continue;
                    }
                    if let Some(sse_event) = to_sse_event(&event) {
                        yield Ok(sse_event);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("SSE client lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => {
                    debug!("SSE: event bus closed, ending stream");
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT_INTERVAL)
            .text("heartbeat"),
    )
}

fn to_sse_event(event: &SegidEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().event(event.event_type()).data(json)),
        Err(e) => {
            warn!("Failed to serialize SSE event: {}", e);
            None
        }
    }
}
