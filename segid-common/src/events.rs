//! Event types for the segid event system
//!
//! Job lifecycle events are published on the [`EventBus`] by the job store and
//! the pipeline, and forwarded to SSE clients by the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// segid event types
///
/// Serialized with a `type` tag so SSE clients can dispatch on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SegidEvent {
    /// A job was accepted and is now processing
    JobCreated {
        job_id: Uuid,
        source_url: String,
        timestamp: DateTime<Utc>,
    },

    /// Job progress changed
    JobProgress {
        job_id: Uuid,
        progress: u8,
        download_progress: u8,
        timestamp: DateTime<Utc>,
    },

    /// Segment fetching produced nothing usable; the job switched to a full download
    FallbackEngaged {
        job_id: Uuid,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Job finished with a result
    JobCompleted {
        job_id: Uuid,
        tracks_found: usize,
        mode: String,
        timestamp: DateTime<Utc>,
    },

    /// Job finished with an error
    JobFailed {
        job_id: Uuid,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl SegidEvent {
    /// Event name used for the SSE `event:` field
    pub fn event_type(&self) -> &str {
        match self {
            SegidEvent::JobCreated { .. } => "JobCreated",
            SegidEvent::JobProgress { .. } => "JobProgress",
            SegidEvent::FallbackEngaged { .. } => "FallbackEngaged",
            SegidEvent::JobCompleted { .. } => "JobCompleted",
            SegidEvent::JobFailed { .. } => "JobFailed",
        }
    }

    /// Job the event belongs to
    pub fn job_id(&self) -> Uuid {
        match self {
            SegidEvent::JobCreated { job_id, .. }
            | SegidEvent::JobProgress { job_id, .. }
            | SegidEvent::FallbackEngaged { job_id, .. }
            | SegidEvent::JobCompleted { job_id, .. }
            | SegidEvent::JobFailed { job_id, .. } => *job_id,
        }
    }
}

/// Central event distribution bus
///
/// Wraps `tokio::sync::broadcast`:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged subscribers lose the oldest events rather than stalling the pipeline
///
/// # Examples
///
/// ```
/// use segid_common::events::{EventBus, SegidEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(SegidEvent::JobFailed {
///     job_id: uuid::Uuid::new_v4(),
///     error: "Could not read video information".to_string(),
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SegidEvent>,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<SegidEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: SegidEvent,
    ) -> Result<usize, broadcast::error::SendError<SegidEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: SegidEvent) {
        let _ = self.tx.send(event);
    }
}
