//! Sampling windows and their fetch outcomes

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Planned time range of the source asset, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentWindow {
    /// Planning order, 0-based
    pub index: usize,
    pub start: f64,
    pub end: f64,
}

impl SegmentWindow {
    pub fn new(index: usize, start: f64, end: f64) -> Self {
        Self { index, start, end }
    }

    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    /// True when the two windows share a non-empty interval
    pub fn overlaps(&self, other: &SegmentWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Locally held audio for one window
#[derive(Debug, Clone)]
pub struct AudioHandle {
    /// Artifact file name inside the artifact store; `None` if storing failed
    pub artifact: Option<String>,
    pub data: Bytes,
}

/// Window whose audio was fetched successfully
#[derive(Debug, Clone)]
pub struct FetchedWindow {
    pub window: SegmentWindow,
    pub audio: AudioHandle,
}

/// Result of fetching one window
#[derive(Debug, Clone)]
pub enum WindowOutcome {
    Fetched(FetchedWindow),
    Failed { window: SegmentWindow, reason: String },
}
