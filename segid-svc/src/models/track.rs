//! Identified tracks

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Time range of the source asset in which a track was heard
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

/// Track recognized in one or more windows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifiedTrack {
    pub title: String,
    pub artist: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
    pub time_range: TimeRange,
    /// 0-100
    pub confidence: u8,
    /// External identifiers keyed by service (`isrc`, `spotify`, `songLink`, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub external_ids: BTreeMap<String, String>,
}

impl IdentifiedTrack {
    /// Case-insensitive (title, artist) identity used for merging
    pub fn identity_key(&self) -> (String, String) {
        (
            self.title.trim().to_lowercase(),
            self.artist.trim().to_lowercase(),
        )
    }
}
