//! Track deduplication
//!
//! Consecutive windows often hit the same song. Hits are merged when their
//! lower-cased, trimmed (title, artist) pairs match; the first hit keeps its
//! metadata and start time and its end grows to cover later hits.

use std::collections::HashMap;

use crate::models::IdentifiedTrack;

/// Merge hits (in window order) into unique tracks in first-seen order
pub fn deduplicate<I>(hits: I) -> Vec<IdentifiedTrack>
where
    I: IntoIterator<Item = IdentifiedTrack>,
{
    let mut tracks: Vec<IdentifiedTrack> = Vec::new();
    let mut positions: HashMap<(String, String), usize> = HashMap::new();

    for hit in hits {
        let key = hit.identity_key();
        match positions.get(&key) {
            Some(&pos) => {
                let existing = &mut tracks[pos];
                existing.time_range.end = existing.time_range.end.max(hit.time_range.end);
            }
            None => {
                positions.insert(key, tracks.len());
                tracks.push(hit);
            }
        }
    }

    tracks
}
