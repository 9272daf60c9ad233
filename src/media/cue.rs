//! Cue point index: timestamp to byte offset

use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};

/// A seekable position in the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CuePoint {
    /// Timestamp in milliseconds
    pub timestamp: u32,
    /// Parser cursor offset of the tag
    pub offset: u64,
}

/// Sorted timestamp to offset map, built while scanning tags
#[derive(Debug, Default, Clone)]
pub struct CuePointIndex {
    points: BTreeMap<u32, u64>,
}

impl CuePointIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cue point, replacing any previous one at the same timestamp
    pub fn insert(&mut self, timestamp: u32, offset: u64) {
        self.points.insert(timestamp, offset);
    }

    /// Record a cue point unless another one lies within `min_gap` ms of it.
    ///
    /// Returns whether the point was added.
    pub fn insert_spaced(&mut self, timestamp: u32, offset: u64, min_gap: u32) -> bool {
        match self.nearest_distance(timestamp) {
            Some(distance) if distance < min_gap => false,
            _ => {
                self.points.insert(timestamp, offset);
                true
            }
        }
    }

    /// First cue point at or after `timestamp`
    pub fn lower_bound(&self, timestamp: u32) -> Option<CuePoint> {
        self.points
            .range(timestamp..)
            .next()
            .map(|(&timestamp, &offset)| CuePoint { timestamp, offset })
    }

    /// Distance in ms to the closest cue point on either side
    pub fn nearest_distance(&self, timestamp: u32) -> Option<u32> {
        let before = self
            .points
            .range(..=timestamp)
            .next_back()
            .map(|(&ts, _)| timestamp - ts);
        let after = self
            .points
            .range((Excluded(timestamp), Unbounded))
            .next()
            .map(|(&ts, _)| ts - timestamp);
        match (before, after) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// All cue points in timestamp order
    pub fn to_vec(&self) -> Vec<CuePoint> {
        self.points
            .iter()
            .map(|(&timestamp, &offset)| CuePoint { timestamp, offset })
            .collect()
    }
}
