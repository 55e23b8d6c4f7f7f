//! Partition range planning.
//!
//! Decomposes an inclusive `[start, end]` millisecond range into the
//! partitions it touches, each paired with the part of the range it owns.
//! Both the append and read paths rely on this mapping, so the clipping rules
//! live in exactly one place.

use crate::partition::key::{partition_end_ms, partition_index, partition_start_ms};
use crate::partition::PartitionError;
use std::collections::BTreeMap;

/// Inclusive millisecond range owned by one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClippedRange {
    pub start: i64,
    pub end: i64,
}

impl ClippedRange {
    /// Number of milliseconds covered by the range.
    pub fn span_ms(&self) -> u64 {
        self.end.abs_diff(self.start) + 1
    }

    pub fn contains(&self, ms: i64) -> bool {
        self.start <= ms && ms <= self.end
    }
}

/// Ordered mapping from partition index to its clipped sub-range.
///
/// The map is stored as its two outer bounds and materialised on demand, so
/// planning a range spanning centuries costs nothing until iterated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionRangeMap {
    start_ms: i64,
    end_ms: i64,
    first: i64,
    last: i64,
}

impl PartitionRangeMap {
    /// Plans the inclusive range `[start_ms, end_ms]`.
    ///
    /// # Arguments
    /// * `start_ms` - First millisecond of the range
    /// * `end_ms` - Last millisecond of the range (inclusive)
    ///
    /// # Returns
    /// The partition range map, or `InvalidRange` if `start_ms > end_ms`
    pub fn plan(start_ms: i64, end_ms: i64) -> Result<Self, PartitionError> {
        if start_ms > end_ms {
            return Err(PartitionError::InvalidRange {
                start: start_ms,
                end: end_ms,
            });
        }

        Ok(Self {
            start_ms,
            end_ms,
            first: partition_index(start_ms),
            last: partition_index(end_ms),
        })
    }

    /// First and last partition index touched by the range.
    pub fn partition_range(&self) -> (i64, i64) {
        (self.first, self.last)
    }

    /// The original, unclipped range.
    pub fn bounds(&self) -> ClippedRange {
        ClippedRange {
            start: self.start_ms,
            end: self.end_ms,
        }
    }

    /// Number of partitions in the map.
    pub fn len(&self) -> u64 {
        self.last.abs_diff(self.first) + 1
    }

    /// A planned range always covers at least one partition.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns the clipped sub-range owned by `partition`, if it is covered.
    pub fn get(&self, partition: i64) -> Option<ClippedRange> {
        if partition < self.first || partition > self.last {
            return None;
        }

        // Computing the bound that belongs to the original range first keeps
        // the day arithmetic away from the i64 edges.
        let start = if partition == self.first {
            self.start_ms
        } else {
            partition_start_ms(partition)
        };
        let end = if partition == self.last {
            self.end_ms
        } else {
            partition_end_ms(partition)
        };

        Some(ClippedRange { start, end })
    }

    /// Iterates partitions in ascending index order.
    pub fn iter(&self) -> PartitionRangeIter {
        PartitionRangeIter {
            map: *self,
            front: self.first,
            back: self.last,
            finished: false,
        }
    }

    /// Collects the full mapping.
    pub fn to_btree(&self) -> BTreeMap<i64, ClippedRange> {
        self.iter().collect()
    }
}

impl IntoIterator for &PartitionRangeMap {
    type Item = (i64, ClippedRange);
    type IntoIter = PartitionRangeIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the entries of a [`PartitionRangeMap`].
///
/// Implements `DoubleEndedIterator` for descending walks.
pub struct PartitionRangeIter {
    map: PartitionRangeMap,
    front: i64,
    back: i64,
    finished: bool,
}

impl Iterator for PartitionRangeIter {
    type Item = (i64, ClippedRange);

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.front > self.back {
            return None;
        }

        let partition = self.front;
        if self.front == self.back {
            self.finished = true;
        } else {
            self.front += 1;
        }
        self.map.get(partition).map(|range| (partition, range))
    }
}

impl DoubleEndedIterator for PartitionRangeIter {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.finished || self.front > self.back {
            return None;
        }

        let partition = self.back;
        if self.front == self.back {
            self.finished = true;
        } else {
            self.back -= 1;
        }
        self.map.get(partition).map(|range| (partition, range))
    }
}
