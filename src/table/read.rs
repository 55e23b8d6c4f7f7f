//! Per-partition fetch for range reads.

use crate::partition::ClippedRange;
use crate::record::Record;
use crate::store::{NodePath, StoreResult, TableStore};
use crate::time::MS_PER_DAY;

/// How rows of one partition are fetched for a clipped range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    /// Read the whole partition and cut the range out in memory
    FullScan,
    /// Ask the store for matching rows only
    Predicate,
}

impl FetchStrategy {
    /// Picks the strategy for a clipped range.
    ///
    /// Ranges covering at least `scan_threshold` of a day are scanned in
    /// full; narrower ranges use the store's predicate fetch.
    pub fn select(range: &ClippedRange, scan_threshold: f64) -> Self {
        let coverage = range.span_ms() as f64 / MS_PER_DAY as f64;
        if coverage >= scan_threshold {
            FetchStrategy::FullScan
        } else {
            FetchStrategy::Predicate
        }
    }
}

/// Rows of `table` inside `range`, in stored order.
pub(crate) fn fetch<S: TableStore>(
    store: &S,
    table: &NodePath,
    range: ClippedRange,
    strategy: FetchStrategy,
) -> StoreResult<Vec<Record>> {
    match strategy {
        FetchStrategy::FullScan => {
            let mut rows = store.read_all(table)?;
            let end = rows.partition_point(|r| r.timestamp <= range.end);
            rows.truncate(end);
            let start = rows.partition_point(|r| r.timestamp < range.start);
            rows.drain(..start);
            Ok(rows)
        }
        FetchStrategy::Predicate => store.read_where(table, range.start..=range.end),
    }
}
