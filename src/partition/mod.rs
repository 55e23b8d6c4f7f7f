//! Daily partitioning.
//!
//! This module maps timestamps onto day partitions and plans how a time range
//! is spread across them. It knows nothing about storage; the table layer
//! turns partition indexes into store paths.

use thiserror::Error;

pub mod config;
pub mod key;
pub mod planner;

// Re-export main types for public API
pub use config::TableConfig;
pub use key::{partition_index, PartitionPath};
pub use planner::{ClippedRange, PartitionRangeIter, PartitionRangeMap};

/// Errors specific to the partition layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PartitionError {
    /// Query or append range with `start > end`
    #[error("Invalid range: start {start} must be <= end {end}")]
    InvalidRange { start: i64, end: i64 },

    /// Expected rows per partition must be greater than 0
    #[error("Invalid expected rows per partition {0}: must be greater than 0")]
    InvalidExpectedRows(u64),

    /// Scan threshold must be a fraction in `[0, 1]`
    #[error("Invalid scan threshold {0}: must be within [0, 1]")]
    InvalidScanThreshold(f64),
}
