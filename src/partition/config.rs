//! Configuration for partitioned time series tables.
//!
//! Contains the per-table knobs that shape how partitions are created and how
//! range reads fetch rows from them.

use crate::partition::PartitionError;
use crate::store::StorageTuning;

/// Default row-count hint recorded on every partition table.
pub const DEFAULT_EXPECTED_ROWS_PER_PARTITION: u64 = 10_000;

/// Default fraction of a day above which reads scan the whole partition.
pub const DEFAULT_SCAN_THRESHOLD: f64 = 0.5;

/// Configuration for a time series table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableConfig {
    /// Row-count hint stored on each partition table
    ///
    /// Passed through to the store as an attribute so tooling can size
    /// partitions. Must be greater than 0.
    pub expected_rows_per_partition: u64,

    /// Fraction of a partition's day a read must cover to switch strategies
    ///
    /// At or above this fraction the reader loads the whole partition and
    /// cuts it in memory; below it, the reader asks the store for the
    /// matching rows only. `0.0` always scans, `1.0` scans only full days.
    pub scan_threshold: f64,

    /// Storage-specific options handed to the store unchanged
    pub tuning: StorageTuning,
}

impl TableConfig {
    /// Creates a validated configuration.
    ///
    /// # Arguments
    /// * `expected_rows_per_partition` - Row hint per partition (> 0)
    /// * `scan_threshold` - Full-scan crossover fraction within `[0, 1]`
    /// * `tuning` - Opaque storage tuning
    ///
    /// # Returns
    /// Validated configuration or error
    pub fn new(
        expected_rows_per_partition: u64,
        scan_threshold: f64,
        tuning: StorageTuning,
    ) -> Result<Self, PartitionError> {
        let config = Self {
            expected_rows_per_partition,
            scan_threshold,
            tuning,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants enforced by [`TableConfig::new`].
    ///
    /// Fields are public, so the table validates again before using a config.
    pub fn validate(&self) -> Result<(), PartitionError> {
        if self.expected_rows_per_partition == 0 {
            return Err(PartitionError::InvalidExpectedRows(
                self.expected_rows_per_partition,
            ));
        }

        if !(0.0..=1.0).contains(&self.scan_threshold) {
            return Err(PartitionError::InvalidScanThreshold(self.scan_threshold));
        }

        Ok(())
    }

    /// Returns a copy with a different scan threshold.
    pub fn with_scan_threshold(mut self, scan_threshold: f64) -> Result<Self, PartitionError> {
        self.scan_threshold = scan_threshold;
        self.validate()?;
        Ok(self)
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            expected_rows_per_partition: DEFAULT_EXPECTED_ROWS_PER_PARTITION,
            scan_threshold: DEFAULT_SCAN_THRESHOLD,
            tuning: StorageTuning::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config = TableConfig::new(500, 0.25, StorageTuning::default());
        assert!(config.is_ok());

        let config = config.unwrap();
        assert_eq!(config.expected_rows_per_partition, 500);
        assert_eq!(config.scan_threshold, 0.25);
    }

    #[test]
    fn test_invalid_expected_rows() {
        let config = TableConfig::new(0, 0.5, StorageTuning::default());
        assert_eq!(config, Err(PartitionError::InvalidExpectedRows(0)));
    }

    #[test]
    fn test_invalid_scan_threshold() {
        assert!(TableConfig::new(10, 1.5, StorageTuning::default()).is_err());
        assert!(TableConfig::new(10, -0.1, StorageTuning::default()).is_err());
        assert!(TableConfig::new(10, f64::NAN, StorageTuning::default()).is_err());
        assert!(TableConfig::default().with_scan_threshold(2.0).is_err());
    }

    #[test]
    fn test_default_config() {
        let config = TableConfig::default();
        assert_eq!(config.expected_rows_per_partition, 10_000);
        assert_eq!(config.scan_threshold, 0.5);
        assert_eq!(config.tuning, StorageTuning::default());
    }
}
