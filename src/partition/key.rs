//! Partition key mapping.
//!
//! A partition is one UTC calendar day. Its identity is the partition index
//! `floor(ms / MS_PER_DAY)`; its storage path is the zero-padded
//! `y<yyyy>/m<mm>/d<dd>` triple of that day.

use crate::time::{to_utc, EncodingError, MS_PER_DAY};
use chrono::{Datelike, NaiveDate};

/// Returns the partition index holding the given epoch milliseconds.
///
/// Uses Euclidean division so pre-epoch timestamps land on the day they
/// belong to rather than the following one.
pub fn partition_index(ms: i64) -> i64 {
    ms.div_euclid(MS_PER_DAY)
}

/// First millisecond owned by a partition.
pub(crate) fn partition_start_ms(index: i64) -> i64 {
    index * MS_PER_DAY
}

/// Last millisecond owned by a partition.
pub(crate) fn partition_end_ms(index: i64) -> i64 {
    (index + 1) * MS_PER_DAY - 1
}

/// Calendar location of a partition inside the storage hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionPath {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl PartitionPath {
    /// Resolves the calendar day of a partition index.
    ///
    /// # Arguments
    /// * `index` - Partition index (days since the Unix epoch)
    ///
    /// # Returns
    /// The day's path components, or an error if the day cannot be
    /// represented as a calendar date
    pub fn from_index(index: i64) -> Result<Self, EncodingError> {
        let start = index
            .checked_mul(MS_PER_DAY)
            .ok_or_else(|| EncodingError::Overflow(format!("partition {}", index)))?;
        let date = to_utc(start)?.date_naive();
        Ok(Self::from_date(date))
    }

    /// Builds the path for a calendar date.
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
        }
    }

    /// Parses stored group names back into a path.
    ///
    /// Returns `None` for names that are not partition groups, or for
    /// components that do not form a valid calendar date.
    pub fn parse(year: &str, month: &str, day: &str) -> Option<Self> {
        let year = year.strip_prefix('y')?.parse::<i32>().ok()?;
        let month = month.strip_prefix('m')?.parse::<u32>().ok()?;
        let day = day.strip_prefix('d')?.parse::<u32>().ok()?;
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        Some(Self::from_date(date))
    }

    /// Calendar date of this partition.
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }

    /// Partition index of this path.
    pub fn index(&self) -> Option<i64> {
        let date = self.date()?;
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
        Some(date.signed_duration_since(epoch).num_days())
    }

    pub fn year_name(&self) -> String {
        format!("y{:04}", self.year)
    }

    pub fn month_name(&self) -> String {
        format!("m{:02}", self.month)
    }

    pub fn day_name(&self) -> String {
        format!("d{:02}", self.day)
    }

    /// Group names from the series root down to the day group.
    pub fn names(&self) -> [String; 3] {
        [self.year_name(), self.month_name(), self.day_name()]
    }
}
