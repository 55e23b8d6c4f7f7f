//! Daily-partitioned time series tables on redb.
//!
//! A time series is split into one table per UTC day inside a hierarchical
//! table store, so data can be appended incrementally and read back by time
//! range without touching days outside the range.

pub mod error;
pub mod ext;
pub mod partition;
pub mod record;
pub mod store;
pub mod table;
pub mod time;

// Re-export common types for convenience
pub use error::{Error, Result};
pub use ext::TimeSeriesExt;
pub use partition::{PartitionRangeMap, TableConfig};
pub use record::{
    Column, ColumnBatch, ColumnData, Field, FieldType, IntoRecordBatch, Record, RecordBatch,
    Schema, TimeIndexedFrame, TsRow, Value, ValueRows,
};
pub use store::{AttrValue, NodeKind, NodePath, RedbStore, StorageTuning, TableStore};
pub use table::{FetchStrategy, PartitionIndex, TsTable};
pub use time::{to_epoch_ms, to_utc, IntoEpochMs};
