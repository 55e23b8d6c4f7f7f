//! Time series tables partitioned by UTC day.
//!
//! A [`TsTable`] is a group in a [`TableStore`] whose data lives in one table
//! per day:
//!
//! ```text
//! <root>/y<yyyy>/m<mm>/d<dd>/ts_data
//! ```
//!
//! Appends must keep timestamps non-decreasing across the whole table. Each
//! batch is cut at day boundaries and every piece is appended to its own
//! partition, which is created on first use. Range reads visit only the
//! partitions overlapping the requested range and concatenate their rows in
//! partition order.

use crate::error::{Error, Result};
use crate::partition::{partition_index, PartitionPath, PartitionRangeMap, TableConfig};
use crate::record::{IntoRecordBatch, RecordBatch, Schema, TimeIndexedFrame};
use crate::store::{AttrValue, NodeKind, NodePath, RedbStore, StoreError, TableStore};
use crate::time::{to_epoch_ms, IntoEpochMs};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub mod append;
pub mod extent;
pub mod read;

pub use append::AppendError;
pub use extent::{PartitionIndex, Partitions};
pub use read::FetchStrategy;

/// Name of the data table inside each day group.
pub const DATA_TABLE: &str = "ts_data";

/// Root attribute marking a group as a time series.
pub const CLASS_ATTR: &str = "_TS_TABLES_CLASS";
pub const CLASS_VALUE: &str = "TIMESERIES";

/// Root attribute recording the layout version.
pub const VERSION_ATTR: &str = "_TS_TABLES_VERSION";
pub const VERSION_VALUE: &str = "0.0.1";

/// Partition attribute holding the expected row count hint.
pub const EXPECTED_ROWS_ATTR: &str = "_TS_TABLES_EXPECTEDROWS_PER_PARTITION";

/// Handle to a partitioned time series table.
///
/// Appending takes `&mut self`, so a handle has a single writer. Reads take
/// `&self`.
#[derive(Debug)]
pub struct TsTable<S: TableStore = RedbStore> {
    store: S,
    root: NodePath,
    schema: Arc<Schema>,
    config: TableConfig,
    partitions: PartitionIndex,
}

impl<S: TableStore> TsTable<S> {
    /// Creates a new time series as group `name` under `parent`.
    ///
    /// The partition for the current UTC day is created immediately so the
    /// schema is persisted before any data arrives. If any step fails, the
    /// group is removed again.
    ///
    /// # Arguments
    /// * `store` - Store holding the table
    /// * `parent` - Existing group to create the table in
    /// * `name` - Name of the table's root group
    /// * `schema` - Row schema; the first field must be `timestamp: Int64`
    /// * `config` - Partition and storage options
    pub fn create(
        store: S,
        parent: &NodePath,
        name: &str,
        schema: Schema,
        config: TableConfig,
    ) -> Result<Self> {
        schema.validate()?;
        config.validate()?;

        let today = partition_index(to_epoch_ms(&Utc::now())?);
        let today_path = PartitionPath::from_index(today)?;

        let root = store.create_group(parent, name)?;
        let mut table = Self {
            store,
            root,
            schema: Arc::new(schema),
            config,
            partitions: PartitionIndex::new(),
        };

        if let Err(err) = table.initialize(today, &today_path) {
            if let Err(cleanup) = table.store.remove_node(&table.root) {
                warn!(root = %table.root, error = %cleanup, "failed to remove time series root");
            }
            warn!(root = %table.root, error = %err, "rolled back time series creation");
            return Err(err);
        }

        info!(
            root = %table.root,
            fields = table.schema.fields().len(),
            "created time series"
        );
        Ok(table)
    }

    fn initialize(&mut self, today: i64, today_path: &PartitionPath) -> Result<()> {
        self.store
            .set_attr(&self.root, CLASS_ATTR, AttrValue::from(CLASS_VALUE))?;
        self.store
            .set_attr(&self.root, VERSION_ATTR, AttrValue::from(VERSION_VALUE))?;
        self.ensure_partition(today, today_path)?;
        Ok(())
    }

    /// Opens an existing time series rooted at `root`.
    ///
    /// The schema, storage tuning and row hint are recovered from the oldest
    /// partition. The scan threshold is not persisted and starts at its
    /// default; see [`TsTable::with_scan_threshold`].
    pub fn open(store: S, root: &NodePath) -> Result<Self> {
        if store.node_kind(root)?.is_none() {
            return Err(StoreError::NotFound(root.to_string()).into());
        }
        if !is_timeseries(&store, root)? {
            return Err(Error::NotTimeSeries(root.to_string()));
        }

        let partitions = PartitionIndex::rebuild(&store, root)?;
        let first = partitions
            .iter()
            .next()
            .map(|(_, table)| table.clone())
            .ok_or_else(|| Error::NotTimeSeries(root.to_string()))?;

        let schema = store.table_schema(&first)?;
        schema.validate()?;
        let mut config = TableConfig {
            tuning: store.table_tuning(&first)?,
            ..TableConfig::default()
        };
        if let Some(rows) = store
            .get_attr(&first, EXPECTED_ROWS_ATTR)?
            .and_then(|value| value.as_u64())
        {
            config.expected_rows_per_partition = rows;
        }
        config.validate()?;

        info!(root = %root, partitions = partitions.len(), "opened time series");
        Ok(Self {
            store,
            root: root.clone(),
            schema: Arc::new(schema),
            config,
            partitions,
        })
    }

    /// Replaces the fraction of a day above which reads scan whole partitions.
    pub fn with_scan_threshold(mut self, scan_threshold: f64) -> Result<Self> {
        self.config = self.config.with_scan_threshold(scan_threshold)?;
        Ok(self)
    }

    pub fn root(&self) -> &NodePath {
        &self.root
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Partitions known to this handle.
    ///
    /// The index is built at open and extended by this handle's appends.
    /// Partitions written through other handles appear after
    /// [`TsTable::refresh`]; reads and extents always consult the store.
    pub fn partitions(&self) -> &PartitionIndex {
        &self.partitions
    }

    /// Rebuilds the partition index from the store.
    pub fn refresh(&mut self) -> Result<()> {
        self.partitions = PartitionIndex::rebuild(&self.store, &self.root)?;
        Ok(())
    }

    /// Appends rows whose timestamps are not older than anything stored.
    ///
    /// Rows are converted to the table schema first. The whole batch is
    /// validated before the first write; an empty batch is a no-op.
    ///
    /// Appends are not atomic across partitions: if writing to a later
    /// partition fails, rows already written to earlier partitions of the
    /// batch stay committed.
    pub fn append<R: IntoRecordBatch>(&mut self, rows: R) -> Result<()> {
        let batch = rows.into_record_batch(&self.schema)?;
        let (Some(first), Some(last)) = (batch.first_timestamp(), batch.last_timestamp()) else {
            return Ok(());
        };

        append::check_sorted(&batch)?;
        if let Some(stored_max) = self.max_timestamp()? {
            if first < stored_max {
                return Err(AppendError::NonMonotonicAppend {
                    batch_start: first,
                    stored_max,
                }
                .into());
            }
        }

        let plan = PartitionRangeMap::plan(first, last)?;
        let slices = append::split(batch.records(), &plan)?;

        for slice in slices {
            let table = self.ensure_partition(slice.partition, &slice.path)?;
            self.store.append_rows(&table, batch.slice(slice.rows.clone()))?;
            debug!(
                table = %table,
                rows = slice.rows.len(),
                "appended partition slice"
            );
        }

        Ok(())
    }

    fn ensure_partition(&mut self, partition: i64, path: &PartitionPath) -> Result<NodePath> {
        if let Some(table) = self.partitions.get(partition) {
            return Ok(table.clone());
        }

        // Another handle may have created it.
        let existing = extent::partition_table(&self.root, path)?;
        let table = if self.store.node_kind(&existing)? == Some(NodeKind::Table) {
            existing
        } else {
            append::create_partition(&self.store, &self.root, path, &self.schema, &self.config)?
        };
        self.partitions.insert(partition, table.clone());
        Ok(table)
    }

    /// Rows with timestamps in `[start, end]`, in timestamp order.
    ///
    /// Both bounds are inclusive and accept epoch milliseconds, zoned
    /// datetimes or naive datetimes (read as UTC). Days without a partition
    /// contribute no rows.
    pub fn read_range<A: IntoEpochMs, B: IntoEpochMs>(
        &self,
        start: A,
        end: B,
    ) -> Result<RecordBatch> {
        self.read_range_ms(start.into_epoch_ms()?, end.into_epoch_ms()?)
    }

    /// [`TsTable::read_range`] on epoch milliseconds.
    pub fn read_range_ms(&self, start: i64, end: i64) -> Result<RecordBatch> {
        let plan = PartitionRangeMap::plan(start, end)?;
        let (first, last) = plan.partition_range();

        let partitions = PartitionIndex::scan(&self.store, &self.root, first..=last)?;
        let mut batch = RecordBatch::empty(self.schema.clone());
        for (partition, table) in partitions.iter() {
            let Some(clipped) = plan.get(partition) else {
                continue;
            };
            let strategy = FetchStrategy::select(&clipped, self.config.scan_threshold);
            debug!(table = %table, ?strategy, "fetching partition");
            batch.extend(read::fetch(&self.store, table, clipped, strategy)?);
        }

        Ok(batch)
    }

    /// [`TsTable::read_range`] presented with a `DateTime<Utc>` index.
    pub fn read_range_frame<A: IntoEpochMs, B: IntoEpochMs>(
        &self,
        start: A,
        end: B,
    ) -> Result<TimeIndexedFrame> {
        let batch = self.read_range(start, end)?;
        Ok(TimeIndexedFrame::from_batch(&batch)?)
    }

    /// Timestamp of the newest stored row.
    pub fn max_timestamp(&self) -> Result<Option<i64>> {
        Ok(extent::max_timestamp(&self.store, &self.root)?)
    }

    /// Timestamp of the oldest stored row.
    pub fn min_timestamp(&self) -> Result<Option<i64>> {
        Ok(extent::min_timestamp(&self.store, &self.root)?)
    }

    /// Total rows across all partitions.
    pub fn row_count(&self) -> Result<u64> {
        let mut total = 0;
        for (_, table) in PartitionIndex::rebuild(&self.store, &self.root)?.iter() {
            total += self.store.row_count(table)?;
        }
        Ok(total)
    }

    /// Rows stored in one partition; 0 when the partition does not exist.
    pub fn partition_row_count(&self, partition: i64) -> Result<u64> {
        let Ok(path) = PartitionPath::from_index(partition) else {
            return Ok(0);
        };
        let table = extent::partition_table(&self.root, &path)?;
        match self.store.node_kind(&table)? {
            Some(NodeKind::Table) => Ok(self.store.row_count(&table)?),
            _ => Ok(0),
        }
    }
}

/// Whether `path` is a group carrying the time series class marker.
pub fn is_timeseries<S: TableStore>(store: &S, path: &NodePath) -> Result<bool> {
    match store.node_kind(path)? {
        Some(NodeKind::Group) if !path.is_root() => {}
        _ => return Ok(false),
    }
    let class = store.get_attr(path, CLASS_ATTR)?;
    Ok(class.as_ref().and_then(AttrValue::as_str) == Some(CLASS_VALUE))
}
