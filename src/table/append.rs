//! Append path: ordering checks, per-partition split and lazy partition
//! creation.

use super::{DATA_TABLE, EXPECTED_ROWS_ATTR};
use crate::error::Result;
use crate::partition::{partition_index, PartitionPath, PartitionRangeMap, TableConfig};
use crate::record::{Record, RecordBatch, Schema};
use crate::store::{AttrValue, NodeKind, NodePath, StoreError, TableStore};
use std::ops::Range;
use thiserror::Error;
use tracing::{debug, warn};

/// Appends rejected because they would break timestamp ordering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppendError {
    /// Timestamps decrease inside the batch
    #[error("batch is not sorted: row {index} has timestamp {timestamp} after {previous}")]
    UnsortedBatch {
        index: usize,
        previous: i64,
        timestamp: i64,
    },

    /// The batch starts before the newest stored row
    #[error("batch starts at {batch_start}, before the stored maximum {stored_max}")]
    NonMonotonicAppend { batch_start: i64, stored_max: i64 },
}

/// Checks that timestamps never decrease; ties are allowed.
pub(crate) fn check_sorted(batch: &RecordBatch) -> std::result::Result<(), AppendError> {
    let records = batch.records();
    for (index, pair) in records.windows(2).enumerate() {
        if pair[1].timestamp < pair[0].timestamp {
            return Err(AppendError::UnsortedBatch {
                index: index + 1,
                previous: pair[0].timestamp,
                timestamp: pair[1].timestamp,
            });
        }
    }
    Ok(())
}

/// One partition's share of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Slice {
    pub partition: i64,
    pub path: PartitionPath,
    pub rows: Range<usize>,
}

/// Cuts a sorted batch into contiguous per-partition slices.
///
/// Each cut is a binary search for the first row past the partition's
/// clipped upper bound. Only partitions that receive rows are visited.
/// Calendar paths are resolved here, before any write.
pub(crate) fn split(records: &[Record], plan: &PartitionRangeMap) -> Result<Vec<Slice>> {
    let mut slices = Vec::new();
    let mut start = 0;

    while start < records.len() {
        let partition = partition_index(records[start].timestamp);
        let end = match plan.get(partition) {
            Some(clipped) => {
                start + records[start..].partition_point(|r| r.timestamp <= clipped.end)
            }
            None => records.len(),
        };

        slices.push(Slice {
            partition,
            path: PartitionPath::from_index(partition)?,
            rows: start..end,
        });
        start = end;
    }

    Ok(slices)
}

/// Creates the day groups and data table of a partition.
///
/// On failure every node created by this call is removed again, newest
/// first, before the error is returned. Groups that already existed are
/// left alone.
pub(crate) fn create_partition<S: TableStore>(
    store: &S,
    root: &NodePath,
    path: &PartitionPath,
    schema: &Schema,
    config: &TableConfig,
) -> Result<NodePath> {
    let mut created = Vec::new();
    match create_partition_nodes(store, root, path, schema, config, &mut created) {
        Ok(table) => {
            debug!(table = %table, "created partition");
            Ok(table)
        }
        Err(err) => {
            for node in created.iter().rev() {
                if let Err(cleanup) = store.remove_node(node) {
                    warn!(node = %node, error = %cleanup, "failed to remove partition node");
                }
            }
            warn!(root = %root, partition = ?path, error = %err, "rolled back partition creation");
            Err(err)
        }
    }
}

fn create_partition_nodes<S: TableStore>(
    store: &S,
    root: &NodePath,
    path: &PartitionPath,
    schema: &Schema,
    config: &TableConfig,
    created: &mut Vec<NodePath>,
) -> Result<NodePath> {
    let mut parent = root.clone();
    for name in path.names() {
        let child = parent.join(&name)?;
        match store.get_child(&parent, &name)? {
            Some(NodeKind::Group) => {}
            Some(NodeKind::Table) => return Err(StoreError::NotAGroup(child.to_string()).into()),
            None => {
                store.create_group(&parent, &name)?;
                created.push(child.clone());
            }
        }
        parent = child;
    }

    let table = store.create_table(&parent, DATA_TABLE, schema, &config.tuning)?;
    created.push(table.clone());
    store.set_attr(
        &table,
        EXPECTED_ROWS_ATTR,
        AttrValue::UInt(config.expected_rows_per_partition),
    )?;

    Ok(table)
}
