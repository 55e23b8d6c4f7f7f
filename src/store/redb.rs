//! [`TableStore`] implementation on a redb database.
//!
//! Layout:
//! - `tstable_nodes`: node path -> encoded [`NodeRecord`]
//! - `tstable_attrs`: (node path, key) -> encoded [`AttrValue`]
//! - `tstable_rows:<path>`: one table per leaf, row id -> encoded [`Record`]
//!
//! Row ids are assigned densely in append order, so a leaf's rows are read
//! back in the order they were written. Each mutating call runs in its own
//! write transaction and either commits fully or leaves nothing behind.

use super::encoding::{decode, decode_timestamp, encode, NodeRecord};
use super::{AttrValue, NodeKind, NodePath, StorageTuning, StoreError, StoreResult, TableStore};
use crate::record::{Record, Schema};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
};
use std::fmt;
use std::ops::RangeInclusive;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("tstable_nodes");
const ATTRS: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("tstable_attrs");
const ROWS_PREFIX: &str = "tstable_rows:";

fn rows_table_name(path: &NodePath) -> String {
    format!("{}{}", ROWS_PREFIX, path.as_str())
}

fn rows_definition(name: &str) -> TableDefinition<'_, u64, &'static [u8]> {
    TableDefinition::new(name)
}

/// Hierarchical table store backed by a shared redb [`Database`].
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Opens or creates the database file at `path`.
    pub fn create(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = Database::create(path)?;
        Self::new(Arc::new(db))
    }

    /// Wraps an already opened database.
    pub fn new(db: Arc<Database>) -> StoreResult<Self> {
        let txn = db.begin_write()?;
        {
            txn.open_table(NODES)?;
            txn.open_table(ATTRS)?;
        }
        txn.commit()?;
        Ok(Self { db })
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }
}

fn lookup<T>(nodes: &T, path: &NodePath) -> StoreResult<Option<NodeRecord>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    match nodes.get(path.as_str())? {
        Some(guard) => Ok(Some(decode(guard.value())?)),
        None => Ok(None),
    }
}

fn require_group<T>(nodes: &T, path: &NodePath) -> StoreResult<()>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    if path.is_root() {
        return Ok(());
    }
    match lookup(nodes, path)? {
        Some(NodeRecord::Group) => Ok(()),
        Some(NodeRecord::Table { .. }) => Err(StoreError::NotAGroup(path.to_string())),
        None => Err(StoreError::NotFound(path.to_string())),
    }
}

fn require_table<T>(nodes: &T, path: &NodePath) -> StoreResult<(Schema, StorageTuning)>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    if path.is_root() {
        return Err(StoreError::NotATable(path.to_string()));
    }
    match lookup(nodes, path)? {
        Some(NodeRecord::Table { schema, tuning }) => Ok((schema, tuning)),
        Some(NodeRecord::Group) => Err(StoreError::NotATable(path.to_string())),
        None => Err(StoreError::NotFound(path.to_string())),
    }
}

fn require_node<T>(nodes: &T, path: &NodePath) -> StoreResult<()>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    if path.is_root() || lookup(nodes, path)?.is_some() {
        Ok(())
    } else {
        Err(StoreError::NotFound(path.to_string()))
    }
}

fn has_children<T>(nodes: &T, path: &NodePath) -> StoreResult<bool>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let prefix = path.child_prefix();
    let mut range = nodes.range(prefix.as_str()..)?;
    match range.next() {
        Some(entry) => {
            let (key, _) = entry?;
            Ok(key.value().starts_with(prefix.as_str()))
        }
        None => Ok(false),
    }
}

/// Index of the first row whose timestamp does not satisfy `pred`.
///
/// Rows must be sorted so that `pred` holds for a prefix of them.
fn partition_point<T>(rows: &T, len: u64, pred: impl Fn(i64) -> bool) -> StoreResult<u64>
where
    T: ReadableTable<u64, &'static [u8]>,
{
    let (mut lo, mut hi) = (0u64, len);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let guard = rows
            .get(mid)?
            .ok_or_else(|| StoreError::Encoding(format!("missing row id {}", mid)))?;
        if pred(decode_timestamp(guard.value())?) {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    Ok(lo)
}

impl TableStore for RedbStore {
    fn create_group(&self, parent: &NodePath, name: &str) -> StoreResult<NodePath> {
        let path = parent.join(name)?;
        let txn = self.db.begin_write()?;
        {
            let mut nodes = txn.open_table(NODES)?;
            require_group(&nodes, parent)?;
            if lookup(&nodes, &path)?.is_some() {
                return Err(StoreError::AlreadyExists(path.to_string()));
            }
            let bytes = encode(&NodeRecord::Group)?;
            nodes.insert(path.as_str(), bytes.as_slice())?;
        }
        txn.commit()?;

        trace!(path = %path, "created group");
        Ok(path)
    }

    fn get_child(&self, parent: &NodePath, name: &str) -> StoreResult<Option<NodeKind>> {
        self.node_kind(&parent.join(name)?)
    }

    fn node_kind(&self, path: &NodePath) -> StoreResult<Option<NodeKind>> {
        if path.is_root() {
            return Ok(Some(NodeKind::Group));
        }
        let txn = self.db.begin_read()?;
        let nodes = txn.open_table(NODES)?;
        Ok(lookup(&nodes, path)?.map(|node| node.kind()))
    }

    fn list_children(&self, parent: &NodePath) -> StoreResult<Vec<(String, NodeKind)>> {
        let txn = self.db.begin_read()?;
        let nodes = txn.open_table(NODES)?;
        require_group(&nodes, parent)?;

        let prefix = parent.child_prefix();
        let mut children = Vec::new();
        for entry in nodes.range(prefix.as_str()..)? {
            let (key, value) = entry?;
            let key = key.value();
            let Some(name) = key.strip_prefix(prefix.as_str()) else {
                break;
            };
            if name.contains('/') {
                continue;
            }
            let node: NodeRecord = decode(value.value())?;
            children.push((name.to_string(), node.kind()));
        }
        Ok(children)
    }

    fn create_table(
        &self,
        parent: &NodePath,
        name: &str,
        schema: &Schema,
        tuning: &StorageTuning,
    ) -> StoreResult<NodePath> {
        tuning.validate()?;
        let path = parent.join(name)?;
        let node = NodeRecord::Table {
            schema: schema.clone(),
            tuning: tuning.clone(),
        };

        let txn = self.db.begin_write()?;
        {
            let mut nodes = txn.open_table(NODES)?;
            require_group(&nodes, parent)?;
            if lookup(&nodes, &path)?.is_some() {
                return Err(StoreError::AlreadyExists(path.to_string()));
            }
            let bytes = encode(&node)?;
            nodes.insert(path.as_str(), bytes.as_slice())?;

            let rows_name = rows_table_name(&path);
            txn.open_table(rows_definition(&rows_name))?;
        }
        txn.commit()?;

        debug!(path = %path, title = %tuning.title, "created table");
        Ok(path)
    }

    fn table_schema(&self, table: &NodePath) -> StoreResult<Schema> {
        let txn = self.db.begin_read()?;
        let nodes = txn.open_table(NODES)?;
        Ok(require_table(&nodes, table)?.0)
    }

    fn table_tuning(&self, table: &NodePath) -> StoreResult<StorageTuning> {
        let txn = self.db.begin_read()?;
        let nodes = txn.open_table(NODES)?;
        Ok(require_table(&nodes, table)?.1)
    }

    fn remove_node(&self, path: &NodePath) -> StoreResult<()> {
        if path.is_root() {
            return Err(StoreError::InvalidName(path.to_string()));
        }

        let txn = self.db.begin_write()?;
        {
            let mut nodes = txn.open_table(NODES)?;
            match lookup(&nodes, path)? {
                None => return Err(StoreError::NotFound(path.to_string())),
                Some(NodeRecord::Group) => {
                    if has_children(&nodes, path)? {
                        return Err(StoreError::NotEmpty(path.to_string()));
                    }
                }
                Some(NodeRecord::Table { .. }) => {
                    let rows_name = rows_table_name(path);
                    txn.delete_table(rows_definition(&rows_name))?;
                }
            }
            nodes.remove(path.as_str())?;

            let mut attrs = txn.open_table(ATTRS)?;
            let mut keys = Vec::new();
            for entry in attrs.range((path.as_str(), "")..)? {
                let (key, _) = entry?;
                let (owner, name) = key.value();
                if owner != path.as_str() {
                    break;
                }
                keys.push(name.to_string());
            }
            for key in keys {
                attrs.remove((path.as_str(), key.as_str()))?;
            }
        }
        txn.commit()?;

        debug!(path = %path, "removed node");
        Ok(())
    }

    fn append_rows(&self, table: &NodePath, records: &[Record]) -> StoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let txn = self.db.begin_write()?;
        {
            let nodes = txn.open_table(NODES)?;
            require_table(&nodes, table)?;

            let rows_name = rows_table_name(table);
            let mut rows = txn.open_table(rows_definition(&rows_name))?;
            let mut next = rows.len()?;
            for record in records {
                let bytes = encode(record)?;
                rows.insert(next, bytes.as_slice())?;
                next += 1;
            }
        }
        txn.commit()?;

        trace!(table = %table, rows = records.len(), "appended rows");
        Ok(())
    }

    fn read_all(&self, table: &NodePath) -> StoreResult<Vec<Record>> {
        let txn = self.db.begin_read()?;
        let nodes = txn.open_table(NODES)?;
        require_table(&nodes, table)?;

        let rows_name = rows_table_name(table);
        let rows = txn.open_table(rows_definition(&rows_name))?;
        let mut records = Vec::with_capacity(rows.len()? as usize);
        for entry in rows.iter()? {
            let (_, value) = entry?;
            records.push(decode(value.value())?);
        }
        Ok(records)
    }

    fn read_where(&self, table: &NodePath, range: RangeInclusive<i64>) -> StoreResult<Vec<Record>> {
        let txn = self.db.begin_read()?;
        let nodes = txn.open_table(NODES)?;
        require_table(&nodes, table)?;

        let rows_name = rows_table_name(table);
        let rows = txn.open_table(rows_definition(&rows_name))?;
        let len = rows.len()?;
        let (start, end) = (*range.start(), *range.end());
        let first = partition_point(&rows, len, |ts| ts < start)?;
        let last = partition_point(&rows, len, |ts| ts <= end)?;

        let mut records = Vec::new();
        if first < last {
            for entry in rows.range(first..last)? {
                let (_, value) = entry?;
                records.push(decode(value.value())?);
            }
        }
        Ok(records)
    }

    fn row_count(&self, table: &NodePath) -> StoreResult<u64> {
        let txn = self.db.begin_read()?;
        let nodes = txn.open_table(NODES)?;
        require_table(&nodes, table)?;

        let rows_name = rows_table_name(table);
        let rows = txn.open_table(rows_definition(&rows_name))?;
        Ok(rows.len()?)
    }

    fn first_row(&self, table: &NodePath) -> StoreResult<Option<Record>> {
        let txn = self.db.begin_read()?;
        let nodes = txn.open_table(NODES)?;
        require_table(&nodes, table)?;

        let rows_name = rows_table_name(table);
        let rows = txn.open_table(rows_definition(&rows_name))?;
        let found = match rows.first()? {
            Some((_, value)) => Some(decode(value.value())?),
            None => None,
        };
        Ok(found)
    }

    fn last_row(&self, table: &NodePath) -> StoreResult<Option<Record>> {
        let txn = self.db.begin_read()?;
        let nodes = txn.open_table(NODES)?;
        require_table(&nodes, table)?;

        let rows_name = rows_table_name(table);
        let rows = txn.open_table(rows_definition(&rows_name))?;
        let found = match rows.last()? {
            Some((_, value)) => Some(decode(value.value())?),
            None => None,
        };
        Ok(found)
    }

    fn set_attr(&self, path: &NodePath, key: &str, value: AttrValue) -> StoreResult<()> {
        let txn = self.db.begin_write()?;
        {
            let nodes = txn.open_table(NODES)?;
            require_node(&nodes, path)?;

            let mut attrs = txn.open_table(ATTRS)?;
            let bytes = encode(&value)?;
            attrs.insert((path.as_str(), key), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    fn get_attr(&self, path: &NodePath, key: &str) -> StoreResult<Option<AttrValue>> {
        let txn = self.db.begin_read()?;
        let nodes = txn.open_table(NODES)?;
        require_node(&nodes, path)?;

        let attrs = txn.open_table(ATTRS)?;
        match attrs.get((path.as_str(), key))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }
}
