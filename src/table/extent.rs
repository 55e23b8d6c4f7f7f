//! Partition discovery and table extents.
//!
//! Partitions are discovered by walking the `y<yyyy>/m<mm>/d<dd>/ts_data`
//! hierarchy in the store, so rows written through any handle are visible.
//! Walks are bounded by partition index and prune year and month groups
//! outside the bounds. [`PartitionIndex`] is the in-memory result of such a
//! walk.

use super::DATA_TABLE;
use crate::partition::PartitionPath;
use crate::store::{NodeKind, NodePath, StoreResult, TableStore};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use tracing::debug;

/// Existing partitions of one table, ordered by partition index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionIndex {
    tables: BTreeMap<i64, NodePath>,
}

impl PartitionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans the whole `y<yyyy>/m<mm>/d<dd>/ts_data` hierarchy under `root`.
    ///
    /// Groups whose names do not parse as a calendar day are ignored, as are
    /// day groups without a data table.
    pub fn rebuild<S: TableStore>(store: &S, root: &NodePath) -> StoreResult<Self> {
        Self::scan(store, root, i64::MIN..=i64::MAX)
    }

    /// Scans only the partitions whose index lies in `partitions`.
    pub fn scan<S: TableStore>(
        store: &S,
        root: &NodePath,
        partitions: RangeInclusive<i64>,
    ) -> StoreResult<Self> {
        let mut index = Self::new();
        walk(store, root, partitions, false, |partition, table| {
            index.insert(partition, table);
            Ok(None::<()>)
        })?;
        Ok(index)
    }

    /// Data table of a partition, if it exists.
    pub fn get(&self, partition: i64) -> Option<&NodePath> {
        self.tables.get(&partition)
    }

    pub fn contains(&self, partition: i64) -> bool {
        self.tables.contains_key(&partition)
    }

    pub(crate) fn insert(&mut self, partition: i64, table: NodePath) {
        self.tables.insert(partition, table);
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Lowest partition index present.
    pub fn first(&self) -> Option<i64> {
        self.tables.keys().next().copied()
    }

    /// Highest partition index present.
    pub fn last(&self) -> Option<i64> {
        self.tables.keys().next_back().copied()
    }

    /// Partitions in ascending order.
    pub fn iter(&self) -> Partitions<'_> {
        Partitions {
            inner: self.tables.range(..),
        }
    }

    /// Partitions within `[first, last]`, ascending.
    pub fn range(&self, first: i64, last: i64) -> Partitions<'_> {
        if first > last {
            return Partitions {
                inner: self.tables.range(0..0),
            };
        }
        Partitions {
            inner: self.tables.range(first..=last),
        }
    }
}

/// Iterator over `(partition index, table path)` pairs of a [`PartitionIndex`].
pub struct Partitions<'a> {
    inner: btree_map::Range<'a, i64, NodePath>,
}

impl<'a> Iterator for Partitions<'a> {
    type Item = (i64, &'a NodePath);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(p, path)| (*p, path))
    }
}

impl<'a> DoubleEndedIterator for Partitions<'a> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(p, path)| (*p, path))
    }
}

/// Path of a partition's data table below `root`.
pub(crate) fn partition_table(root: &NodePath, path: &PartitionPath) -> StoreResult<NodePath> {
    let mut table = root.clone();
    for name in path.names() {
        table = table.join(&name)?;
    }
    table.join(DATA_TABLE)
}

/// Visits the partitions of `root` with index in `partitions`, ascending or
/// descending, until `visit` returns a value.
pub(crate) fn walk<S, T, F>(
    store: &S,
    root: &NodePath,
    partitions: RangeInclusive<i64>,
    descending: bool,
    mut visit: F,
) -> StoreResult<Option<T>>
where
    S: TableStore,
    F: FnMut(i64, NodePath) -> StoreResult<Option<T>>,
{
    let (first, last) = (*partitions.start(), *partitions.end());
    if first > last {
        return Ok(None);
    }

    // Days outside chrono's calendar leave that side unbounded.
    let lower = PartitionPath::from_index(first)
        .ok()
        .map(|p| (i64::from(p.year), i64::from(p.month)));
    let upper = PartitionPath::from_index(last)
        .ok()
        .map(|p| (i64::from(p.year), i64::from(p.month)));
    let after_lower = |key: (i64, i64)| lower.map_or(true, |bound| key >= bound);
    let before_upper = |key: (i64, i64)| upper.map_or(true, |bound| key <= bound);

    for (year, year_name) in numbered_groups(store, root, 'y', descending)? {
        if !after_lower((year, 12)) || !before_upper((year, 1)) {
            continue;
        }
        let year_path = root.join(&year_name)?;

        for (month, month_name) in numbered_groups(store, &year_path, 'm', descending)? {
            if !after_lower((year, month)) || !before_upper((year, month)) {
                continue;
            }
            let month_path = year_path.join(&month_name)?;

            for (_, day_name) in numbered_groups(store, &month_path, 'd', descending)? {
                let Some(partition) = PartitionPath::parse(&year_name, &month_name, &day_name)
                    .and_then(|path| path.index())
                else {
                    debug!(root = %root, year = %year_name, month = %month_name, day = %day_name, "skipping foreign group");
                    continue;
                };
                if partition < first || partition > last {
                    continue;
                }

                let day_path = month_path.join(&day_name)?;
                if store.get_child(&day_path, DATA_TABLE)? != Some(NodeKind::Table) {
                    continue;
                }
                if let Some(found) = visit(partition, day_path.join(DATA_TABLE)?)? {
                    return Ok(Some(found));
                }
            }
        }
    }

    Ok(None)
}

/// Child groups named `<prefix><number>`, ordered by number.
fn numbered_groups<S: TableStore>(
    store: &S,
    parent: &NodePath,
    prefix: char,
    descending: bool,
) -> StoreResult<Vec<(i64, String)>> {
    let mut groups: Vec<(i64, String)> = store
        .list_children(parent)?
        .into_iter()
        .filter(|(_, kind)| *kind == NodeKind::Group)
        .filter_map(|(name, _)| {
            let number = name.strip_prefix(prefix)?.parse::<i64>().ok()?;
            Some((number, name))
        })
        .collect();
    groups.sort();
    if descending {
        groups.reverse();
    }
    Ok(groups)
}

/// Timestamp of the last row of the newest non-empty partition.
pub(crate) fn max_timestamp<S: TableStore>(
    store: &S,
    root: &NodePath,
) -> StoreResult<Option<i64>> {
    walk(store, root, i64::MIN..=i64::MAX, true, |_, table| {
        Ok(store.last_row(&table)?.map(|record| record.timestamp))
    })
}

/// Timestamp of the first row of the oldest non-empty partition.
pub(crate) fn min_timestamp<S: TableStore>(
    store: &S,
    root: &NodePath,
) -> StoreResult<Option<i64>> {
    walk(store, root, i64::MIN..=i64::MAX, false, |_, table| {
        Ok(store.first_row(&table)?.map(|record| record.timestamp))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Field, FieldType, Record, Schema, Value};
    use crate::store::{RedbStore, StorageTuning};
    use tempfile::NamedTempFile;

    fn schema() -> Schema {
        Schema::with_timestamp(vec![Field::new("v", FieldType::Int32)]).unwrap()
    }

    fn add_partition(
        store: &RedbStore,
        root: &NodePath,
        names: [&str; 3],
    ) -> Result<NodePath, Box<dyn std::error::Error>> {
        let mut parent = root.clone();
        for name in names {
            if store.get_child(&parent, name)?.is_none() {
                store.create_group(&parent, name)?;
            }
            parent = parent.join(name)?;
        }
        Ok(store.create_table(&parent, DATA_TABLE, &schema(), &StorageTuning::default())?)
    }

    #[test]
    fn rebuild_finds_partitions_and_skips_foreign_nodes() -> Result<(), Box<dyn std::error::Error>>
    {
        let temp_file = NamedTempFile::new()?;
        let store = RedbStore::create(temp_file.path())?;
        let root = store.create_group(&NodePath::root(), "series")?;

        add_partition(&store, &root, ["y2014", "m05", "d05"])?;
        add_partition(&store, &root, ["y2014", "m05", "d07"])?;
        add_partition(&store, &root, ["y1969", "m12", "d31"])?;
        // Not a calendar day, and a day group without data.
        add_partition(&store, &root, ["y2014", "m02", "d30"])?;
        store.create_group(&root.join("y2014")?.join("m05")?, "d09")?;
        store.create_group(&root, "notes")?;

        let index = PartitionIndex::rebuild(&store, &root)?;
        assert_eq!(index.len(), 3);
        assert_eq!(index.first(), Some(-1));
        assert_eq!(index.last(), Some(16197));
        assert_eq!(
            index.get(16195).map(NodePath::as_str),
            Some("/series/y2014/m05/d05/ts_data")
        );
        assert!(!index.contains(16199));
        Ok(())
    }

    #[test]
    fn extents_skip_empty_partitions() -> Result<(), Box<dyn std::error::Error>> {
        let temp_file = NamedTempFile::new()?;
        let store = RedbStore::create(temp_file.path())?;
        let root = store.create_group(&NodePath::root(), "series")?;

        assert_eq!(max_timestamp(&store, &root)?, None);

        add_partition(&store, &root, ["y2014", "m05", "d01"])?;
        let filled = add_partition(&store, &root, ["y2014", "m05", "d02"])?;
        add_partition(&store, &root, ["y2014", "m05", "d03"])?;
        store.append_rows(
            &filled,
            &[
                Record::new(1_399_000_000_000, vec![Value::Int32(1)]),
                Record::new(1_399_000_000_500, vec![Value::Int32(2)]),
            ],
        )?;

        assert_eq!(PartitionIndex::rebuild(&store, &root)?.len(), 3);
        assert_eq!(max_timestamp(&store, &root)?, Some(1_399_000_000_500));
        assert_eq!(min_timestamp(&store, &root)?, Some(1_399_000_000_000));
        Ok(())
    }

    #[test]
    fn scan_prunes_to_bounds() -> Result<(), Box<dyn std::error::Error>> {
        let temp_file = NamedTempFile::new()?;
        let store = RedbStore::create(temp_file.path())?;
        let root = store.create_group(&NodePath::root(), "series")?;

        add_partition(&store, &root, ["y2013", "m12", "d31"])?;
        add_partition(&store, &root, ["y2014", "m01", "d01"])?;
        add_partition(&store, &root, ["y2014", "m02", "d01"])?;
        add_partition(&store, &root, ["y2015", "m01", "d01"])?;

        // 2014-01-01 up to 2014-12-31
        let index = PartitionIndex::scan(&store, &root, 16071..=16435)?;
        let found: Vec<i64> = index.iter().map(|(p, _)| p).collect();
        assert_eq!(found, vec![16071, 16102]);

        assert!(PartitionIndex::scan(&store, &root, 5..=4)?.is_empty());
        assert_eq!(PartitionIndex::scan(&store, &root, i64::MIN..=16070)?.len(), 1);

        let newest = walk(&store, &root, i64::MIN..=i64::MAX, true, |p, _| Ok(Some(p)))?;
        assert_eq!(newest, Some(16436));
        assert_eq!(
            partition_table(&root, &PartitionPath::from_index(16071)?)?.as_str(),
            "/series/y2014/m01/d01/ts_data"
        );
        Ok(())
    }

    #[test]
    fn range_is_bounded_and_reversible() {
        let mut index = PartitionIndex::new();
        for p in [-3, 0, 2, 5] {
            index.insert(p, NodePath::root().join(&format!("p{}", p)).unwrap());
        }

        let found: Vec<i64> = index.range(-1, 4).map(|(p, _)| p).collect();
        assert_eq!(found, vec![0, 2]);

        let reversed: Vec<i64> = index.iter().rev().map(|(p, _)| p).collect();
        assert_eq!(reversed, vec![5, 2, 0, -3]);

        assert_eq!(index.range(4, -1).count(), 0);
    }
}
