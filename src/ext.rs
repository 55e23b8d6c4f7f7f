//! Time series operations on any [`TableStore`].

use crate::error::Result;
use crate::partition::TableConfig;
use crate::record::Schema;
use crate::store::{NodeKind, NodePath, StoreError, TableStore};
use crate::table::{self, TsTable};
use tracing::warn;

/// Extension trait adding time series tables to a store.
///
/// Implemented for every cloneable store; each returned [`TsTable`] holds
/// its own clone.
///
/// # Example
/// ```rust,no_run
/// use redb_tstable::{Field, FieldType, NodePath, RedbStore, Schema, TableConfig, TimeSeriesExt};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = RedbStore::create("ticks.redb")?;
/// let schema = Schema::with_timestamp(vec![Field::new("price", FieldType::Float64)])?;
/// let mut ts = store.create_ts(&NodePath::root(), "EURUSD", schema, TableConfig::default(), false)?;
/// ts.append(vec![redb_tstable::Record::new(1_399_251_661_100, vec![1.3921f64.into()])])?;
/// # Ok(())
/// # }
/// ```
pub trait TimeSeriesExt: TableStore + Clone + Sized {
    /// Creates time series `name` under `parent`.
    ///
    /// With `create_parents`, missing groups on the way to `parent` are
    /// created first. If the table cannot be created, those groups are
    /// removed again, newest first.
    fn create_ts(
        &self,
        parent: &NodePath,
        name: &str,
        schema: Schema,
        config: TableConfig,
        create_parents: bool,
    ) -> Result<TsTable<Self>> {
        let created = if create_parents {
            create_groups(self, parent)?
        } else {
            Vec::new()
        };

        let result = TsTable::create(self.clone(), parent, name, schema, config);
        if result.is_err() {
            remove_groups(self, &created);
        }
        result
    }

    /// Opens the time series rooted at `root`.
    fn open_ts(&self, root: &NodePath) -> Result<TsTable<Self>> {
        TsTable::open(self.clone(), root)
    }

    /// Whether `path` is the root of a time series.
    fn is_timeseries(&self, path: &NodePath) -> Result<bool> {
        table::is_timeseries(self, path)
    }
}

impl<S: TableStore + Clone> TimeSeriesExt for S {}

/// Creates every missing group from the root down to `path`, returning the
/// groups created in creation order.
///
/// If one of them fails, the groups already created are removed again.
fn create_groups<S: TableStore>(store: &S, path: &NodePath) -> Result<Vec<NodePath>> {
    let mut missing = Vec::new();
    let mut current = path.clone();
    while let Some(parent) = current.parent() {
        match store.node_kind(&current)? {
            Some(NodeKind::Group) => break,
            Some(NodeKind::Table) => return Err(StoreError::NotAGroup(current.to_string()).into()),
            None => missing.push(current.clone()),
        }
        current = parent;
    }

    let mut created = Vec::new();
    for group in missing.into_iter().rev() {
        let Some(parent) = group.parent() else {
            continue;
        };
        if let Err(err) = store.create_group(&parent, group.name()) {
            remove_groups(store, &created);
            return Err(err.into());
        }
        created.push(group);
    }
    Ok(created)
}

/// Removes groups made by [`create_groups`], newest first.
fn remove_groups<S: TableStore>(store: &S, created: &[NodePath]) {
    for group in created.iter().rev() {
        if let Err(err) = store.remove_node(group) {
            warn!(group = %group, error = %err, "failed to remove parent group");
        }
    }
}
