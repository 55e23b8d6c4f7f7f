//! Hierarchical table store.
//!
//! The time series engine only talks to storage through [`TableStore`]: a
//! tree of groups whose leaves are append-only tables of records, with small
//! attributes attached to any node. [`RedbStore`] implements it on redb.

use crate::record::{Record, Schema};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use thiserror::Error;

pub mod encoding;
pub mod redb;

pub use self::redb::RedbStore;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors returned by a [`TableStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("node not found: {0}")]
    NotFound(String),

    #[error("node already exists: {0}")]
    AlreadyExists(String),

    #[error("node is not a group: {0}")]
    NotAGroup(String),

    #[error("node is not a table: {0}")]
    NotATable(String),

    #[error("group is not empty: {0}")]
    NotEmpty(String),

    #[error("invalid node name `{0}`")]
    InvalidName(String),

    #[error("invalid storage tuning: {0}")]
    InvalidTuning(String),

    #[error("stored value could not be decoded: {0}")]
    Encoding(String),

    #[error("storage backend error: {0}")]
    Backend(#[from] ::redb::Error),
}

macro_rules! impl_from_redb {
    ($($err:ty),* $(,)?) => {
        $(
            impl From<$err> for StoreError {
                fn from(err: $err) -> Self {
                    StoreError::Backend(err.into())
                }
            }
        )*
    };
}

impl_from_redb!(
    ::redb::DatabaseError,
    ::redb::TransactionError,
    ::redb::TableError,
    ::redb::StorageError,
    ::redb::CommitError,
);

/// Absolute path of a node, `/` being the implicit root group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodePath(String);

impl NodePath {
    pub fn root() -> Self {
        NodePath("/".to_string())
    }

    /// Parses an absolute path such as `/markets/EURUSD`.
    pub fn parse(path: &str) -> StoreResult<Self> {
        let mut node = Self::root();
        for name in path.split('/').filter(|s| !s.is_empty()) {
            node = node.join(name)?;
        }
        Ok(node)
    }

    /// Path of the child `name`.
    pub fn join(&self, name: &str) -> StoreResult<Self> {
        if name.is_empty() || name.contains('/') {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        if self.is_root() {
            Ok(NodePath(format!("/{}", name)))
        } else {
            Ok(NodePath(format!("{}/{}", self.0, name)))
        }
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Parent path, or `None` for the root.
    pub fn parent(&self) -> Option<NodePath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(pos) => Some(NodePath(self.0[..pos].to_string())),
            None => None,
        }
    }

    /// Last path component; empty for the root.
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix shared by every descendant key.
    pub(crate) fn child_prefix(&self) -> String {
        if self.is_root() {
            "/".to_string()
        } else {
            format!("{}/", self.0)
        }
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of a stored node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Group,
    Table,
}

/// Small typed value attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            AttrValue::UInt(v) => Some(v),
            AttrValue::Int(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_string())
    }
}

impl From<u64> for AttrValue {
    fn from(value: u64) -> Self {
        AttrValue::UInt(value)
    }
}

/// Byte order hint for stored numeric data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByteOrder {
    Little,
    Big,
}

/// Storage-specific options recorded with each table.
///
/// The engine passes these through unchanged; the store decides what they
/// mean and rejects values it cannot honour.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageTuning {
    /// Human readable title of the table
    pub title: String,

    /// Rows per storage chunk; must be greater than 0 when set
    pub chunk_rows: Option<u32>,

    /// Byte order of stored numbers
    pub byte_order: Option<ByteOrder>,

    /// Compression level between 0 and 9
    pub compression_level: Option<u8>,
}

impl StorageTuning {
    /// Checks the options every store must refuse.
    pub fn validate(&self) -> StoreResult<()> {
        if self.chunk_rows == Some(0) {
            return Err(StoreError::InvalidTuning(
                "chunk_rows must be greater than 0".to_string(),
            ));
        }
        if let Some(level) = self.compression_level {
            if level > 9 {
                return Err(StoreError::InvalidTuning(format!(
                    "compression level {} is outside 0..=9",
                    level
                )));
            }
        }
        Ok(())
    }
}

/// A hierarchical store of append-only record tables.
///
/// Nodes are addressed by [`NodePath`]. Groups may contain groups and tables;
/// tables hold records in append order and are never rewritten.
pub trait TableStore {
    /// Creates group `name` under `parent`.
    ///
    /// Fails if the node already exists or `parent` is not an existing group.
    fn create_group(&self, parent: &NodePath, name: &str) -> StoreResult<NodePath>;

    /// Looks up the kind of child `name` of `parent`, if it exists.
    fn get_child(&self, parent: &NodePath, name: &str) -> StoreResult<Option<NodeKind>>;

    /// Kind of the node at `path`, if it exists. The root is always a group.
    fn node_kind(&self, path: &NodePath) -> StoreResult<Option<NodeKind>>;

    /// Direct children of a group, ordered by name.
    fn list_children(&self, parent: &NodePath) -> StoreResult<Vec<(String, NodeKind)>>;

    /// Creates table `name` under `parent` with the given row schema.
    ///
    /// Fails on malformed `tuning` without creating anything.
    fn create_table(
        &self,
        parent: &NodePath,
        name: &str,
        schema: &Schema,
        tuning: &StorageTuning,
    ) -> StoreResult<NodePath>;

    /// Schema a table was created with.
    fn table_schema(&self, table: &NodePath) -> StoreResult<Schema>;

    /// Storage tuning a table was created with.
    fn table_tuning(&self, table: &NodePath) -> StoreResult<StorageTuning>;

    /// Removes a table or an empty group, including its attributes.
    fn remove_node(&self, path: &NodePath) -> StoreResult<()>;

    /// Appends records to the end of a table.
    fn append_rows(&self, table: &NodePath, records: &[Record]) -> StoreResult<()>;

    /// Every record of a table, in append order.
    fn read_all(&self, table: &NodePath) -> StoreResult<Vec<Record>>;

    /// Records whose timestamp lies within `range`, in append order.
    ///
    /// Tables written by the engine are sorted by timestamp, which lets the
    /// store search instead of scan.
    fn read_where(&self, table: &NodePath, range: RangeInclusive<i64>) -> StoreResult<Vec<Record>>;

    fn row_count(&self, table: &NodePath) -> StoreResult<u64>;

    fn first_row(&self, table: &NodePath) -> StoreResult<Option<Record>>;

    fn last_row(&self, table: &NodePath) -> StoreResult<Option<Record>>;

    fn set_attr(&self, path: &NodePath, key: &str, value: AttrValue) -> StoreResult<()>;

    fn get_attr(&self, path: &NodePath, key: &str) -> StoreResult<Option<AttrValue>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_path_join_and_parent() {
        let root = NodePath::root();
        let series = root.join("EURUSD").unwrap();
        let day = series.join("y2014").unwrap();

        assert_eq!(series.as_str(), "/EURUSD");
        assert_eq!(day.as_str(), "/EURUSD/y2014");
        assert_eq!(day.parent(), Some(series.clone()));
        assert_eq!(series.parent(), Some(root.clone()));
        assert_eq!(root.parent(), None);
        assert_eq!(day.name(), "y2014");
    }

    #[test]
    fn test_node_path_parse() {
        let path = NodePath::parse("/markets//EURUSD/").unwrap();
        assert_eq!(path.as_str(), "/markets/EURUSD");
        assert!(NodePath::parse("/").unwrap().is_root());
    }

    #[test]
    fn test_invalid_names() {
        assert!(NodePath::root().join("").is_err());
        assert!(NodePath::root().join("a/b").is_err());
    }

    #[test]
    fn test_tuning_validation() {
        assert!(StorageTuning::default().validate().is_ok());

        let zero_chunk = StorageTuning {
            chunk_rows: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            zero_chunk.validate(),
            Err(StoreError::InvalidTuning(_))
        ));

        let compression = StorageTuning {
            compression_level: Some(12),
            ..Default::default()
        };
        assert!(compression.validate().is_err());
    }

    #[test]
    fn test_attr_accessors() {
        assert_eq!(AttrValue::from("x").as_str(), Some("x"));
        assert_eq!(AttrValue::from(5u64).as_u64(), Some(5));
        assert_eq!(AttrValue::Int(-1).as_u64(), None);
    }
}
