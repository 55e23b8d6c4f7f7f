//! On-disk value encoding for the redb store.
//!
//! Every stored value is `[version][bincode payload]`. The version byte lets
//! the layout evolve without breaking existing files.

use super::{StorageTuning, StoreError, StoreResult};
use crate::record::Schema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Current encoding version for stored values
pub const VALUE_VERSION: u8 = 1;

/// Node metadata kept in the node table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum NodeRecord {
    Group,
    Table {
        schema: Schema,
        tuning: StorageTuning,
    },
}

impl NodeRecord {
    pub(crate) fn kind(&self) -> super::NodeKind {
        match self {
            NodeRecord::Group => super::NodeKind::Group,
            NodeRecord::Table { .. } => super::NodeKind::Table,
        }
    }
}

/// Encodes a value into storage format.
pub fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    let payload = bincode::serialize(value).map_err(|e| StoreError::Encoding(e.to_string()))?;

    let mut result = Vec::with_capacity(1 + payload.len());
    result.push(VALUE_VERSION);
    result.extend_from_slice(&payload);

    Ok(result)
}

/// Decodes storage bytes produced by [`encode`].
pub fn decode<T: DeserializeOwned>(data: &[u8]) -> StoreResult<T> {
    let payload = payload(data)?;
    bincode::deserialize(payload).map_err(|e| StoreError::Encoding(e.to_string()))
}

/// Reads only the timestamp of an encoded record.
///
/// `Record` serializes its timestamp first, so the leading `i64` of the
/// payload is the timestamp and the values need not be decoded.
pub fn decode_timestamp(data: &[u8]) -> StoreResult<i64> {
    let payload = payload(data)?;
    bincode::deserialize::<i64>(payload).map_err(|e| StoreError::Encoding(e.to_string()))
}

fn payload(data: &[u8]) -> StoreResult<&[u8]> {
    match data.split_first() {
        None => Err(StoreError::Encoding("empty value".to_string())),
        Some((&VALUE_VERSION, payload)) => Ok(payload),
        Some((version, _)) => Err(StoreError::Encoding(format!(
            "unsupported version: {}",
            version
        ))),
    }
}
