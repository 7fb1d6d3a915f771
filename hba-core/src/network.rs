//! Precomputed river-network records and the index that serves them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::pfaf::PfafCode;

/// HydroBASINS identifiers are 10-digit integers.
pub type BasinId = i64;

/// Network attributes of one basin, produced by the network-building step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRecord {
    pub id: BasinId,
    /// Local (sub-basin) area.
    pub area: f64,
    /// Cumulative drainage area including every upstream basin.
    pub tot_area: f64,
    pub pfaf_id: PfafCode,
    pub order: i32,
    /// Every basin draining into this one. Unordered; whether the basin
    /// itself appears depends on how the index was built.
    pub up_seg_ids: Vec<BasinId>,
}

/// Read-only lookup of network records by basin id.
pub trait NetworkIndex {
    /// Fails with [`Error::BasinNotFound`] when the basin is absent.
    fn get(&self, id: BasinId) -> Result<NetworkRecord>;

    fn contains(&self, id: BasinId) -> Result<bool> {
        match self.get(id) {
            Ok(_) => Ok(true),
            Err(Error::BasinNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Network index held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryNetworkIndex {
    records: HashMap<BasinId, NetworkRecord>,
}

impl MemoryNetworkIndex {
    pub fn new() -> Self {
        MemoryNetworkIndex::default()
    }

    pub fn insert(&mut self, record: NetworkRecord) {
        self.records.insert(record.id, record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<NetworkRecord> for MemoryNetworkIndex {
    fn from_iter<T: IntoIterator<Item = NetworkRecord>>(iter: T) -> Self {
        MemoryNetworkIndex {
            records: iter.into_iter().map(|r| (r.id, r)).collect(),
        }
    }
}

impl NetworkIndex for MemoryNetworkIndex {
    fn get(&self, id: BasinId) -> Result<NetworkRecord> {
        self.records
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::BasinNotFound(id.to_string()))
    }
}
