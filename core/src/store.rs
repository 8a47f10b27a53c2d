//! Byte-array storage beneath the posting index.
//!
//! A store holds a fixed set of partitions, each an ordered map from byte keys
//! to byte values. Scans run in plain unsigned byte order of the keys.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use parking_lot::RwLock;

use crate::error::StoreError;

pub type PartitionId = u8;

pub type KeyValue = (Vec<u8>, Vec<u8>);

pub type Scan<'a> = Box<dyn Iterator<Item = Result<KeyValue, StoreError>> + 'a>;

pub trait PartitionStore: Send + Sync {
    fn get(&self, partition: PartitionId, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    fn put(&self, partition: PartitionId, key: &[u8], value: Vec<u8>) -> Result<(), StoreError>;

    fn delete(&self, partition: PartitionId, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Entries with keys `>= from`, ascending.
    fn scan(&self, partition: PartitionId, from: &[u8]) -> Result<Scan<'_>, StoreError>;

    fn len(&self, partition: PartitionId) -> Result<usize, StoreError>;

    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Partitions kept in ordered maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    partitions: RwLock<HashMap<PartitionId, BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PartitionStore for MemoryStore {
    fn get(&self, partition: PartitionId, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .partitions
            .read()
            .get(&partition)
            .and_then(|p| p.get(key).cloned()))
    }

    fn put(&self, partition: PartitionId, key: &[u8], value: Vec<u8>) -> Result<(), StoreError> {
        self.partitions
            .write()
            .entry(partition)
            .or_default()
            .insert(key.to_vec(), value);
        Ok(())
    }

    fn delete(&self, partition: PartitionId, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .partitions
            .write()
            .get_mut(&partition)
            .and_then(|p| p.remove(key)))
    }

    fn scan(&self, partition: PartitionId, from: &[u8]) -> Result<Scan<'_>, StoreError> {
        // snapshot so the lock is not held while the caller iterates
        let entries: Vec<KeyValue> = self
            .partitions
            .read()
            .get(&partition)
            .map(|p| {
                p.range(from.to_vec()..)
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Ok(Box::new(entries.into_iter().map(Ok)))
    }

    fn len(&self, partition: PartitionId) -> Result<usize, StoreError> {
        Ok(self
            .partitions
            .read()
            .get(&partition)
            .map_or(0, BTreeMap::len))
    }
}

/// One sled tree per partition.
pub struct SledStore {
    db: sled::Db,
    trees: RwLock<HashMap<PartitionId, sled::Tree>>,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Ok(Self::with_db(sled::open(path)?))
    }

    pub fn temporary() -> Result<Self, StoreError> {
        Ok(Self::with_db(sled::Config::new().temporary(true).open()?))
    }

    pub fn with_db(db: sled::Db) -> Self {
        Self {
            db,
            trees: RwLock::new(HashMap::new()),
        }
    }

    /// The underlying database, for callers keeping side tables next to the index.
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    fn tree(&self, partition: PartitionId) -> Result<sled::Tree, StoreError> {
        if let Some(tree) = self.trees.read().get(&partition) {
            return Ok(tree.clone());
        }
        let tree = self.db.open_tree(format!("partition-{partition:02}"))?;
        self.trees.write().insert(partition, tree.clone());
        Ok(tree)
    }
}

impl PartitionStore for SledStore {
    fn get(&self, partition: PartitionId, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.tree(partition)?.get(key)?.map(|v| v.to_vec()))
    }

    fn put(&self, partition: PartitionId, key: &[u8], value: Vec<u8>) -> Result<(), StoreError> {
        self.tree(partition)?.insert(key, value)?;
        Ok(())
    }

    fn delete(&self, partition: PartitionId, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.tree(partition)?.remove(key)?.map(|v| v.to_vec()))
    }

    fn scan(&self, partition: PartitionId, from: &[u8]) -> Result<Scan<'_>, StoreError> {
        let iter = self.tree(partition)?.range(from.to_vec()..);
        Ok(Box::new(iter.map(|item| {
            item.map(|(k, v)| (k.to_vec(), v.to_vec()))
                .map_err(StoreError::from)
        })))
    }

    fn len(&self, partition: PartitionId) -> Result<usize, StoreError> {
        Ok(self.tree(partition)?.len())
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}
