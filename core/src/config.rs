use serde::{Deserialize, Serialize};

use crate::store::PartitionId;

/// Partition layout of a posting index.
///
/// Partition `p` takes posting lists of up to `load_factor^(p + 1)` entries, so
/// small lists share small buckets and only a handful of very common words
/// reach the last partition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub load_factor: usize,
    pub partitions: u8,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            load_factor: 4,
            partitions: 8,
        }
    }
}

impl IndexConfig {
    /// Entry bound of partition `p`.
    pub fn capacity(&self, partition: PartitionId) -> usize {
        let factor = self.load_factor.max(2);
        factor.saturating_pow(partition as u32 + 1)
    }

    pub fn partition_count(&self) -> u8 {
        self.partitions.max(1)
    }

    /// Bound of the largest partition; no posting list may grow past it.
    pub fn max_entries(&self) -> usize {
        self.capacity(self.partition_count() - 1)
    }

    /// Smallest partition that can hold `entries` references.
    pub fn partition_for(&self, entries: usize) -> Option<PartitionId> {
        (0..self.partition_count()).find(|&p| entries <= self.capacity(p))
    }
}

/// Tuning of the ranking normalizer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Candidate sets larger than this are scanned by two workers.
    pub split_threshold: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            split_threshold: 600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacities_grow_by_load_factor() {
        let config = IndexConfig::default();
        assert_eq!(config.capacity(0), 4);
        assert_eq!(config.capacity(1), 16);
        assert_eq!(config.max_entries(), 4usize.pow(8));
    }

    #[test]
    fn lists_go_to_the_smallest_fitting_partition() {
        let config = IndexConfig {
            load_factor: 2,
            partitions: 3,
        };
        assert_eq!(config.partition_for(0), Some(0));
        assert_eq!(config.partition_for(2), Some(0));
        assert_eq!(config.partition_for(3), Some(1));
        assert_eq!(config.partition_for(8), Some(2));
        assert_eq!(config.partition_for(9), None);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: IndexConfig = serde_json::from_str(r#"{"partitions": 3}"#).unwrap();
        assert_eq!(config.load_factor, 4);
        assert_eq!(config.partitions, 3);
        let normalizer: NormalizerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(normalizer.split_threshold, 600);
    }
}
