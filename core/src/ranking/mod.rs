//! Ranking of the candidates for one query term.
//!
//! A [`RankingNormalizer`] scans the candidate set for per-feature bounds and
//! host frequencies, then scores every reference against those bounds with the
//! coefficients of a [`RankingProfile`].

mod normalizer;
mod profile;
mod stats;

pub use normalizer::{Ranking, RankingNormalizer};
pub use profile::{RankingProfile, MAX_COEFFICIENT};
pub use stats::{Features, Statistics};

use std::collections::HashMap;

use crate::hash::HostHash;

/// Externally maintained host reputation.
pub trait HostReputation: Send + Sync {
    /// `0` for the best hosts up to `15` for unknown or blocked ones.
    fn block_rank(&self, host: &HostHash) -> u8;
}

/// Every host is unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReputation;

impl HostReputation for NoReputation {
    fn block_rank(&self, _host: &HostHash) -> u8 {
        15
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReputationTable {
    ranks: HashMap<HostHash, u8>,
}

impl ReputationTable {
    pub fn insert(&mut self, host: HostHash, block_rank: u8) {
        self.ranks.insert(host, block_rank.min(15));
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

impl FromIterator<(HostHash, u8)> for ReputationTable {
    fn from_iter<I: IntoIterator<Item = (HostHash, u8)>>(iter: I) -> Self {
        let mut table = Self::default();
        for (host, rank) in iter {
            table.insert(host, rank);
        }
        table
    }
}

impl HostReputation for ReputationTable {
    fn block_rank(&self, host: &HostHash) -> u8 {
        self.ranks.get(host).copied().unwrap_or(15)
    }
}
