//! Reverse word index of a peer-to-peer search node.
//!
//! Words and documents are addressed by Base64 hashes whose [`Base64Order`]
//! doubles as the layout of the index and the position on the DHT ring.
//! A [`PostingIndex`] keeps one posting list per word hash, spread over
//! size-graded partitions, and a [`RankingNormalizer`] orders the candidates
//! a lookup returns.

pub mod condenser;
pub mod config;
pub mod error;
pub mod hash;
pub mod index;
pub mod order;
pub mod persist;
pub mod posting;
pub mod ranking;
pub mod reference;
pub mod store;

pub use config::{IndexConfig, NormalizerConfig};
pub use error::{IndexError, IndexResult, KeyError, ProfileError, RankingError, StoreError};
pub use hash::{HostHash, UrlHash, WordHash};
pub use index::{PostingIndex, PostingIterator};
pub use order::{Base64Order, ByteOrder, NaturalOrder, LONG_MAX};
pub use posting::PostingList;
pub use ranking::{HostReputation, NoReputation, RankingNormalizer, RankingProfile, ReputationTable};
pub use reference::{DocRef, Flag, FlagSet};
pub use store::{MemoryStore, PartitionStore, SledStore};
