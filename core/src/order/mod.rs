//! Total orders over byte keys.
//!
//! Every ordering here serves two purposes at once: it defines how keys are laid
//! out in the index and it maps keys onto the DHT ring via [`ByteOrder::cardinal`].

mod base64;

pub use base64::{Alphabet, Base64Order, CompiledPivot};

use std::cmp::Ordering;

/// Upper end of the ring that `cardinal` maps keys onto.
pub const LONG_MAX: u64 = i64::MAX as u64;

pub trait ByteOrder: Send + Sync {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;

    /// Whether `key` consists only of symbols this order knows.
    fn wellformed(&self, key: &[u8]) -> bool;

    /// Position of `key` on the ring `[0, LONG_MAX]`.
    fn cardinal(&self, key: &[u8]) -> u64;

    fn is_ascending(&self) -> bool;

    fn equal(&self, a: &[u8], b: &[u8]) -> bool {
        self.compare(a, b) == Ordering::Equal
    }
}

/// Unsigned byte-value order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NaturalOrder {
    ascending: bool,
}

impl NaturalOrder {
    pub fn new(ascending: bool) -> Self {
        Self { ascending }
    }
}

impl Default for NaturalOrder {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ByteOrder for NaturalOrder {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        if self.ascending {
            a.cmp(b)
        } else {
            b.cmp(a)
        }
    }

    fn wellformed(&self, _key: &[u8]) -> bool {
        true
    }

    fn cardinal(&self, key: &[u8]) -> u64 {
        let mut word = [0u8; 8];
        let n = key.len().min(8);
        word[..n].copy_from_slice(&key[..n]);
        u64::from_be_bytes(word) >> 1
    }

    fn is_ascending(&self) -> bool {
        self.ascending
    }
}
