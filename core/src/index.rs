//! Partitioned map from word hash to posting list.
//!
//! A posting list lives in exactly one partition, the smallest whose bound
//! fits its length. While `merge` moves a list it briefly sits in both the
//! old and the new partition; readers see it once. Store keys are the ordinal form of the word hash, so every
//! partition scans in alphabet order and iteration only has to merge them.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{ArcMutexGuard, Mutex, RawMutex};

use crate::config::IndexConfig;
use crate::error::{IndexError, IndexResult, StoreError};
use crate::hash::{UrlHash, WordHash, WORD_HASH_LENGTH};
use crate::order::{Base64Order, ByteOrder};
use crate::posting::PostingList;
use crate::reference::DocRef;
use crate::store::{PartitionId, PartitionStore, Scan};

/// One lock per word currently being written.
#[derive(Default)]
struct KeyLocks {
    table: Mutex<HashMap<WordHash, Arc<Mutex<()>>>>,
}

struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    word: WordHash,
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
}

impl KeyLocks {
    fn lock(&self, word: WordHash) -> KeyGuard<'_> {
        let slot = Arc::clone(self.table.lock().entry(word).or_default());
        let guard = slot.lock_arc();
        KeyGuard {
            locks: self,
            word,
            guard: Some(guard),
        }
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut table = self.locks.table.lock();
        if table
            .get(&self.word)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            table.remove(&self.word);
        }
    }
}

pub struct PostingIndex<S> {
    store: S,
    order: Base64Order,
    config: IndexConfig,
    locks: KeyLocks,
}

impl<S: PartitionStore> PostingIndex<S> {
    pub fn new(store: S, order: &Base64Order, config: IndexConfig) -> Self {
        Self {
            store,
            order: order.canonical(),
            config,
            locks: KeyLocks::default(),
        }
    }

    pub fn order(&self) -> &Base64Order {
        &self.order
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn store_key(&self, word: &WordHash) -> IndexResult<Vec<u8>> {
        Ok(self.order.ordinal_key(word.as_bytes())?)
    }

    fn decode(&self, word: WordHash, bytes: &[u8]) -> IndexResult<PostingList> {
        Ok(PostingList::decode_entries(word, &self.order, bytes)?)
    }

    fn locate(&self, word: &WordHash, key: &[u8]) -> IndexResult<Option<(PartitionId, PostingList)>> {
        for partition in 0..self.config.partition_count() {
            if let Some(bytes) = self.store.get(partition, key)? {
                return Ok(Some((partition, self.decode(*word, &bytes)?)));
            }
        }
        Ok(None)
    }

    pub fn get(&self, word: &WordHash) -> IndexResult<Option<PostingList>> {
        let key = self.store_key(word)?;
        Ok(self.locate(word, &key)?.map(|(_, list)| list))
    }

    pub fn has(&self, word: &WordHash) -> IndexResult<bool> {
        let key = self.store_key(word)?;
        for partition in 0..self.config.partition_count() {
            if self.store.get(partition, &key)?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Unions `entries` into the list of `word` and returns its new length.
    ///
    /// Either the whole batch lands or the stored list is left as it was.
    pub fn merge(&self, word: &WordHash, entries: &PostingList) -> IndexResult<usize> {
        let key = self.store_key(word)?;
        let _guard = self.locks.lock(*word);

        let (home, mut list) = match self.locate(word, &key)? {
            Some((partition, list)) => (Some(partition), list),
            None => (None, PostingList::new(*word, &self.order)),
        };
        if entries.is_empty() {
            return Ok(list.len());
        }
        list.merge(entries);

        let target = self
            .config
            .partition_for(list.len())
            .ok_or_else(|| IndexError::CapacityExceeded {
                word: word.to_string(),
                entries: list.len(),
                max: self.config.max_entries(),
            })?;
        let bytes = list.encode_entries()?;

        self.store.put(target, &key, bytes)?;
        if let Some(old) = home.filter(|&p| p != target) {
            if let Err(err) = self.store.delete(old, &key) {
                self.undo_move(word, &key, target);
                return Err(err.into());
            }
            tracing::debug!(%word, from = old, to = target, "posting list moved partition");
        }
        tracing::debug!(%word, added = entries.len(), total = list.len(), "merged postings");
        Ok(list.len())
    }

    fn undo_move(&self, word: &WordHash, key: &[u8], target: PartitionId) {
        if let Err(err) = self.store.delete(target, key) {
            tracing::error!(%word, partition = target, %err, "could not roll back partition move");
        }
    }

    pub fn add(&self, word: &WordHash, entry: DocRef) -> IndexResult<usize> {
        let batch = PostingList::from_entries(*word, &self.order, [entry]);
        self.merge(word, &batch)
    }

    /// Deletes the given documents from the list of `word`. A list that ends
    /// up empty is removed together with its word.
    pub fn remove_entries(&self, word: &WordHash, urls: &HashSet<UrlHash>) -> IndexResult<usize> {
        let key = self.store_key(word)?;
        let _guard = self.locks.lock(*word);

        let Some((partition, mut list)) = self.locate(word, &key)? else {
            return Ok(0);
        };
        let removed = list.remove_all(urls);
        if removed == 0 {
            return Ok(0);
        }
        if list.is_empty() {
            self.store.delete(partition, &key)?;
        } else {
            self.store.put(partition, &key, list.encode_entries()?)?;
        }
        tracing::debug!(%word, removed, left = list.len(), "removed postings");
        Ok(removed)
    }

    pub fn delete(&self, word: &WordHash) -> IndexResult<Option<PostingList>> {
        let key = self.store_key(word)?;
        let _guard = self.locks.lock(*word);

        for partition in 0..self.config.partition_count() {
            if let Some(bytes) = self.store.delete(partition, &key)? {
                return Ok(Some(self.decode(*word, &bytes)?));
            }
        }
        Ok(None)
    }

    /// Number of distinct words in the index.
    pub fn size(&self) -> IndexResult<usize> {
        let first = WordHash::new(&self.order.key_from_ordinals(&[0; WORD_HASH_LENGTH]))?;
        let mut words = PostingIterator::open(self, first, false)?;
        let mut count = 0;
        while words.next_head()?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    pub fn partition_sizes(&self) -> IndexResult<Vec<usize>> {
        (0..self.config.partition_count())
            .map(|p| self.store.len(p).map_err(IndexError::from))
            .collect()
    }

    /// Memory needed to load and merge the largest list the index admits.
    pub fn min_mem(&self) -> usize {
        2 * self.config.max_entries() * std::mem::size_of::<DocRef>()
    }

    /// Lists in alphabet order from `start` (inclusive). With `wrap` the
    /// sequence continues at the smallest word and stops before `start`.
    pub fn iterate(&self, start: &WordHash, wrap: bool) -> IndexResult<PostingIterator<'_, S>> {
        PostingIterator::open(self, *start, wrap)
    }

    pub fn flush(&self) -> IndexResult<()> {
        Ok(self.store.flush()?)
    }
}

/// Lazy, single-pass walk over a posting index.
pub struct PostingIterator<'a, S> {
    index: &'a PostingIndex<S>,
    start: WordHash,
    wrap: bool,
    wrapped: bool,
    done: bool,
    scans: Vec<Scan<'a>>,
    heads: Vec<Option<(WordHash, Vec<u8>)>>,
}

impl<'a, S: PartitionStore> PostingIterator<'a, S> {
    fn open(index: &'a PostingIndex<S>, start: WordHash, wrap: bool) -> IndexResult<Self> {
        let mut iter = Self {
            index,
            start,
            wrap,
            wrapped: false,
            done: false,
            scans: Vec::new(),
            heads: Vec::new(),
        };
        let from = index.store_key(&start)?;
        iter.open_scans(&from)?;
        Ok(iter)
    }

    /// A fresh walk over the same index starting at `start`.
    pub fn restart_at(&self, start: &WordHash) -> IndexResult<PostingIterator<'a, S>> {
        Self::open(self.index, *start, self.wrap)
    }

    fn open_scans(&mut self, from: &[u8]) -> IndexResult<()> {
        let index = self.index;
        self.scans = (0..index.config.partition_count())
            .map(|p| index.store.scan(p, from))
            .collect::<Result<_, StoreError>>()?;
        self.heads = vec![None; self.scans.len()];
        for slot in 0..self.scans.len() {
            self.advance(slot)?;
        }
        Ok(())
    }

    fn advance(&mut self, slot: usize) -> IndexResult<()> {
        self.heads[slot] = match self.scans[slot].next().transpose()? {
            Some((key, value)) => {
                let symbols = self.index.order.key_from_ordinals(&key);
                Some((WordHash::new(&symbols)?, value))
            }
            None => None,
        };
        Ok(())
    }

    fn smallest_head(&self) -> Option<usize> {
        let order = &self.index.order;
        let mut best: Option<(usize, &WordHash)> = None;
        for (slot, head) in self.heads.iter().enumerate() {
            if let Some((word, _)) = head {
                let better = best.map_or(true, |(_, b)| {
                    order.compare(word.as_bytes(), b.as_bytes()) == Ordering::Less
                });
                if better {
                    best = Some((slot, word));
                }
            }
        }
        best.map(|(slot, _)| slot)
    }

    /// The next word with its stored bytes. A word found in several
    /// partitions comes out once, with the copy of the highest one.
    fn next_head(&mut self) -> IndexResult<Option<(WordHash, Vec<u8>)>> {
        loop {
            let Some(slot) = self.smallest_head() else {
                if self.wrap && !self.wrapped {
                    self.wrapped = true;
                    self.open_scans(&[])?;
                    continue;
                }
                return Ok(None);
            };
            let Some((word, mut bytes)) = self.heads[slot].take() else {
                return Ok(None);
            };
            if self.wrapped
                && self.index.order.compare(word.as_bytes(), self.start.as_bytes()) != Ordering::Less
            {
                return Ok(None);
            }
            self.advance(slot)?;
            // merge only grows lists, so the higher partition holds the newer copy
            for other in slot + 1..self.heads.len() {
                if !matches!(&self.heads[other], Some((w, _)) if *w == word) {
                    continue;
                }
                if let Some((_, newer)) = self.heads[other].take() {
                    bytes = newer;
                }
                self.advance(other)?;
            }
            return Ok(Some((word, bytes)));
        }
    }

    fn step(&mut self) -> IndexResult<Option<(WordHash, PostingList)>> {
        match self.next_head()? {
            Some((word, bytes)) => Ok(Some((word, self.index.decode(word, &bytes)?))),
            None => Ok(None),
        }
    }
}

impl<S: PartitionStore> Iterator for PostingIterator<'_, S> {
    type Item = IndexResult<(WordHash, PostingList)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
