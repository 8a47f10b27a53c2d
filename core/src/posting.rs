use std::cmp::Ordering;
use std::collections::HashSet;

use crate::hash::{UrlHash, WordHash};
use crate::order::{Base64Order, ByteOrder};
use crate::reference::DocRef;

/// All references of one word, unique by metadata hash and kept sorted by it,
/// always ascending whatever direction the caller's order runs.
#[derive(Debug, Clone)]
pub struct PostingList {
    word_hash: WordHash,
    entries: Vec<DocRef>,
    order: Base64Order,
}

impl PartialEq for PostingList {
    fn eq(&self, other: &Self) -> bool {
        self.word_hash == other.word_hash && self.entries == other.entries
    }
}

impl PostingList {
    pub fn new(word_hash: WordHash, order: &Base64Order) -> Self {
        Self {
            word_hash,
            entries: Vec::new(),
            order: order.canonical(),
        }
    }

    /// Later entries replace earlier ones with the same metadata hash.
    pub fn from_entries<I>(word_hash: WordHash, order: &Base64Order, entries: I) -> Self
    where
        I: IntoIterator<Item = DocRef>,
    {
        let mut list = Self::new(word_hash, order);
        for entry in entries {
            list.insert(entry);
        }
        list
    }

    pub fn word_hash(&self) -> WordHash {
        self.word_hash
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[DocRef] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DocRef> {
        self.entries.iter()
    }

    pub fn into_entries(self) -> Vec<DocRef> {
        self.entries
    }

    fn cmp_hash(&self, a: &UrlHash, b: &UrlHash) -> Ordering {
        self.order.compare(a.as_bytes(), b.as_bytes())
    }

    fn position(&self, url: &UrlHash) -> Result<usize, usize> {
        self.entries
            .binary_search_by(|e| self.cmp_hash(&e.metadata_hash, url))
    }

    pub fn get(&self, url: &UrlHash) -> Option<&DocRef> {
        self.position(url).ok().map(|i| &self.entries[i])
    }

    pub fn contains(&self, url: &UrlHash) -> bool {
        self.position(url).is_ok()
    }

    /// Inserts `entry`, returning the reference it replaced.
    pub fn insert(&mut self, entry: DocRef) -> Option<DocRef> {
        match self.position(&entry.metadata_hash) {
            Ok(i) => Some(std::mem::replace(&mut self.entries[i], entry)),
            Err(i) => {
                self.entries.insert(i, entry);
                None
            }
        }
    }

    /// Union with `other`; its entries win on equal metadata hash.
    pub fn merge(&mut self, other: &PostingList) {
        if other.is_empty() {
            return;
        }
        let mut merged = Vec::with_capacity(self.entries.len() + other.entries.len());
        let mut mine = std::mem::take(&mut self.entries).into_iter().peekable();
        let mut theirs = other.entries.iter().peekable();
        loop {
            let next = match (mine.peek(), theirs.peek()) {
                (Some(a), Some(b)) => self.cmp_hash(&a.metadata_hash, &b.metadata_hash),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => break,
            };
            match next {
                Ordering::Less => merged.extend(mine.next()),
                Ordering::Greater => merged.extend(theirs.next().cloned()),
                Ordering::Equal => {
                    mine.next();
                    merged.extend(theirs.next().cloned());
                }
            }
        }
        self.entries = merged;
    }

    pub fn remove(&mut self, url: &UrlHash) -> Option<DocRef> {
        self.position(url).ok().map(|i| self.entries.remove(i))
    }

    /// Removes every entry whose metadata hash is in `urls`; returns how many went.
    pub fn remove_all(&mut self, urls: &HashSet<UrlHash>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !urls.contains(&e.metadata_hash));
        before - self.entries.len()
    }

    /// Documents present in every list, with their occurrences combined.
    ///
    /// The result is sorted like a posting list. An empty slice joins to nothing.
    pub fn join(lists: &[PostingList]) -> Vec<DocRef> {
        let mut by_size: Vec<&PostingList> = lists.iter().collect();
        by_size.sort_by_key(|l| l.len());
        let Some((smallest, rest)) = by_size.split_first() else {
            return Vec::new();
        };
        smallest
            .iter()
            .filter_map(|entry| {
                rest.iter().try_fold(entry.clone(), |acc, list| {
                    list.get(&entry.metadata_hash).map(|other| acc.join(other))
                })
            })
            .collect()
    }

    pub(crate) fn encode_entries(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(&self.entries)
    }

    pub(crate) fn decode_entries(
        word_hash: WordHash,
        order: &Base64Order,
        bytes: &[u8],
    ) -> bincode::Result<Self> {
        let entries: Vec<DocRef> = bincode::deserialize(bytes)?;
        Ok(Self {
            word_hash,
            entries,
            order: order.canonical(),
        })
    }
}

impl<'a> IntoIterator for &'a PostingList {
    type Item = &'a DocRef;
    type IntoIter = std::slice::Iter<'a, DocRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::Flag;

    fn order() -> Base64Order {
        Base64Order::enhanced(true)
    }

    fn word() -> WordHash {
        WordHash::new(b"abcdefghijkl").unwrap()
    }

    fn doc(url: &str, hits: u32) -> DocRef {
        let mut r = DocRef::new(UrlHash::new(url.as_bytes()).unwrap());
        r.hit_count = hits;
        r
    }

    #[test]
    fn entries_stay_sorted_in_alphabet_order() {
        let list = PostingList::from_entries(
            word(),
            &order(),
            vec![doc("000000host01", 1), doc("zzzzzzhost01", 1), doc("AAAAAAhost01", 1)],
        );
        let hashes: Vec<&str> = list.iter().map(|e| e.metadata_hash.as_str()).collect();
        assert_eq!(hashes, vec!["AAAAAAhost01", "zzzzzzhost01", "000000host01"]);
    }

    #[test]
    fn insert_replaces_same_document() {
        let mut list = PostingList::new(word(), &order());
        assert!(list.insert(doc("AAAAAAhost01", 1)).is_none());
        let old = list.insert(doc("AAAAAAhost01", 5)).unwrap();
        assert_eq!(old.hit_count, 1);
        assert_eq!(list.len(), 1);
        assert_eq!(list.entries()[0].hit_count, 5);
    }

    #[test]
    fn merge_unions_and_prefers_new_entries() {
        let o = order();
        let mut list = PostingList::from_entries(word(), &o, vec![doc("AAAAAAhost01", 1), doc("CCCCCChost01", 1)]);
        let update = PostingList::from_entries(word(), &o, vec![doc("BBBBBBhost01", 2), doc("CCCCCChost01", 9)]);
        list.merge(&update);
        assert_eq!(list.len(), 3);
        assert_eq!(list.get(&"CCCCCChost01".parse().unwrap()).unwrap().hit_count, 9);
        let once = list.clone();
        list.merge(&update);
        assert_eq!(list, once);
    }

    #[test]
    fn descending_batches_merge_without_duplicates() {
        let mut list = PostingList::from_entries(word(), &order(), vec![doc("AAAAAAhost01", 1), doc("CCCCCChost01", 1)]);
        let descending = Base64Order::enhanced(false);
        let batch = PostingList::from_entries(
            word(),
            &descending,
            vec![doc("AAAAAAhost01", 4), doc("BBBBBBhost01", 2), doc("CCCCCChost01", 7)],
        );
        let hashes: Vec<&str> = batch.iter().map(|e| e.metadata_hash.as_str()).collect();
        assert_eq!(hashes, vec!["AAAAAAhost01", "BBBBBBhost01", "CCCCCChost01"]);
        list.merge(&batch);
        assert_eq!(list.len(), 3);
        assert_eq!(list.get(&"AAAAAAhost01".parse().unwrap()).unwrap().hit_count, 4);
        assert_eq!(list.get(&"CCCCCChost01".parse().unwrap()).unwrap().hit_count, 7);
    }

    #[test]
    fn remove_all_counts_only_present_entries() {
        let mut list = PostingList::from_entries(word(), &order(), vec![doc("AAAAAAhost01", 1), doc("BBBBBBhost01", 1)]);
        let gone: HashSet<UrlHash> = ["AAAAAAhost01", "ZZZZZZhost01"].iter().map(|s| s.parse().unwrap()).collect();
        assert_eq!(list.remove_all(&gone), 1);
        assert_eq!(list.len(), 1);
        assert!(list.remove(&"BBBBBBhost01".parse().unwrap()).is_some());
        assert!(list.is_empty());
    }

    #[test]
    fn join_keeps_documents_with_all_words() {
        let o = order();
        let w2 = WordHash::new(b"mnopqrstuvwx").unwrap();
        let mut titled = doc("BBBBBBhost01", 1);
        titled.flags.insert(Flag::InTitle);
        let a = PostingList::from_entries(word(), &o, vec![doc("AAAAAAhost01", 1), doc("BBBBBBhost01", 2)]);
        let b = PostingList::from_entries(w2, &o, vec![titled, doc("CCCCCChost01", 1)]);
        let joined = PostingList::join(&[a, b]);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].metadata_hash.as_str(), "BBBBBBhost01");
        assert_eq!(joined[0].hit_count, 3);
        assert!(joined[0].has(Flag::InTitle));
        assert!(PostingList::join(&[]).is_empty());
    }

    #[test]
    fn codec_round_trip_keeps_entries() {
        let o = order();
        let list = PostingList::from_entries(word(), &o, vec![doc("AAAAAAhost01", 3)]);
        let bytes = list.encode_entries().unwrap();
        let back = PostingList::decode_entries(word(), &o, &bytes).unwrap();
        assert_eq!(back, list);
    }
}
