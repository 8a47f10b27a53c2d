use std::collections::HashMap;

use crate::hash::HostHash;
use crate::reference::DocRef;

/// Numeric ranking features of one reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Features {
    pub term_frequency: f64,
    pub domain_length: u32,
    pub url_length: u32,
    pub url_components: u32,
    pub min_position: u32,
    pub max_position: u32,
    pub position_of_phrase: u32,
    pub position_in_phrase: u32,
    pub word_distance: u32,
    pub virtual_age: u32,
    pub words_in_title: u32,
    pub words_in_text: u32,
    pub phrases_in_text: u32,
    pub local_links: u32,
    pub other_links: u32,
    pub hit_count: u32,
}

impl Features {
    pub fn of(entry: &DocRef) -> Self {
        Self {
            term_frequency: entry.term_frequency,
            domain_length: entry.metadata_hash.dom_length_normalized() as u32,
            url_length: entry.url_length,
            url_components: entry.url_components,
            min_position: entry.min_position,
            max_position: entry.max_position,
            position_of_phrase: entry.position_of_phrase,
            position_in_phrase: entry.position_in_phrase,
            word_distance: entry.word_distance,
            virtual_age: entry.virtual_age,
            words_in_title: entry.words_in_title,
            words_in_text: entry.words_in_text,
            phrases_in_text: entry.phrases_in_text,
            local_links: entry.local_links,
            other_links: entry.other_links,
            hit_count: entry.hit_count,
        }
    }

    fn zip(&self, other: &Self, f: fn(u32, u32) -> u32, g: fn(f64, f64) -> f64) -> Self {
        Self {
            term_frequency: g(self.term_frequency, other.term_frequency),
            domain_length: f(self.domain_length, other.domain_length),
            url_length: f(self.url_length, other.url_length),
            url_components: f(self.url_components, other.url_components),
            min_position: f(self.min_position, other.min_position),
            max_position: f(self.max_position, other.max_position),
            position_of_phrase: f(self.position_of_phrase, other.position_of_phrase),
            position_in_phrase: f(self.position_in_phrase, other.position_in_phrase),
            word_distance: f(self.word_distance, other.word_distance),
            virtual_age: f(self.virtual_age, other.virtual_age),
            words_in_title: f(self.words_in_title, other.words_in_title),
            words_in_text: f(self.words_in_text, other.words_in_text),
            phrases_in_text: f(self.phrases_in_text, other.phrases_in_text),
            local_links: f(self.local_links, other.local_links),
            other_links: f(self.other_links, other.other_links),
            hit_count: f(self.hit_count, other.hit_count),
        }
    }

    pub fn min(&self, other: &Self) -> Self {
        self.zip(other, u32::min, f64::min)
    }

    pub fn max(&self, other: &Self) -> Self {
        self.zip(other, u32::max, f64::max)
    }
}

/// Feature-wise bounds and host frequencies of a candidate set.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    pub min: Features,
    pub max: Features,
    pub entries: usize,
    domain_counts: HashMap<HostHash, u32>,
}

impl Statistics {
    /// `None` for an empty candidate set.
    pub fn scan(entries: &[DocRef]) -> Option<Self> {
        let (first, rest) = entries.split_first()?;
        let features = Features::of(first);
        let mut stats = Self {
            min: features,
            max: features,
            entries: 1,
            domain_counts: HashMap::from([(first.metadata_hash.host(), 1)]),
        };
        for entry in rest {
            stats.absorb(entry);
        }
        Some(stats)
    }

    fn absorb(&mut self, entry: &DocRef) {
        let features = Features::of(entry);
        self.min = self.min.min(&features);
        self.max = self.max.max(&features);
        self.entries += 1;
        *self.domain_counts.entry(entry.metadata_hash.host()).or_insert(0) += 1;
    }

    /// Statistics of the union of both candidate sets.
    pub fn combine(mut self, other: Statistics) -> Self {
        self.min = self.min.min(&other.min);
        self.max = self.max.max(&other.max);
        self.entries += other.entries;
        for (host, count) in other.domain_counts {
            *self.domain_counts.entry(host).or_insert(0) += count;
        }
        self
    }

    pub fn domain_count(&self, host: &HostHash) -> u32 {
        self.domain_counts.get(host).copied().unwrap_or(0)
    }

    pub fn max_domain_count(&self) -> u32 {
        self.domain_counts.values().copied().max().unwrap_or(0)
    }

    /// Popularity of a host within the candidates, scaled below 256.
    pub fn authority(&self, host: &HostHash) -> u64 {
        ((self.domain_count(host) as u64) << 8) / (1 + self.max_domain_count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::UrlHash;

    fn doc(url: &str, tf: f64, hits: u32) -> DocRef {
        let mut r = DocRef::new(UrlHash::new(url.as_bytes()).unwrap());
        r.term_frequency = tf;
        r.hit_count = hits;
        r
    }

    #[test]
    fn empty_set_has_no_statistics() {
        assert!(Statistics::scan(&[]).is_none());
    }

    #[test]
    fn bounds_and_hosts_are_tracked() {
        let entries = vec![
            doc("AAAAAAhostAA", 0.5, 3),
            doc("BBBBBBhostAA", 0.1, 9),
            doc("CCCCCChostBB", 0.9, 1),
        ];
        let stats = Statistics::scan(&entries).unwrap();
        assert_eq!(stats.min.hit_count, 1);
        assert_eq!(stats.max.hit_count, 9);
        assert_eq!(stats.min.term_frequency, 0.1);
        assert_eq!(stats.max.term_frequency, 0.9);
        let host_a = entries[0].metadata_hash.host();
        assert_eq!(stats.domain_count(&host_a), 2);
        assert_eq!(stats.max_domain_count(), 2);
        assert_eq!(stats.authority(&host_a), (2 << 8) / 3);
    }

    #[test]
    fn combining_halves_matches_one_scan() {
        let entries: Vec<DocRef> = (0..10)
            .map(|i| doc(&format!("AAAAA{i}hostA{}", i % 3), i as f64 / 10.0, i * 7 % 5))
            .collect();
        let whole = Statistics::scan(&entries).unwrap();
        let (l, r) = entries.split_at(4);
        let parts = Statistics::scan(l)
            .unwrap()
            .combine(Statistics::scan(r).unwrap());
        assert_eq!(whole, parts);
    }
}
