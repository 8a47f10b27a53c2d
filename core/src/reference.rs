use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::hash::UrlHash;

/// Properties of a word occurrence that ranking can reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    InDescription,
    InTitle,
    InCreator,
    InSubject,
    /// The word is part of the document URL.
    InUrl,
    Emphasized,
    /// The document is a directory listing.
    IndexOf,
    HasImage,
    HasAudio,
    HasVideo,
    HasApp,
}

impl Flag {
    pub const ALL: [Flag; 11] = [
        Flag::InDescription,
        Flag::InTitle,
        Flag::InCreator,
        Flag::InSubject,
        Flag::InUrl,
        Flag::Emphasized,
        Flag::IndexOf,
        Flag::HasImage,
        Flag::HasAudio,
        Flag::HasVideo,
        Flag::HasApp,
    ];

    fn mask(self) -> u16 {
        1 << self as u16
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlagSet(u16);

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, flag: Flag) -> bool {
        self.0 & flag.mask() != 0
    }

    pub fn insert(&mut self, flag: Flag) {
        self.0 |= flag.mask();
    }

    pub fn remove(&mut self, flag: Flag) {
        self.0 &= !flag.mask();
    }

    pub fn with(mut self, flag: Flag) -> Self {
        self.insert(flag);
        self
    }

    pub fn union(self, other: FlagSet) -> Self {
        Self(self.0 | other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Flag> + '_ {
        Flag::ALL.into_iter().filter(|f| self.contains(*f))
    }
}

impl FromIterator<Flag> for FlagSet {
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        iter.into_iter().fold(FlagSet::new(), FlagSet::with)
    }
}

/// One occurrence record of a word in a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocRef {
    pub metadata_hash: UrlHash,
    pub term_frequency: f64,
    pub url_length: u32,
    pub url_components: u32,
    /// Earliest word offset of the term in the text.
    pub min_position: u32,
    /// Latest word offset of the term in the text.
    pub max_position: u32,
    pub position_of_phrase: u32,
    pub position_in_phrase: u32,
    pub word_distance: u32,
    /// Days since the Unix epoch of the last modification.
    pub virtual_age: u32,
    pub words_in_title: u32,
    pub words_in_text: u32,
    pub phrases_in_text: u32,
    pub local_links: u32,
    pub other_links: u32,
    pub hit_count: u32,
    pub language: [u8; 2],
    pub flags: FlagSet,
}

impl DocRef {
    pub fn new(metadata_hash: UrlHash) -> Self {
        Self {
            metadata_hash,
            term_frequency: 0.0,
            url_length: 0,
            url_components: 0,
            min_position: 0,
            max_position: 0,
            position_of_phrase: 0,
            position_in_phrase: 0,
            word_distance: 0,
            virtual_age: 0,
            words_in_title: 0,
            words_in_text: 0,
            phrases_in_text: 0,
            local_links: 0,
            other_links: 0,
            hit_count: 0,
            language: *b"en",
            flags: FlagSet::new(),
        }
    }

    pub fn language(&self) -> &str {
        std::str::from_utf8(&self.language).unwrap_or("")
    }

    /// Two-letter code; anything shorter or non-ASCII is stored as `"  "`.
    pub fn set_language(&mut self, code: &str) {
        let bytes = code.as_bytes();
        self.language = match bytes {
            [a, b, ..] if a.is_ascii() && b.is_ascii() => [a.to_ascii_lowercase(), b.to_ascii_lowercase()],
            _ => *b"  ",
        };
    }

    pub fn has(&self, flag: Flag) -> bool {
        self.flags.contains(flag)
    }

    /// Combines the occurrences of two different words in the same document.
    pub fn join(&self, other: &DocRef) -> DocRef {
        debug_assert_eq!(self.metadata_hash, other.metadata_hash);
        let spread = self.min_position.abs_diff(other.min_position);
        DocRef {
            metadata_hash: self.metadata_hash,
            term_frequency: self.term_frequency + other.term_frequency,
            url_length: self.url_length,
            url_components: self.url_components,
            min_position: self.min_position.min(other.min_position),
            max_position: self.max_position.max(other.max_position),
            position_of_phrase: self.position_of_phrase.min(other.position_of_phrase),
            position_in_phrase: self.position_in_phrase.min(other.position_in_phrase),
            word_distance: self
                .word_distance
                .saturating_add(other.word_distance)
                .saturating_add(spread),
            virtual_age: self.virtual_age.max(other.virtual_age),
            words_in_title: self.words_in_title,
            words_in_text: self.words_in_text,
            phrases_in_text: self.phrases_in_text,
            local_links: self.local_links,
            other_links: self.other_links,
            hit_count: self.hit_count.saturating_add(other.hit_count),
            language: self.language,
            flags: self.flags.union(other.flags),
        }
    }
}

/// Recency ordinal of a modification date: whole days since the Unix epoch.
pub fn virtual_age(modified: OffsetDateTime) -> u32 {
    let days = (modified - OffsetDateTime::UNIX_EPOCH).whole_days();
    days.clamp(0, u32::MAX as i64) as u32
}
