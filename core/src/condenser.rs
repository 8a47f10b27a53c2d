//! Text condensation for ingestion: tokens, phrases and per-word statistics.

use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use unicode_normalization::UnicodeNormalization;
use std::collections::{BTreeMap, HashSet};

use crate::hash::UrlHash;
use crate::reference::{DocRef, Flag};

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*").expect("valid regex");
    static ref PHRASE_END: Regex = Regex::new(r"[.!?;:]+(\s|$)|\n\s*\n").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

fn normalize(text: &str) -> String {
    text.nfkc().collect::<String>().to_lowercase()
}

/// Tokenize text into (term, position) using NFKC normalization, lowercase, stopword removal, and stemming.
///
/// Positions count stopwords too, so they stay word offsets into the text.
pub fn tokenize(text: &str) -> Vec<(String, usize)> {
    let normalized = normalize(text);
    let mut tokens = Vec::new();
    for (pos, mat) in RE.find_iter(&normalized).enumerate() {
        let token = mat.as_str();
        if is_stopword(token) { continue; }
        let stem = STEMMER.stem(token).to_string();
        tokens.push((stem, pos));
    }
    tokens
}

/// Stemmed form of a single query word, or `None` for stopwords and non-words.
pub fn query_term(word: &str) -> Option<String> {
    tokenize(word).into_iter().next().map(|(term, _)| term)
}

/// Occurrences of one term within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordStats {
    pub hits: u32,
    pub first_position: u32,
    pub last_position: u32,
    /// Phrase number of the first occurrence, counted from 1.
    pub first_phrase: u32,
    /// Word offset inside that phrase.
    pub position_in_phrase: u32,
    pub in_title: bool,
}

impl WordStats {
    fn at(position: u32, phrase: u32, position_in_phrase: u32) -> Self {
        Self {
            hits: 0,
            first_position: position,
            last_position: position,
            first_phrase: phrase,
            position_in_phrase,
            in_title: false,
        }
    }
}

/// A document reduced to the statistics the posting lists carry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Condensed {
    pub words: BTreeMap<String, WordStats>,
    pub words_in_title: u32,
    pub words_in_text: u32,
    pub phrases_in_text: u32,
}

impl Condensed {
    pub fn new(title: &str, body: &str) -> Self {
        let mut condensed = Condensed::default();
        let normalized = normalize(body);
        let mut position = 0u32;
        let mut start = 0;
        let mut ends: Vec<usize> = PHRASE_END.find_iter(&normalized).map(|m| m.end()).collect();
        ends.push(normalized.len());
        for end in ends {
            let phrase = &normalized[start..end];
            start = end;
            let mut in_phrase = 0u32;
            for mat in RE.find_iter(phrase) {
                let token = mat.as_str();
                let here = position;
                position += 1;
                in_phrase += 1;
                if is_stopword(token) {
                    continue;
                }
                let phrase_number = condensed.phrases_in_text + 1;
                let stem = STEMMER.stem(token).to_string();
                let stats = condensed
                    .words
                    .entry(stem)
                    .or_insert_with(|| WordStats::at(here, phrase_number, in_phrase - 1));
                stats.hits += 1;
                stats.last_position = here;
            }
            if in_phrase > 0 {
                condensed.phrases_in_text += 1;
            }
        }
        condensed.words_in_text = position;

        let title_tokens = tokenize(title);
        condensed.words_in_title = title_tokens.len() as u32;
        // title-only words are placed just past the body, in a phrase of their own
        let after_body = (condensed.words_in_text, condensed.phrases_in_text + 1);
        for (stem, pos) in title_tokens {
            let stats = condensed
                .words
                .entry(stem)
                .or_insert_with(|| WordStats::at(after_body.0, after_body.1, pos as u32));
            stats.hits += 1;
            stats.in_title = true;
        }
        condensed
    }

    pub fn get(&self, term: &str) -> Option<&WordStats> {
        self.words.get(term)
    }

    /// Reference of `term` in the document identified by `url`; document-level
    /// attributes (links, age, language, URL shape) are left for the caller.
    pub fn reference(&self, term: &str, url: UrlHash) -> Option<DocRef> {
        let stats = self.words.get(term)?;
        let mut entry = DocRef::new(url);
        let total = (self.words_in_text + self.words_in_title).max(1);
        entry.term_frequency = stats.hits as f64 / total as f64;
        entry.min_position = stats.first_position;
        entry.max_position = stats.last_position;
        entry.position_of_phrase = stats.first_phrase;
        entry.position_in_phrase = stats.position_in_phrase;
        entry.words_in_title = self.words_in_title;
        entry.words_in_text = self.words_in_text;
        entry.phrases_in_text = self.phrases_in_text;
        entry.hit_count = stats.hits;
        if stats.in_title {
            entry.flags.insert(Flag::InTitle);
        }
        Some(entry)
    }
}
