//! Fixed-length keys: word hashes and document (URL) hashes.
//!
//! Both are 12 symbols of the enhanced alphabet. A URL hash is laid out as
//! five symbols of URL hash, one flag symbol and six symbols of host hash:
//!
//! ```text
//!  0 1 2 3 4 | 5    | 6 7 8 9 10 11
//!  url part  | flag | host
//! ```
//!
//! The flag symbol keeps the host-length class in its low three bits and the
//! root-path marker in bit 3.

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::error::KeyError;
use crate::order::Base64Order;

pub const WORD_HASH_LENGTH: usize = 12;
pub const URL_HASH_LENGTH: usize = 12;
pub const HOST_HASH_LENGTH: usize = 6;

const FLAG_POSITION: usize = 5;
const ROOT_PATH_BIT: u8 = 0b1000;
const HOST_CLASS_MASK: u8 = 0b0111;

/// Hash identifying the host part of a document.
pub type HostHash = [u8; HOST_HASH_LENGTH];

lazy_static! {
    /// Every key is spelled in the enhanced alphabet, whatever order a caller sorts with.
    static ref KEY_ORDER: Base64Order = Base64Order::enhanced(true);
}

fn check_key<const N: usize>(bytes: &[u8]) -> Result<[u8; N], KeyError> {
    if bytes.len() != N {
        return Err(KeyError::Length {
            key: String::from_utf8_lossy(bytes).into_owned(),
            expected: N,
            actual: bytes.len(),
        });
    }
    if !bytes.iter().all(|&b| KEY_ORDER.alphabet().ordinal(b).is_some()) {
        return Err(KeyError::malformed(bytes, "symbol outside enhanced alphabet"));
    }
    let mut key = [0u8; N];
    key.copy_from_slice(bytes);
    Ok(key)
}

fn digest_symbols(input: &[u8]) -> String {
    KEY_ORDER.encode(&Sha1::digest(input))
}

/// Key of a normalised search term.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WordHash([u8; WORD_HASH_LENGTH]);

impl WordHash {
    pub fn new(bytes: &[u8]) -> Result<Self, KeyError> {
        check_key(bytes).map(Self)
    }

    /// Hash of a word, lowercased first.
    pub fn of_word(word: &str) -> Self {
        let symbols = digest_symbols(word.to_lowercase().as_bytes());
        let mut key = [0u8; WORD_HASH_LENGTH];
        key.copy_from_slice(&symbols.as_bytes()[..WORD_HASH_LENGTH]);
        Self(key)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // enhanced symbols are ASCII
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl FromStr for WordHash {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.as_bytes())
    }
}

impl fmt::Display for WordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for WordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WordHash({})", self.as_str())
    }
}

/// Key of an indexed document; the trailing six symbols identify its host.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UrlHash([u8; URL_HASH_LENGTH]);

impl UrlHash {
    pub fn new(bytes: &[u8]) -> Result<Self, KeyError> {
        check_key(bytes).map(Self)
    }

    pub fn compose(url: &str) -> Self {
        let (host, path) = split_url(url);
        let url_part = digest_symbols(url.as_bytes());
        let host_part = digest_symbols(host.to_lowercase().as_bytes());

        let host_class = (host.len() / 4).min(HOST_CLASS_MASK as usize) as u8;
        let mut flag = host_class;
        if path.is_empty() || path == "/" {
            flag |= ROOT_PATH_BIT;
        }

        let mut key = [0u8; URL_HASH_LENGTH];
        key[..FLAG_POSITION].copy_from_slice(&url_part.as_bytes()[..FLAG_POSITION]);
        key[FLAG_POSITION] = KEY_ORDER.alphabet().symbol(flag);
        key[FLAG_POSITION + 1..].copy_from_slice(&host_part.as_bytes()[..HOST_HASH_LENGTH]);
        Self(key)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    pub fn host(&self) -> HostHash {
        let mut host = [0u8; HOST_HASH_LENGTH];
        host.copy_from_slice(&self.0[URL_HASH_LENGTH - HOST_HASH_LENGTH..]);
        host
    }

    fn flag(&self) -> u8 {
        KEY_ORDER.alphabet().ordinal(self.0[FLAG_POSITION]).unwrap_or(0)
    }

    /// Host length estimate scaled to `0..=255`; shorter hosts give smaller values.
    pub fn dom_length_normalized(&self) -> u64 {
        let class = (self.flag() & HOST_CLASS_MASK) as u64;
        class * 255 / HOST_CLASS_MASK as u64
    }

    /// Whether the document is most likely the start page of its host.
    pub fn probably_root_url(&self) -> bool {
        self.flag() & ROOT_PATH_BIT != 0
    }
}

impl FromStr for UrlHash {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.as_bytes())
    }
}

impl fmt::Display for UrlHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for UrlHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UrlHash({})", self.as_str())
    }
}

/// Splits `scheme://host:port/path?query` into host and path.
fn split_url(url: &str) -> (&str, &str) {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    let (authority, path) = match rest.find(|c: char| matches!(c, '/' | '?' | '#')) {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, ""),
    };
    let host = authority
        .rsplit_once('@')
        .map(|(_, h)| h)
        .unwrap_or(authority);
    let host = host.split(':').next().unwrap_or(host);
    (host, path)
}
