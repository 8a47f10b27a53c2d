use thiserror::Error;

/// A key that does not fit the alphabet or the fixed key layout.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("malformed key {key:?}: {reason}")]
    Malformed { key: String, reason: &'static str },

    #[error("key {key:?} has length {actual}, expected {expected}")]
    Length {
        key: String,
        expected: usize,
        actual: usize,
    },
}

impl KeyError {
    pub(crate) fn malformed(key: &[u8], reason: &'static str) -> Self {
        KeyError::Malformed {
            key: String::from_utf8_lossy(key).into_owned(),
            reason,
        }
    }
}

/// Failure reported by a partition store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by the posting index.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error(transparent)]
    MalformedKey(#[from] KeyError),

    #[error("posting list for {word} would hold {entries} entries, partition bound is {max}")]
    CapacityExceeded {
        word: String,
        entries: usize,
        max: usize,
    },

    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] StoreError),

    #[error("posting list codec error: {0}")]
    Codec(#[from] bincode::Error),
}

impl IndexError {
    /// Whether retrying the same operation later could succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(self, IndexError::StorageUnavailable(_))
    }

    /// Short text suitable for a search front-end.
    pub fn user_message(&self) -> &'static str {
        match self {
            IndexError::StorageUnavailable(_) | IndexError::Codec(_) => {
                "index temporarily unavailable"
            }
            IndexError::MalformedKey(_) => "term not found",
            IndexError::CapacityExceeded { .. } => "index temporarily unavailable",
        }
    }
}

/// Errors from the ranking normalizer.
#[derive(Error, Debug)]
pub enum RankingError {
    #[error("min/max worker failed: {0}")]
    WorkerFailed(String),
}

/// A ranking profile string that cannot be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    #[error("coefficient {name} has non-numeric value {value:?}")]
    InvalidCoefficient { name: String, value: String },
}

pub type IndexResult<T> = std::result::Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_error_names_the_word() {
        let err = IndexError::CapacityExceeded {
            word: "abcdefghijkl".into(),
            entries: 70,
            max: 64,
        };
        let text = err.to_string();
        assert!(text.contains("abcdefghijkl"));
        assert!(text.contains("64"));
        assert!(!err.is_retriable());
    }

    #[test]
    fn storage_errors_are_retriable() {
        let err = IndexError::from(StoreError::Unavailable("disk gone".into()));
        assert!(err.is_retriable());
        assert_eq!(err.user_message(), "index temporarily unavailable");
    }

    #[test]
    fn malformed_key_renders_lossily() {
        let err = KeyError::malformed(b"ab\xffcd", "symbol outside alphabet");
        assert!(err.to_string().contains("symbol outside alphabet"));
    }
}
