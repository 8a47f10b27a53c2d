use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use crate::error::KeyError;

use super::{ByteOrder, LONG_MAX};

const STANDARD_SYMBOLS: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const ENHANCED_SYMBOLS: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Symbols that enter the ring position computation.
const CARDINAL_SYMBOLS: usize = 10;

/// Rank of the zero byte, below every alphabet symbol.
const TERMINATOR_RANK: u16 = 0;

/// A 64-symbol alphabet with its lookup tables in both directions.
///
/// Comparison never looks at raw byte values: every byte is mapped to a rank
/// first. Alphabet symbols rank `1..=64` in alphabet order, the zero byte ranks
/// below them and terminates a key, and any other byte ranks above all symbols
/// so that the order stays total over arbitrary input.
pub struct Alphabet {
    symbols: [u8; 64],
    ordinals: [i8; 256],
    ranks: [u16; 256],
    rfc1521: bool,
    malformed: AtomicU64,
}

impl Alphabet {
    fn build(symbols: &[u8; 64], rfc1521: bool) -> Self {
        let mut ordinals = [-1i8; 256];
        let mut ranks = [0u16; 256];
        for (b, rank) in ranks.iter_mut().enumerate() {
            *rank = 65 + b as u16;
        }
        ranks[0] = TERMINATOR_RANK;
        for (i, &s) in symbols.iter().enumerate() {
            ordinals[s as usize] = i as i8;
            ranks[s as usize] = i as u16 + 1;
        }
        Self {
            symbols: *symbols,
            ordinals,
            ranks,
            rfc1521,
            malformed: AtomicU64::new(0),
        }
    }

    /// RFC 1521 alphabet (`+/`), padded with `=`.
    pub fn standard() -> Self {
        Self::build(STANDARD_SYMBOLS, true)
    }

    /// File-name and URL safe alphabet (`-_`), never padded.
    pub fn enhanced() -> Self {
        Self::build(ENHANCED_SYMBOLS, false)
    }

    pub fn symbol(&self, ordinal: u8) -> u8 {
        self.symbols[(ordinal & 0x3f) as usize]
    }

    pub fn ordinal(&self, symbol: u8) -> Option<u8> {
        let o = self.ordinals[symbol as usize];
        (o >= 0).then_some(o as u8)
    }

    pub fn is_rfc1521(&self) -> bool {
        self.rfc1521
    }

    fn record_malformed(&self, key: &[u8], what: &'static str) {
        self.malformed.fetch_add(1, AtomicOrdering::Relaxed);
        tracing::warn!(key = %String::from_utf8_lossy(key), what, "malformed base64 input decoded as empty");
    }
}

impl fmt::Debug for Alphabet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Alphabet")
            .field("symbols", &String::from_utf8_lossy(&self.symbols))
            .field("rfc1521", &self.rfc1521)
            .finish()
    }
}

/// Base64 coder and comparator.
///
/// The alphabet tables are shared between clones. A clone carries its own copy
/// of the zero point, and [`Base64Order::rotate`] returns a new value rather
/// than moving the zero point of a comparator someone else may be using.
#[derive(Debug, Clone)]
pub struct Base64Order {
    alphabet: Arc<Alphabet>,
    ascending: bool,
    zero: Option<Box<[u8]>>,
}

/// Comparison key with its symbol ranks resolved up front, for scanning many
/// keys against one fixed boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPivot {
    key: Vec<u8>,
    ranks: Vec<u16>,
}

impl CompiledPivot {
    pub fn key(&self) -> &[u8] {
        &self.key
    }
}

impl Base64Order {
    pub fn new(alphabet: Arc<Alphabet>, ascending: bool) -> Self {
        Self {
            alphabet,
            ascending,
            zero: None,
        }
    }

    pub fn standard(ascending: bool) -> Self {
        Self::new(Arc::new(Alphabet::standard()), ascending)
    }

    pub fn enhanced(ascending: bool) -> Self {
        Self::new(Arc::new(Alphabet::enhanced()), ascending)
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// Same order starting its ring at `zero`.
    pub fn rotate(&self, zero: &[u8]) -> Self {
        Self {
            alphabet: Arc::clone(&self.alphabet),
            ascending: self.ascending,
            zero: Some(zero.into()),
        }
    }

    pub fn unrotated(&self) -> Self {
        Self {
            alphabet: Arc::clone(&self.alphabet),
            ascending: self.ascending,
            zero: None,
        }
    }

    /// Same alphabet, ascending and without a rotation zero.
    pub fn canonical(&self) -> Self {
        Self {
            alphabet: Arc::clone(&self.alphabet),
            ascending: true,
            zero: None,
        }
    }

    pub fn reversed(&self) -> Self {
        Self {
            alphabet: Arc::clone(&self.alphabet),
            ascending: !self.ascending,
            zero: self.zero.clone(),
        }
    }

    pub fn zero(&self) -> Option<&[u8]> {
        self.zero.as_deref()
    }

    /// Number of malformed inputs the permissive decoders have swallowed so far.
    pub fn malformed_count(&self) -> u64 {
        self.alphabet.malformed.load(AtomicOrdering::Relaxed)
    }

    /// Largest value `width` symbols can hold.
    pub fn max_for_width(width: usize) -> u64 {
        if width * 6 >= 64 {
            u64::MAX
        } else {
            (1u64 << (width * 6)) - 1
        }
    }

    /// Fixed-width encoding; only the low `6 * width` bits of `value` survive.
    pub fn encode_long(&self, value: u64, width: usize) -> String {
        let mut out = vec![0u8; width];
        let mut c = value;
        for slot in out.iter_mut().rev() {
            *slot = self.alphabet.symbol((c & 0x3f) as u8);
            c >>= 6;
        }
        // alphabet symbols are ASCII
        out.into_iter().map(char::from).collect()
    }

    /// Like [`encode_long`](Self::encode_long) but clamps to the largest
    /// representable value instead of dropping high bits.
    pub fn encode_long_smart(&self, value: u64, width: usize) -> String {
        self.encode_long(value.min(Self::max_for_width(width)), width)
    }

    pub fn try_decode_long(&self, symbols: &[u8]) -> Result<u64, KeyError> {
        let mut c = 0u64;
        for &s in symbols {
            let o = self
                .alphabet
                .ordinal(s)
                .ok_or_else(|| KeyError::malformed(symbols, "symbol outside alphabet"))?;
            c = (c << 6) | o as u64;
        }
        Ok(c)
    }

    /// Permissive decode: malformed input is logged, counted and read as 0.
    pub fn decode_long(&self, symbols: &[u8]) -> u64 {
        match self.try_decode_long(symbols) {
            Ok(v) => v,
            Err(_) => {
                self.alphabet.record_malformed(symbols, "long");
                0
            }
        }
    }

    /// 3 bytes to 4 symbols. Only the RFC 1521 alphabet pads with `=`.
    pub fn encode(&self, bytes: &[u8]) -> String {
        let a = &self.alphabet;
        let mut out = String::with_capacity((bytes.len() + 2) / 3 * 4);
        for chunk in bytes.chunks(3) {
            let b0 = chunk[0] as u32;
            let b1 = chunk.get(1).copied().unwrap_or(0) as u32;
            let b2 = chunk.get(2).copied().unwrap_or(0) as u32;
            let v = (b0 << 16) | (b1 << 8) | b2;
            out.push(a.symbol((v >> 18) as u8) as char);
            out.push(a.symbol((v >> 12) as u8) as char);
            if chunk.len() > 1 {
                out.push(a.symbol((v >> 6) as u8) as char);
            } else if a.rfc1521 {
                out.push('=');
            }
            if chunk.len() > 2 {
                out.push(a.symbol(v as u8) as char);
            } else if a.rfc1521 {
                out.push('=');
            }
        }
        out
    }

    pub fn encode_string(&self, text: &str) -> String {
        self.encode(text.as_bytes())
    }

    pub fn try_decode(&self, symbols: &[u8]) -> Result<Vec<u8>, KeyError> {
        let mut end = symbols.len();
        while end > 0 && symbols[end - 1] == b'=' {
            end -= 1;
        }
        let body = &symbols[..end];
        if body.len() % 4 == 1 {
            return Err(KeyError::malformed(symbols, "dangling symbol"));
        }
        let mut out = Vec::with_capacity(body.len() / 4 * 3 + 2);
        for group in body.chunks(4) {
            let mut v = 0u32;
            for &s in group {
                let o = self
                    .alphabet
                    .ordinal(s)
                    .ok_or_else(|| KeyError::malformed(symbols, "symbol outside alphabet"))?;
                v = (v << 6) | o as u32;
            }
            v <<= 6 * (4 - group.len() as u32);
            out.push((v >> 16) as u8);
            if group.len() > 2 {
                out.push((v >> 8) as u8);
            }
            if group.len() > 3 {
                out.push(v as u8);
            }
        }
        Ok(out)
    }

    /// Permissive decode: malformed input is logged, counted and read as empty.
    pub fn decode(&self, symbols: &[u8]) -> Vec<u8> {
        match self.try_decode(symbols) {
            Ok(v) => v,
            Err(_) => {
                self.alphabet.record_malformed(symbols, "bytes");
                Vec::new()
            }
        }
    }

    pub fn decode_string(&self, symbols: &[u8]) -> String {
        String::from_utf8_lossy(&self.decode(symbols)).into_owned()
    }

    /// Zero-terminated comparison of at most `bound` leading bytes, ascending.
    fn compare_bounded(&self, a: &[u8], b: &[u8], bound: usize) -> Ordering {
        let ranks = &self.alphabet.ranks;
        let al = a.len().min(bound);
        let bl = b.len().min(bound);
        for i in 0..al.min(bl) {
            let (ac, bc) = (a[i], b[i]);
            if ac == 0 && bc == 0 {
                return Ordering::Equal;
            }
            if ac == bc {
                continue;
            }
            return ranks[ac as usize].cmp(&ranks[bc as usize]);
        }
        if al < bl && b[al] == 0 {
            return Ordering::Equal;
        }
        if bl < al && a[bl] == 0 {
            return Ordering::Equal;
        }
        al.cmp(&bl)
    }

    fn at_or_after_zero(&self, key: &[u8], zero: &[u8]) -> bool {
        self.compare_bounded(key, zero, key.len().min(zero.len())) != Ordering::Less
    }

    fn compare_ascending(&self, a: &[u8], b: &[u8]) -> Ordering {
        if let Some(zero) = self.zero.as_deref() {
            match (self.at_or_after_zero(a, zero), self.at_or_after_zero(b, zero)) {
                (true, false) => return Ordering::Less,
                (false, true) => return Ordering::Greater,
                _ => {}
            }
        }
        self.compare_bounded(a, b, usize::MAX)
    }

    pub fn compile_pivot(&self, key: &[u8]) -> CompiledPivot {
        let end = key.iter().position(|&b| b == 0).unwrap_or(key.len());
        let ranks = key[..end]
            .iter()
            .map(|&b| self.alphabet.ranks[b as usize])
            .collect();
        CompiledPivot {
            key: key.to_vec(),
            ranks,
        }
    }

    /// Same result as `compare(pivot.key(), b)`.
    pub fn compare_pivot(&self, pivot: &CompiledPivot, b: &[u8]) -> Ordering {
        if self.zero.is_some() {
            return self.compare(&pivot.key, b);
        }
        let ranks = &self.alphabet.ranks;
        let p = &pivot.ranks;
        let len = p.len().min(b.len());
        let mut ord = Ordering::Equal;
        for i in 0..len {
            let br = ranks[b[i] as usize];
            if p[i] != br {
                ord = p[i].cmp(&br);
                break;
            }
        }
        if ord == Ordering::Equal {
            ord = if p.len() < b.len() {
                if b[p.len()] == 0 {
                    Ordering::Equal
                } else {
                    Ordering::Less
                }
            } else {
                p.len().cmp(&b.len())
            };
        }
        if self.ascending {
            ord
        } else {
            ord.reverse()
        }
    }

    /// Key rewritten as symbol ordinals, whose plain byte order is this
    /// alphabet's ascending order.
    pub fn ordinal_key(&self, key: &[u8]) -> Result<Vec<u8>, KeyError> {
        key.iter()
            .map(|&s| {
                self.alphabet
                    .ordinal(s)
                    .ok_or_else(|| KeyError::malformed(key, "symbol outside alphabet"))
            })
            .collect()
    }

    pub fn key_from_ordinals(&self, ordinals: &[u8]) -> Vec<u8> {
        ordinals.iter().map(|&o| self.alphabet.symbol(o)).collect()
    }

    fn cardinal_unrotated(&self, key: &[u8]) -> u64 {
        let mut c = 0u64;
        let mut terminated = false;
        for p in 0..CARDINAL_SYMBOLS {
            let b = if terminated { 0 } else { key.get(p).copied().unwrap_or(0) };
            terminated = b == 0;
            let o = self.alphabet.ordinal(b).unwrap_or(0);
            c = (c << 6) | o as u64;
        }
        c << 3
    }

    /// Canonical 10-symbol key at ring position `position`.
    pub fn uncardinal(&self, position: u64) -> Vec<u8> {
        let raw = match self.zero.as_deref() {
            None => position,
            Some(zero) => {
                let z = self.cardinal_unrotated(zero);
                if position >= LONG_MAX {
                    (LONG_MAX + z).saturating_sub(position)
                } else {
                    position + z
                }
            }
        };
        let mut c = raw >> 3;
        let mut out = vec![0u8; CARDINAL_SYMBOLS];
        for slot in out.iter_mut().rev() {
            *slot = self.alphabet.symbol((c & 0x3f) as u8);
            c >>= 6;
        }
        out
    }
}

impl ByteOrder for Base64Order {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        if self.ascending {
            self.compare_ascending(a, b)
        } else {
            self.compare_ascending(b, a)
        }
    }

    fn wellformed(&self, key: &[u8]) -> bool {
        key.iter().all(|&b| self.alphabet.ordinal(b).is_some())
    }

    fn cardinal(&self, key: &[u8]) -> u64 {
        let k = self.cardinal_unrotated(key);
        match self.zero.as_deref() {
            None => k,
            Some(zero) => {
                let z = self.cardinal_unrotated(zero);
                if k > z {
                    k - z
                } else {
                    LONG_MAX - k + z
                }
            }
        }
    }

    fn is_ascending(&self) -> bool {
        self.ascending
    }
}
