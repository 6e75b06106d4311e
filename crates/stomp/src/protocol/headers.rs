//! Ordered STOMP header container.
//!
//! STOMP headers are an ordered list of `key:value` pairs in which a key may
//! repeat; the first occurrence wins on lookup. [`Headers`] keeps the raw
//! entries as a flat sequence of byte strings, read two at a time, so that
//! a sequence decoded from the wire can be checked for structural and
//! encoding problems instead of being rejected (or silently repaired) at
//! construction.
//!
//! Every combinator returns a new sequence and leaves its receiver untouched.

use std::fmt;

use bytes::Bytes;

use crate::ensure;
use crate::protocol::HeaderError;

pub const HK_ACCEPT_VERSION: &str = "accept-version";
pub const HK_CONTENT_LENGTH: &str = "content-length";
pub const HK_CONTENT_TYPE: &str = "content-type";
pub const HK_DESTINATION: &str = "destination";
pub const HK_HEART_BEAT: &str = "heart-beat";
pub const HK_HOST: &str = "host";
pub const HK_LOGIN: &str = "login";
pub const HK_MESSAGE: &str = "message";
pub const HK_PASSCODE: &str = "passcode";
pub const HK_PERSISTENT: &str = "persistent";
pub const HK_RECEIPT: &str = "receipt";
pub const HK_RECEIPT_ID: &str = "receipt-id";
pub const HK_SERVER: &str = "server";
pub const HK_SESSION: &str = "session";
pub const HK_VERSION: &str = "version";

/// An ordered sequence of header entries, interpreted as `(key, value)` pairs.
///
/// Equality is order sensitive: two sequences compare equal only when they
/// hold identical pairs in identical order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Headers {
    entries: Vec<Bytes>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a sequence from raw entries without pairing them up.
    ///
    /// An odd number of entries is accepted here and reported by [`Headers::validate`].
    pub fn from_raw<I, B>(entries: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self { entries: entries.into_iter().map(Into::into).collect() }
    }

    /// Number of raw entries, twice the pair count for a valid sequence.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn pair_count(&self) -> usize {
        self.entries.len() / 2
    }

    pub fn as_slice(&self) -> &[Bytes] {
        &self.entries
    }

    /// Iterates the complete pairs in order. A trailing unmatched entry is skipped.
    pub fn pairs(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.entries.chunks_exact(2).map(|pair| (pair[0].as_ref(), pair[1].as_ref()))
    }

    /// Checks that every key has a value.
    pub fn validate(&self) -> Result<(), HeaderError> {
        ensure!(self.entries.len() % 2 == 0, HeaderError::odd_length(self.entries.len()));
        Ok(())
    }

    /// Checks that every key and value is valid UTF-8 text.
    ///
    /// Returns the unchanged sequence on success so the check can be chained.
    pub fn validate_utf8(&self) -> Result<&Self, HeaderError> {
        for (index, entry) in self.entries.iter().enumerate() {
            if std::str::from_utf8(entry).is_err() {
                return Err(HeaderError::invalid_utf8(index, entry));
            }
        }
        Ok(self)
    }

    /// Returns the value of the first pair whose key matches.
    pub fn contains(&self, key: impl AsRef<[u8]>) -> Option<&[u8]> {
        let key = key.as_ref();
        self.pairs().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Like [`Headers::contains`], but yields `None` when the first matching
    /// value is not UTF-8.
    pub fn contains_str(&self, key: impl AsRef<[u8]>) -> Option<&str> {
        self.contains(key).and_then(|v| std::str::from_utf8(v).ok())
    }

    #[must_use]
    pub fn add(&self, key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        let mut entries = Vec::with_capacity(self.entries.len() + 2);
        entries.extend_from_slice(&self.entries);
        entries.push(key.into());
        entries.push(value.into());
        Self { entries }
    }

    #[must_use]
    pub fn add_headers(&self, other: &Headers) -> Self {
        let mut entries = Vec::with_capacity(self.entries.len() + other.entries.len());
        entries.extend_from_slice(&self.entries);
        entries.extend_from_slice(&other.entries);
        Self { entries }
    }

    /// Removes the first pair whose key matches; later duplicates are kept.
    #[must_use]
    pub fn delete(&self, key: impl AsRef<[u8]>) -> Self {
        let key = key.as_ref();
        let position = self.entries.chunks_exact(2).position(|pair| pair[0].as_ref() == key);

        match position {
            Some(pair_index) => {
                let start = pair_index * 2;
                let mut entries = Vec::with_capacity(self.entries.len() - 2);
                entries.extend_from_slice(&self.entries[..start]);
                entries.extend_from_slice(&self.entries[start + 2..]);
                Self { entries }
            }
            None => self.clone(),
        }
    }

    /// Order-sensitive comparison, identical to `==`.
    pub fn compare(&self, other: &Headers) -> bool {
        self == other
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<Bytes>,
    V: Into<Bytes>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let iter = iter.into_iter();
        let mut entries = Vec::with_capacity(iter.size_hint().0 * 2);
        for (key, value) in iter {
            entries.push(key.into());
            entries.push(value.into());
        }
        Self { entries }
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Headers
where
    K: Into<Bytes>,
    V: Into<Bytes>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (index, entry) in self.entries.iter().enumerate() {
            let separator = match index {
                0 => "",
                i if i % 2 == 1 => ":",
                _ => ", ",
            };
            write!(f, "{separator}{}", String::from_utf8_lossy(entry))?;
        }
        f.write_str("]")
    }
}
