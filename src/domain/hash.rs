//! Content hashes and hash-stamped filenames
//!
//! Filename format: `{name}.{hash}{ext}` (e.g., `bundle.7f2b4c1d.js`).
//!
//! The hash is the leading hex digits of the blake3 digest of the artifact
//! bytes, so two artifacts share a filename exactly when their bytes match.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default number of hex characters kept from the digest
pub const DEFAULT_HASH_LENGTH: usize = 8;

const MIN_HASH_LENGTH: usize = 4;
const MAX_HASH_LENGTH: usize = 64;

#[derive(Debug, Error, PartialEq)]
pub enum HashError {
    #[error("Invalid content hash: expected 4-64 lowercase hex chars, got '{0}'")]
    InvalidHash(String),

    #[error("Invalid hash length {0}: must be between 4 and 64")]
    InvalidLength(usize),
}

/// Short hex digest of a file's content
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash {
    hex: String,
}

impl ContentHash {
    /// Hashes `bytes`, keeping `length` hex characters
    pub fn of(bytes: &[u8], length: usize) -> Result<Self, HashError> {
        validate_length(length)?;
        let digest = blake3::hash(bytes);
        let hex = digest.to_hex();
        Ok(Self {
            hex: hex[..length].to_string(),
        })
    }

    /// Hashes `bytes` with the default length
    pub fn of_default(bytes: &[u8]) -> Self {
        let digest = blake3::hash(bytes);
        Self {
            hex: digest.to_hex()[..DEFAULT_HASH_LENGTH].to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.hex
    }

    /// Builds `{name}.{hash}{ext}`; `ext` includes its leading dot
    pub fn stamp(&self, name: &str, ext: &str) -> String {
        format!("{}.{}{}", name, self.hex, ext)
    }
}

/// Checks a configured hash length
pub fn validate_length(length: usize) -> Result<(), HashError> {
    if (MIN_HASH_LENGTH..=MAX_HASH_LENGTH).contains(&length) {
        Ok(())
    } else {
        Err(HashError::InvalidLength(length))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}

impl FromStr for ContentHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let valid_len = (MIN_HASH_LENGTH..=MAX_HASH_LENGTH).contains(&s.len());
        if !valid_len || !s.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')) {
            return Err(HashError::InvalidHash(s.to_string()));
        }

        Ok(Self { hex: s.to_string() })
    }
}

impl TryFrom<String> for ContentHash {
    type Error = HashError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.hex
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_length_is_eight() {
        let hash = ContentHash::of_default(b"console.log(1)");
        assert_eq!(hash.as_str().len(), 8);
        assert!(hash.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn configurable_length() {
        let hash = ContentHash::of(b"body{}", 12).unwrap();
        assert_eq!(hash.as_str().len(), 12);
        assert!(ContentHash::of(b"body{}", 2).is_err());
        assert!(ContentHash::of(b"body{}", 65).is_err());
    }

    #[test]
    fn stamp_format() {
        let hash: ContentHash = "deadbeef".parse().unwrap();
        assert_eq!(hash.stamp("bundle", ".js"), "bundle.deadbeef.js");
        assert_eq!(hash.stamp("style", ".css"), "style.deadbeef.css");
    }

    #[test]
    fn rejects_uppercase_and_non_hex() {
        assert!("DEADBEEF".parse::<ContentHash>().is_err());
        assert!("xyz12345".parse::<ContentHash>().is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let hash = ContentHash::of_default(b"abc");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash));
        let parsed: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, hash);
    }

    proptest! {
        #[test]
        fn hash_changes_iff_content_changes(a in proptest::collection::vec(any::<u8>(), 0..256),
                                            b in proptest::collection::vec(any::<u8>(), 0..256)) {
            let ha = ContentHash::of(&a, 16).unwrap();
            let hb = ContentHash::of(&b, 16).unwrap();
            prop_assert_eq!(a == b, ha == hb);
        }
    }
}
