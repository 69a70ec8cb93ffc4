//! Stable hashing helpers for cache fingerprints ("cachetags").

use blake3::Hasher;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn to_hex(&self) -> String {
        // blake3 hex(32b) is 64 hex chars
        let mut s = String::with_capacity(64);
        for b in &self.0 {
            use std::fmt::Write as _;
            let _ = write!(&mut s, "{:02x}", b);
        }
        s
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

pub fn hash_bytes(bytes: &[u8]) -> Hash256 {
    let mut h = Hasher::new();
    h.update(bytes);
    let out = h.finalize();
    Hash256(out.into())
}

pub fn hash_str(s: &str) -> Hash256 {
    hash_bytes(s.as_bytes())
}

/// Hash any serde-serializable value deterministically (via JSON).
/// NOTE: JSON drops float bit patterns (NaN); use `Fingerprint::value` for rows.
pub fn hash_serde<T: Serialize>(v: &T) -> Result<Hash256> {
    let bytes = serde_json::to_vec(v).map_err(|e| Error::Hash(e.to_string()))?;
    Ok(hash_bytes(&bytes))
}

/// Incremental builder for composite fingerprints.
///
/// Every part is length-prefixed so `("ab", "c")` and `("a", "bc")` differ.
///
/// ```
/// use tabflow_core::hash::Fingerprint;
/// let a = Fingerprint::new("sort").str("key=foo").finish();
/// let b = Fingerprint::new("sort").str("key=bar").finish();
/// assert_ne!(a, b);
/// ```
pub struct Fingerprint {
    hasher: Hasher,
}

impl Fingerprint {
    pub fn new(domain: &str) -> Self {
        let mut fp = Self {
            hasher: Hasher::new(),
        };
        fp.part(domain.as_bytes());
        fp
    }

    fn part(&mut self, bytes: &[u8]) {
        self.hasher.update(&(bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
    }

    pub fn bytes(mut self, bytes: &[u8]) -> Self {
        self.part(bytes);
        self
    }

    pub fn str(self, s: &str) -> Self {
        self.bytes(s.as_bytes())
    }

    pub fn tag(self, tag: Hash256) -> Self {
        self.bytes(&tag.0)
    }

    pub fn u64(self, v: u64) -> Self {
        self.bytes(&v.to_le_bytes())
    }

    pub fn flag(self, v: bool) -> Self {
        self.bytes(&[v as u8])
    }

    pub fn serde<T: Serialize>(self, v: &T) -> Result<Self> {
        let bytes = serde_json::to_vec(v)?;
        Ok(self.bytes(&bytes))
    }

    /// Binary-exact encoding of a value (floats keep their bit pattern).
    pub fn value(self, v: &Value) -> Result<Self> {
        let bytes = postcard::to_allocvec(v).map_err(|e| Error::Hash(format!("postcard: {e}")))?;
        Ok(self.bytes(&bytes))
    }

    pub fn finish(self) -> Hash256 {
        Hash256(self.hasher.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_are_length_prefixed() {
        let a = Fingerprint::new("t").str("ab").str("c").finish();
        let b = Fingerprint::new("t").str("a").str("bc").finish();
        assert_ne!(a, b);
    }

    #[test]
    fn hex_is_64_chars() {
        assert_eq!(hash_str("x").to_hex().len(), 64);
    }
}
