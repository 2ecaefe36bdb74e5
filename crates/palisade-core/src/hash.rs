use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PalisadeError, Result};

/// A 32-byte BLAKE3 hash of a chunk's plaintext bytes.
///
/// The lowercase hex form (64 chars) is the canonical key in the object
/// store and the `chunks.hash` column of the index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    /// Hash a plaintext buffer.
    pub fn of(data: &[u8]) -> Self {
        ContentHash(*blake3::hash(data).as_bytes())
    }

    /// Hex-encode the full hash for use as a storage key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse the canonical 64-char lowercase hex form.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|_| PalisadeError::InvalidHash(s.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| PalisadeError::InvalidHash(s.to_string()))?;
        Ok(ContentHash(bytes))
    }

    /// First byte as a two-char hex string, used for shard directories.
    pub fn shard_prefix(&self) -> String {
        hex::encode(&self.0[..1])
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn of_is_deterministic() {
        let a = ContentHash::of(b"hello world");
        let b = ContentHash::of(b"hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn different_data_different_hash() {
        assert_ne!(ContentHash::of(b"hello"), ContentHash::of(b"world"));
    }

    #[test]
    fn hex_roundtrip() {
        let h = ContentHash::of(b"roundtrip");
        let parsed = ContentHash::from_hex(&h.to_hex()).unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn hex_is_64_lowercase_chars() {
        let hx = ContentHash::of(b"x").to_hex();
        assert_eq!(hx.len(), 64);
        assert_eq!(hx, hx.to_lowercase());
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        assert!(ContentHash::from_hex("abcd").is_err());
    }

    #[test]
    fn from_hex_rejects_non_hex() {
        let s = "zz".repeat(32);
        assert!(ContentHash::from_hex(&s).is_err());
    }

    #[test]
    fn shard_prefix_is_first_byte() {
        let h = ContentHash([0xAB; 32]);
        assert_eq!(h.shard_prefix(), "ab");
    }

    #[test]
    fn empty_data_hashes() {
        let h = ContentHash::of(b"");
        assert_ne!(h.0, [0u8; 32]);
    }
}
