use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Content-addressed pointer to raw document bytes in a blob store.
///
/// The pointer is the BLAKE3 hash of the bytes, so storing identical content
/// twice yields the same pointer. This is a storage address only; it is not
/// the canonical hash that gets anchored on the ledger.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentPointer([u8; 32]);

impl ContentPointer {
    const SCHEME: &'static str = "blob:";

    /// Compute the pointer for raw bytes.
    pub fn for_content(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Create from a pre-computed hash.
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded hash without the scheme.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Returns `true` if `data` hashes to this pointer.
    pub fn matches(&self, data: &[u8]) -> bool {
        Self::for_content(data) == *self
    }

    /// Parse `blob:<64 hex>`.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let hex_part = s
            .strip_prefix(Self::SCHEME)
            .ok_or_else(|| TypeError::InvalidPointer(s.to_string()))?;
        let bytes = hex::decode(hex_part).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for ContentPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentPointer({})", self.short_hex())
    }
}

impl fmt::Display for ContentPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::SCHEME, self.to_hex())
    }
}

impl FromStr for ContentPointer {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ContentPointer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ContentPointer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_is_deterministic() {
        assert_eq!(
            ContentPointer::for_content(b"pdf bytes"),
            ContentPointer::for_content(b"pdf bytes")
        );
        assert_ne!(
            ContentPointer::for_content(b"a"),
            ContentPointer::for_content(b"b")
        );
    }

    #[test]
    fn display_has_scheme() {
        let p = ContentPointer::for_content(b"x");
        let s = p.to_string();
        assert!(s.starts_with("blob:"));
        assert_eq!(s.len(), 5 + 64);
        assert_eq!(s.parse::<ContentPointer>().unwrap(), p);
    }

    #[test]
    fn parse_requires_scheme() {
        let hex = ContentPointer::for_content(b"x").to_hex();
        assert!(matches!(
            ContentPointer::parse(&hex),
            Err(TypeError::InvalidPointer(_))
        ));
    }

    #[test]
    fn matches_checks_content() {
        let p = ContentPointer::for_content(b"original");
        assert!(p.matches(b"original"));
        assert!(!p.matches(b"tampered"));
    }
}
