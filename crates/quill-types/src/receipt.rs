use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;
use crate::hash::Digest;

/// Memo text carried by an anchoring transaction.
///
/// The wire form is the literal ASCII string `FILE_HASH=<64 lowercase hex>`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Memo {
    digest: Digest,
}

impl Memo {
    pub const PREFIX: &'static str = "FILE_HASH=";

    pub fn new(digest: Digest) -> Self {
        Self { digest }
    }

    /// The digest named by this memo.
    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    /// Parse memo text. Surrounding whitespace is tolerated because some
    /// ledger explorers pad memo strings; anything else must match exactly.
    pub fn parse(text: &str) -> Result<Self, TypeError> {
        let text = text.trim();
        let hex = text
            .strip_prefix(Self::PREFIX)
            .ok_or_else(|| TypeError::InvalidMemo(format!("missing {} prefix", Self::PREFIX)))?;
        let digest =
            Digest::from_hex(hex).map_err(|e| TypeError::InvalidMemo(e.to_string()))?;
        Ok(Self { digest })
    }
}

impl fmt::Debug for Memo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Memo({})", self.digest.short_hex())
    }
}

impl fmt::Display for Memo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::PREFIX, self.digest)
    }
}

impl FromStr for Memo {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Memo {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Memo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Evidence that a hash was recorded on the ledger.
///
/// Created once per version, never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorReceipt {
    /// Opaque ledger transaction signature.
    pub tx_signature: String,
    pub memo: Memo,
    /// Block height the anchored hash was bound to.
    pub freshness_marker: u64,
}

impl AnchorReceipt {
    pub fn new(tx_signature: impl Into<String>, memo: Memo, freshness_marker: u64) -> Self {
        Self {
            tx_signature: tx_signature.into(),
            memo,
            freshness_marker,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest() -> Digest {
        Digest::from_bytes([0xcd; 32])
    }

    #[test]
    fn memo_display_format() {
        let memo = Memo::new(digest());
        assert_eq!(memo.to_string(), format!("FILE_HASH={}", "cd".repeat(32)));
        assert_eq!(memo.to_string().len(), 10 + 64);
    }

    #[test]
    fn memo_parse_roundtrip() {
        let memo = Memo::new(digest());
        let parsed: Memo = memo.to_string().parse().unwrap();
        assert_eq!(parsed, memo);
    }

    #[test]
    fn memo_parse_tolerates_padding() {
        let text = format!("  FILE_HASH={}\n", "cd".repeat(32));
        assert_eq!(Memo::parse(&text).unwrap().digest(), &digest());
    }

    #[test]
    fn memo_parse_rejects_other_prefixes() {
        let text = format!("HASH={}", "cd".repeat(32));
        assert!(matches!(Memo::parse(&text), Err(TypeError::InvalidMemo(_))));
    }

    #[test]
    fn memo_parse_rejects_short_digest() {
        assert!(matches!(
            Memo::parse("FILE_HASH=abc"),
            Err(TypeError::InvalidMemo(_))
        ));
    }

    #[test]
    fn receipt_serde_uses_memo_text() {
        let receipt = AnchorReceipt::new("sig-1", Memo::new(digest()), 42);
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["memo"], format!("FILE_HASH={}", "cd".repeat(32)));
        let back: AnchorReceipt = serde_json::from_value(json).unwrap();
        assert_eq!(back, receipt);
    }
}
