use quill_types::{ContentHash, Digest};
use sha2::{Digest as _, Sha256};

/// Domain-separated canonical hasher for document content.
///
/// The digest binds three inputs: the document bytes, a freshness marker
/// (the ledger block height at hashing time) and an optional secret (the
/// document password, empty meaning none). The same bytes hashed at two
/// different heights or under two different passwords yield different
/// digests.
///
/// Canonical serialization, fed to SHA-256:
///
/// ```text
/// domain ":" || u64be(len(content)) || content
///            || u64be(marker)
///            || u64be(len(secret))  || secret
/// ```
///
/// Every variable-length field is length-prefixed, so no two distinct input
/// triples share a serialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanonicalHasher {
    domain: &'static str,
}

impl CanonicalHasher {
    /// Hasher for document content at every lifecycle stage.
    pub const CONTENT: Self = Self {
        domain: "quill-content-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash document content bound to a freshness marker and secret.
    pub fn hash(&self, content: &[u8], marker: u64, secret: &str) -> ContentHash {
        ContentHash::new(
            self.digest(content, marker, secret),
            marker,
            !secret.is_empty(),
        )
    }

    /// The bare digest of [`Self::hash`].
    pub fn digest(&self, content: &[u8], marker: u64, secret: &str) -> Digest {
        let mut hasher = Sha256::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update((content.len() as u64).to_be_bytes());
        hasher.update(content);
        hasher.update(marker.to_be_bytes());
        hasher.update((secret.len() as u64).to_be_bytes());
        hasher.update(secret.as_bytes());
        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        Digest::from_bytes(out)
    }

    /// Recompute and compare against an expected digest.
    pub fn verify(&self, content: &[u8], marker: u64, secret: &str, expected: &Digest) -> bool {
        self.digest(content, marker, secret) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}
