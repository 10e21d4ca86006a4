//! Cryptographic primitives for Quill.
//!
//! Provides the domain-separated canonical content hasher (SHA-256 bound to
//! a freshness marker and optional secret), Argon2id password hashing,
//! Ed25519 payer keypairs for anchoring transactions, and the version
//! history audit.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod hasher;
pub mod history;
pub mod password;
pub mod signer;

pub use hasher::CanonicalHasher;
pub use history::{HistoryEntry, HistoryError, VersionHistoryVerifier};
pub use password::{hash_password, verify_password, PasswordError};
pub use signer::{KeypairError, PayerKeypair};
