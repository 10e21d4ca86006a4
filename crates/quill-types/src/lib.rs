//! Foundation types for Quill.
//!
//! This crate provides the identifiers and value objects shared by every
//! other Quill crate: the document integrity core (hasher, anchor client,
//! version store, orchestrator) speaks in these types.
//!
//! # Key Types
//!
//! - [`DocumentId`] / [`VersionId`] -- UUID v7 identifiers
//! - [`Digest`] / [`ContentHash`] -- canonical SHA-256 digest and its inputs
//! - [`Memo`] -- the `FILE_HASH=<hex>` ledger payload
//! - [`AnchorReceipt`] -- evidence that a hash was recorded on the ledger
//! - [`ContentPointer`] -- content-addressed location of raw document bytes
//! - [`DocumentStatus`] -- monotonic lifecycle state machine
//! - [`VersionNumber`] -- contiguous per-document version counter

pub mod error;
pub mod hash;
pub mod ids;
pub mod object;
pub mod receipt;
pub mod status;
pub mod version;

pub use error::TypeError;
pub use hash::{ContentHash, Digest};
pub use ids::{DocumentId, OwnerId, SessionId, VersionId};
pub use object::ContentPointer;
pub use receipt::{AnchorReceipt, Memo};
pub use status::{DocumentStatus, VersionStage};
pub use version::VersionNumber;

/// UTC timestamp type used on persisted records.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
