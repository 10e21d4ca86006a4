//! Version store for Quill.
//!
//! Persists documents and their append-only version history, and keeps the
//! raw bytes of every version in a content-addressed blob store.
//!
//! # Backends
//!
//! [`VersionStore`] implementations:
//!
//! - [`SqliteVersionStore`] -- SQLite database, safe across connections and
//!   processes
//! - [`InMemoryVersionStore`] -- lock-guarded maps for tests and embedding
//!
//! [`BlobStore`] implementations:
//!
//! - [`FsBlobStore`] -- fan-out directory tree on disk
//! - [`InMemoryBlobStore`] -- `HashMap`-based store
//!
//! # Design Rules
//!
//! 1. Version numbers start at 1, are contiguous, and are assigned only here.
//! 2. A document's current version is updated in the same transaction that
//!    appends the version.
//! 3. Versions are never mutated; their hashes are cached, never recomputed.
//! 4. Lifecycle status only moves forward.
//! 5. Blob reads verify bytes against their pointer.

pub mod error;
pub mod fs;
pub mod memory;
pub mod record;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsBlobStore;
pub use memory::{InMemoryBlobStore, InMemoryVersionStore};
pub use record::{
    AppendedVersion, CreatedDocument, DocumentRecord, NewDocument, NewVersion, VersionRecord,
};
pub use sqlite::SqliteVersionStore;
pub use traits::{BlobStore, VersionStore};
