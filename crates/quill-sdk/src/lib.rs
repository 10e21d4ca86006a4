//! Document lifecycle SDK for Quill.
//!
//! [`DocumentService`] is the entry point for applications: it ties the
//! canonical hasher, a [`LedgerAnchor`] and a [`VersionStore`] together into
//! the create, sign and verify operations, plus the single-shot and
//! create-then-sign-later flows built on them.
//!
//! Every operation follows the same order: validate input, read a freshness
//! marker, hash, anchor, then persist. A failure before anchoring leaves no
//! trace; a failure after anchoring is logged with the transaction
//! signature, since the ledger write cannot be undone.

pub mod config;
pub mod error;
pub mod request;
pub mod service;
pub mod session;

pub use config::ServiceConfig;
pub use error::{SdkError, SdkResult};
pub use request::{
    CreateRequest, CreateResponse, DocumentView, HistoryReport, ImmediateResponse, SignRequest,
    SignResponse, VerifyRequest, VerifyResponse,
};
pub use service::DocumentService;
pub use session::{SigningSession, WizardStep};

pub use quill_anchor::{InMemoryLedger, LedgerAnchor, LedgerConfig, RpcLedger};
pub use quill_crypto::CanonicalHasher;
pub use quill_store::{
    BlobStore, DocumentRecord, FsBlobStore, InMemoryBlobStore, InMemoryVersionStore,
    SqliteVersionStore, VersionRecord, VersionStore,
};
pub use quill_types::{
    ContentHash, DocumentId, DocumentStatus, OwnerId, VersionNumber, VersionStage,
};
