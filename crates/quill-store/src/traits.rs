use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use quill_types::{ContentPointer, DocumentId, DocumentStatus, VersionNumber};

use crate::error::StoreResult;
use crate::record::{
    AppendedVersion, CreatedDocument, DocumentRecord, NewDocument, NewVersion, VersionRecord,
};

/// Append-only document version history.
///
/// All implementations must satisfy these invariants:
/// - Version numbers start at [`VersionNumber::BASE`], are contiguous, and
///   unique per document, even under concurrent appends.
/// - The document's current version always names the highest-numbered
///   version once a write commits.
/// - Versions are never mutated or deleted.
/// - Status changes only move the lifecycle forward.
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Insert a document and its base version atomically and point the
    /// document at it. A second document with the same owner and name is a
    /// [`Conflict`](crate::StoreError::Conflict).
    async fn create_document_with_version(&self, doc: NewDocument) -> StoreResult<CreatedDocument>;

    /// Append a version numbered one past the current maximum and repoint
    /// the current version, in a single write transaction.
    ///
    /// Appending a signed version requires a document that accepts
    /// signatures and advances its status to `PartiallySigned` or
    /// `Completed` depending on how many signed versions it now holds.
    async fn add_version(
        &self,
        document_id: &DocumentId,
        version: NewVersion,
    ) -> StoreResult<AppendedVersion>;

    async fn get_document(&self, document_id: &DocumentId) -> StoreResult<DocumentRecord>;

    async fn get_version(
        &self,
        document_id: &DocumentId,
        number: VersionNumber,
    ) -> StoreResult<VersionRecord>;

    async fn get_current_version(&self, document_id: &DocumentId) -> StoreResult<VersionRecord>;

    /// All versions of a document ordered by number.
    async fn list_versions(&self, document_id: &DocumentId) -> StoreResult<Vec<VersionRecord>>;

    /// Apply a lifecycle transition atomically.
    async fn update_status(
        &self,
        document_id: &DocumentId,
        next: DocumentStatus,
    ) -> StoreResult<DocumentRecord>;

    /// The version anchored by `tx_signature`, if any.
    async fn find_version_by_tx(&self, tx_signature: &str) -> StoreResult<Option<VersionRecord>>;
}

#[async_trait]
impl<T: VersionStore + ?Sized> VersionStore for Arc<T> {
    async fn create_document_with_version(&self, doc: NewDocument) -> StoreResult<CreatedDocument> {
        (**self).create_document_with_version(doc).await
    }

    async fn add_version(
        &self,
        document_id: &DocumentId,
        version: NewVersion,
    ) -> StoreResult<AppendedVersion> {
        (**self).add_version(document_id, version).await
    }

    async fn get_document(&self, document_id: &DocumentId) -> StoreResult<DocumentRecord> {
        (**self).get_document(document_id).await
    }

    async fn get_version(
        &self,
        document_id: &DocumentId,
        number: VersionNumber,
    ) -> StoreResult<VersionRecord> {
        (**self).get_version(document_id, number).await
    }

    async fn get_current_version(&self, document_id: &DocumentId) -> StoreResult<VersionRecord> {
        (**self).get_current_version(document_id).await
    }

    async fn list_versions(&self, document_id: &DocumentId) -> StoreResult<Vec<VersionRecord>> {
        (**self).list_versions(document_id).await
    }

    async fn update_status(
        &self,
        document_id: &DocumentId,
        next: DocumentStatus,
    ) -> StoreResult<DocumentRecord> {
        (**self).update_status(document_id, next).await
    }

    async fn find_version_by_tx(&self, tx_signature: &str) -> StoreResult<Option<VersionRecord>> {
        (**self).find_version_by_tx(tx_signature).await
    }
}

/// Content-addressed store for raw document bytes.
///
/// - Writing identical bytes twice is a no-op returning the same pointer.
/// - Reads verify the bytes against their pointer.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes and return their pointer.
    async fn put(&self, data: Bytes) -> StoreResult<ContentPointer>;

    /// Read bytes by pointer. Returns `Ok(None)` if absent.
    async fn get(&self, pointer: &ContentPointer) -> StoreResult<Option<Vec<u8>>>;
}

#[async_trait]
impl<T: BlobStore + ?Sized> BlobStore for Arc<T> {
    async fn put(&self, data: Bytes) -> StoreResult<ContentPointer> {
        (**self).put(data).await
    }

    async fn get(&self, pointer: &ContentPointer) -> StoreResult<Option<Vec<u8>>> {
        (**self).get(pointer).await
    }
}
