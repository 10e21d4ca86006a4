use quill_crypto::HistoryEntry;
use quill_types::{
    AnchorReceipt, ContentHash, ContentPointer, Digest, DocumentId, DocumentStatus, Memo, OwnerId,
    Timestamp, VersionId, VersionNumber, VersionStage,
};
use serde::{Deserialize, Serialize};

/// A persisted document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub owner: OwnerId,
    pub name: String,
    /// Argon2id PHC string. Never serialized outward.
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub original_filename: String,
    pub mime_type: String,
    pub original_hash: Option<ContentHash>,
    pub original_content: Option<ContentPointer>,
    pub current_version: Option<VersionId>,
    pub status: DocumentStatus,
    pub required_signatures: u32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl DocumentRecord {
    pub fn is_password_protected(&self) -> bool {
        self.password_hash.is_some()
    }
}

/// A persisted version. Immutable once written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub id: VersionId,
    pub document_id: DocumentId,
    pub number: VersionNumber,
    pub stage: VersionStage,
    /// Cached at creation, never recomputed by the store.
    pub hash: ContentHash,
    pub content: ContentPointer,
    pub anchor: Option<AnchorReceipt>,
    pub created_by: OwnerId,
    pub created_at: Timestamp,
}

impl VersionRecord {
    pub fn tx_signature(&self) -> Option<&str> {
        self.anchor.as_ref().map(|a| a.tx_signature.as_str())
    }
}

impl HistoryEntry for VersionRecord {
    fn number(&self) -> u32 {
        self.number.get()
    }

    fn digest(&self) -> Digest {
        self.hash.digest
    }

    fn anchored_memo(&self) -> Option<Memo> {
        self.anchor.as_ref().map(|a| a.memo)
    }
}

/// Version payload supplied by the caller. The store assigns id, number
/// and timestamp.
#[derive(Clone, Debug)]
pub struct NewVersion {
    pub stage: VersionStage,
    pub hash: ContentHash,
    pub content: ContentPointer,
    pub anchor: Option<AnchorReceipt>,
    pub created_by: OwnerId,
}

/// A document together with its base version.
#[derive(Clone, Debug)]
pub struct NewDocument {
    pub owner: OwnerId,
    pub name: String,
    pub password_hash: Option<String>,
    pub original_filename: String,
    pub mime_type: String,
    pub original_hash: Option<ContentHash>,
    pub original_content: Option<ContentPointer>,
    pub status: DocumentStatus,
    pub required_signatures: u32,
    pub first_version: NewVersion,
}

/// Identifiers assigned by `create_document_with_version`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CreatedDocument {
    pub document_id: DocumentId,
    pub version_id: VersionId,
    pub number: VersionNumber,
}

/// Result of `add_version`: the assigned identifiers and the document
/// status after the append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppendedVersion {
    pub version_id: VersionId,
    pub number: VersionNumber,
    pub status: DocumentStatus,
}
