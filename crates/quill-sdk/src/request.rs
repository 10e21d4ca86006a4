use bytes::Bytes;
use quill_store::{DocumentRecord, VersionRecord};
use quill_types::{DocumentId, DocumentStatus, VersionNumber};
use serde::Serialize;

use crate::config::ServiceConfig;
use crate::error::{SdkError, SdkResult};

/// Input to `DocumentService::create`.
#[derive(Clone, Debug, Default)]
pub struct CreateRequest {
    pub name: String,
    /// Document password. Empty means none.
    pub password: Option<String>,
    pub original_filename: String,
    pub mime_type: String,
    pub original_document: Bytes,
    pub unsigned_document: Bytes,
    /// Signatures needed before the document is completed.
    pub required_signatures: Option<u32>,
}

impl CreateRequest {
    pub fn new(name: impl Into<String>, filename: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            original_filename: filename.into(),
            mime_type: mime_type.into(),
            ..Default::default()
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Use the same bytes as original and unsigned document.
    pub fn with_document(mut self, bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        self.original_document = bytes.clone();
        self.unsigned_document = bytes;
        self
    }

    pub fn with_documents(mut self, original: impl Into<Bytes>, unsigned: impl Into<Bytes>) -> Self {
        self.original_document = original.into();
        self.unsigned_document = unsigned.into();
        self
    }

    pub fn with_required_signatures(mut self, n: u32) -> Self {
        self.required_signatures = Some(n);
        self
    }

    /// The password to bind into hashes, or `""` for none.
    pub fn secret(&self) -> &str {
        self.password.as_deref().unwrap_or("")
    }

    pub fn validate(&self, config: &ServiceConfig) -> SdkResult<()> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(SdkError::validation("name", "is required"));
        }
        if name.chars().count() > config.max_name_len {
            return Err(SdkError::validation(
                "name",
                format!("must be at most {} characters", config.max_name_len),
            ));
        }
        if self.original_filename.trim().is_empty() {
            return Err(SdkError::validation("original_filename", "is required"));
        }
        if !config.allows_mime_type(&self.mime_type) {
            return Err(SdkError::validation(
                "mime_type",
                format!("{:?} is not an accepted document type", self.mime_type),
            ));
        }
        validate_document("original_document", &self.original_document, config)?;
        validate_document("unsigned_document", &self.unsigned_document, config)?;
        if self.required_signatures == Some(0) {
            return Err(SdkError::validation("required_signatures", "must be at least 1"));
        }
        Ok(())
    }
}

/// Input to `DocumentService::sign`.
#[derive(Clone, Debug)]
pub struct SignRequest {
    pub document_id: DocumentId,
    /// The previous version's content with the signature overlay applied.
    pub signed_document: Bytes,
    /// Required when the document is password protected.
    pub password: Option<String>,
}

impl SignRequest {
    pub fn new(document_id: DocumentId, signed_document: impl Into<Bytes>) -> Self {
        Self {
            document_id,
            signed_document: signed_document.into(),
            password: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn validate(&self, config: &ServiceConfig) -> SdkResult<()> {
        validate_document("signed_document", &self.signed_document, config)
    }
}

/// Input to `DocumentService::verify`.
#[derive(Clone, Debug)]
pub struct VerifyRequest {
    pub tx_signature: String,
    pub candidate: Bytes,
    /// The marker the anchored hash was bound to. When absent it is read
    /// from the version recorded for the transaction.
    pub freshness_marker: Option<u64>,
    pub password: Option<String>,
}

impl VerifyRequest {
    pub fn new(
        tx_signature: impl Into<String>,
        candidate: impl Into<Bytes>,
        freshness_marker: Option<u64>,
    ) -> Self {
        Self {
            tx_signature: tx_signature.into(),
            candidate: candidate.into(),
            freshness_marker,
            password: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn validate(&self, config: &ServiceConfig) -> SdkResult<()> {
        if self.tx_signature.trim().is_empty() {
            return Err(SdkError::validation("tx_signature", "is required"));
        }
        validate_document("candidate", &self.candidate, config)
    }
}

fn validate_document(field: &'static str, bytes: &Bytes, config: &ServiceConfig) -> SdkResult<()> {
    if bytes.is_empty() {
        return Err(SdkError::validation(field, "file is missing or empty"));
    }
    if bytes.len() > config.max_document_bytes {
        return Err(SdkError::validation(
            field,
            format!("exceeds the {} byte limit", config.max_document_bytes),
        ));
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CreateResponse {
    pub id: DocumentId,
    pub version: VersionNumber,
    pub tx_signature: String,
    /// Lowercase hex digest of the unsigned document.
    pub unsigned_hash: String,
    /// Marker needed to verify the unsigned document later.
    pub freshness_marker: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SignResponse {
    pub document_id: DocumentId,
    pub version: VersionNumber,
    pub tx_signature: String,
    pub signed_hash: String,
    pub freshness_marker: u64,
    pub status: DocumentStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VerifyResponse {
    pub matches: bool,
    /// Digest named by the ledger memo.
    pub anchored_hash: String,
    /// Digest recomputed from the candidate.
    pub computed_hash: String,
}

/// Result of the single-shot create-and-sign flow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImmediateResponse {
    pub created: CreateResponse,
    pub signed: SignResponse,
}

/// A document with its current version.
#[derive(Clone, Debug, Serialize)]
pub struct DocumentView {
    pub document: DocumentRecord,
    pub current: VersionRecord,
}

/// A document's full version history and its audit result.
#[derive(Clone, Debug, Serialize)]
pub struct HistoryReport {
    pub document: DocumentRecord,
    pub versions: Vec<VersionRecord>,
    pub anchored: usize,
    /// Whether the history passed the audit.
    pub intact: bool,
    /// What the audit found, if it failed.
    pub problem: Option<String>,
}
