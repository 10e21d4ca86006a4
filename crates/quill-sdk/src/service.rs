use bytes::Bytes;
use quill_anchor::{AnchorError, LedgerAnchor};
use quill_crypto::{hash_password, verify_password, CanonicalHasher, VersionHistoryVerifier};
use quill_store::{BlobStore, NewDocument, NewVersion, VersionStore};
use quill_types::{
    AnchorReceipt, ContentHash, DocumentId, DocumentStatus, Memo, OwnerId, VersionNumber,
    VersionStage,
};
use tracing::{debug, info, instrument, warn};

use crate::config::ServiceConfig;
use crate::error::{SdkError, SdkResult};
use crate::request::{
    CreateRequest, CreateResponse, DocumentView, HistoryReport, ImmediateResponse, SignRequest,
    SignResponse, VerifyRequest, VerifyResponse,
};
use crate::session::SigningSession;

/// Document lifecycle orchestrator.
///
/// Sequences the hasher, the ledger anchor and the version store into the
/// create, sign and verify operations. No transaction spans the ledger and
/// the store, so the ordering is the consistency policy: nothing is
/// persisted unless its hash was anchored first.
pub struct DocumentService<L, S, B> {
    ledger: L,
    store: S,
    blobs: B,
    hasher: CanonicalHasher,
    config: ServiceConfig,
}

impl<L, S, B> DocumentService<L, S, B>
where
    L: LedgerAnchor,
    S: VersionStore,
    B: BlobStore,
{
    pub fn new(ledger: L, store: S, blobs: B, config: ServiceConfig) -> Self {
        Self {
            ledger,
            store,
            blobs,
            hasher: CanonicalHasher::CONTENT,
            config,
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    // ---- Create ----

    /// Create a document: hash the unsigned content bound to a fresh
    /// marker, anchor it, then persist the document and its base version.
    #[instrument(skip_all, fields(owner = %owner, name = %request.name))]
    pub async fn create(&self, owner: &OwnerId, request: CreateRequest) -> SdkResult<CreateResponse> {
        request.validate(&self.config)?;
        let secret = request.secret().to_owned();
        let password_hash = self.protect_password(&secret).await?;

        let marker = self
            .ledger
            .freshness_marker()
            .await
            .map_err(SdkError::network("reading freshness marker"))?;
        debug!(marker, "freshness marker read");

        let (original_hash, unsigned_hash) = self
            .hash_pair(
                request.original_document.clone(),
                request.unsigned_document.clone(),
                marker,
                &secret,
            )
            .await?;

        let memo = Memo::new(unsigned_hash.digest);
        let tx_signature = self
            .ledger
            .anchor(&memo)
            .await
            .map_err(SdkError::anchor("anchoring unsigned document"))?;
        debug!(%tx_signature, "unsigned document anchored");

        let persisted = self
            .persist_document(owner, request, password_hash, original_hash, unsigned_hash, memo, &tx_signature)
            .await;
        let created = persisted.inspect_err(|e| {
            warn!(%tx_signature, error = %e, "anchor recorded but document was not persisted");
        })?;

        info!(document = %created.document_id, %tx_signature, "document created");
        Ok(CreateResponse {
            id: created.document_id,
            version: created.number,
            tx_signature,
            unsigned_hash: unsigned_hash.to_hex(),
            freshness_marker: marker,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn persist_document(
        &self,
        owner: &OwnerId,
        request: CreateRequest,
        password_hash: Option<String>,
        original_hash: ContentHash,
        unsigned_hash: ContentHash,
        memo: Memo,
        tx_signature: &str,
    ) -> SdkResult<quill_store::CreatedDocument> {
        let original_content = self
            .blobs
            .put(request.original_document.clone())
            .await
            .map_err(SdkError::store("storing original document"))?;
        let unsigned_content = self
            .blobs
            .put(request.unsigned_document.clone())
            .await
            .map_err(SdkError::store("storing unsigned document"))?;

        let document = NewDocument {
            owner: owner.clone(),
            name: request.name.trim().to_owned(),
            password_hash,
            original_filename: request.original_filename,
            mime_type: request.mime_type.trim().to_ascii_lowercase(),
            original_hash: Some(original_hash),
            original_content: Some(original_content),
            status: DocumentStatus::AwaitingSignatures,
            required_signatures: request
                .required_signatures
                .unwrap_or(self.config.default_required_signatures)
                .max(1),
            first_version: NewVersion {
                stage: VersionStage::Unsigned,
                hash: unsigned_hash,
                content: unsigned_content,
                anchor: Some(AnchorReceipt::new(tx_signature, memo, unsigned_hash.freshness_marker)),
                created_by: owner.clone(),
            },
        };

        self.store
            .create_document_with_version(document)
            .await
            .map_err(SdkError::store("persisting document"))
    }

    // ---- Sign ----

    /// Append a signed version: hash the final signed bytes, anchor, then
    /// persist. The document completes once it holds as many signed
    /// versions as it requires.
    #[instrument(skip_all, fields(signer = %signer, document = %request.document_id))]
    pub async fn sign(&self, signer: &OwnerId, request: SignRequest) -> SdkResult<SignResponse> {
        request.validate(&self.config)?;

        let document = self
            .store
            .get_document(&request.document_id)
            .await
            .map_err(SdkError::store("loading document"))?;
        if !document.status.accepts_signatures() {
            return Err(SdkError::InvalidState(format!(
                "document {} is {} and accepts no signatures",
                document.id, document.status
            )));
        }
        let secret = self
            .unlock(document.password_hash.as_deref(), request.password.as_deref())
            .await?;

        let marker = self
            .ledger
            .freshness_marker()
            .await
            .map_err(SdkError::network("reading freshness marker"))?;
        let signed_hash = self
            .hash_one(request.signed_document.clone(), marker, &secret)
            .await?;

        let memo = Memo::new(signed_hash.digest);
        let tx_signature = self
            .ledger
            .anchor(&memo)
            .await
            .map_err(SdkError::anchor("anchoring signed document"))?;
        debug!(%tx_signature, "signed document anchored");

        let persisted = self
            .persist_signature(signer, &request, signed_hash, memo, &tx_signature)
            .await;
        let appended = persisted.inspect_err(|e| {
            warn!(%tx_signature, error = %e, "anchor recorded but signed version was not persisted");
        })?;

        info!(version = %appended.number, status = %appended.status, %tx_signature, "document signed");
        Ok(SignResponse {
            document_id: request.document_id,
            version: appended.number,
            tx_signature,
            signed_hash: signed_hash.to_hex(),
            freshness_marker: marker,
            status: appended.status,
        })
    }

    async fn persist_signature(
        &self,
        signer: &OwnerId,
        request: &SignRequest,
        signed_hash: ContentHash,
        memo: Memo,
        tx_signature: &str,
    ) -> SdkResult<quill_store::AppendedVersion> {
        let content = self
            .blobs
            .put(request.signed_document.clone())
            .await
            .map_err(SdkError::store("storing signed document"))?;
        let version = NewVersion {
            stage: VersionStage::Signed,
            hash: signed_hash,
            content,
            anchor: Some(AnchorReceipt::new(tx_signature, memo, signed_hash.freshness_marker)),
            created_by: signer.clone(),
        };
        self.store
            .add_version(&request.document_id, version)
            .await
            .map_err(SdkError::store("appending signed version"))
    }

    // ---- Verify ----

    /// Check a candidate file against the hash anchored by a transaction.
    ///
    /// The anchored hash comes from the ledger, never from the store. A
    /// request without a marker takes it from the version recorded for the
    /// transaction. A mismatch is a normal outcome, not an error.
    #[instrument(skip_all, fields(tx_signature = %request.tx_signature, marker = request.freshness_marker))]
    pub async fn verify(&self, request: VerifyRequest) -> SdkResult<VerifyResponse> {
        request.validate(&self.config)?;
        let tx_signature = request.tx_signature.trim();

        let memo = match self.ledger.memo_for(tx_signature).await {
            Ok(Some(memo)) => memo,
            Ok(None) => {
                return Err(SdkError::NotFound(format!("transaction {tx_signature}")));
            }
            Err(AnchorError::MemoMissing(_) | AnchorError::FailedTransaction(_)) => {
                return Err(SdkError::NotFound(format!(
                    "anchored hash in transaction {tx_signature}"
                )));
            }
            Err(e) => return Err(SdkError::network("reading anchored memo")(e)),
        };

        let marker = match request.freshness_marker {
            Some(marker) => marker,
            None => self.recorded_marker(tx_signature).await?,
        };

        let secret = request.password.clone().unwrap_or_default();
        let computed = self
            .hash_one(request.candidate.clone(), marker, &secret)
            .await?;
        let matches = digests_equal(computed.digest.as_bytes(), memo.digest().as_bytes());

        info!(matches, "candidate verified");
        Ok(VerifyResponse {
            matches,
            anchored_hash: memo.digest().to_hex(),
            computed_hash: computed.to_hex(),
        })
    }

    /// Verify a candidate against a stored version, looking up the version's
    /// transaction and marker. The comparison still uses the ledger memo.
    pub async fn verify_version(
        &self,
        document_id: &DocumentId,
        number: VersionNumber,
        candidate: Bytes,
        password: Option<String>,
    ) -> SdkResult<VerifyResponse> {
        let version = self
            .store
            .get_version(document_id, number)
            .await
            .map_err(SdkError::store("loading version"))?;
        let anchor = version.anchor.ok_or_else(|| {
            SdkError::InvalidState(format!("version {number} of {document_id} was never anchored"))
        })?;

        let mut request = VerifyRequest::new(anchor.tx_signature, candidate, Some(version.hash.freshness_marker));
        request.password = password;
        self.verify(request).await
    }

    async fn recorded_marker(&self, tx_signature: &str) -> SdkResult<u64> {
        let version = self
            .store
            .find_version_by_tx(tx_signature)
            .await
            .map_err(SdkError::store("finding anchored version"))?
            .ok_or_else(|| {
                SdkError::NotFound(format!("freshness marker for transaction {tx_signature}"))
            })?;
        debug!(document = %version.document_id, version = %version.number, "marker recovered from store");
        Ok(version.hash.freshness_marker)
    }

    // ---- Entry points ----

    /// Single-shot flow: create the document and apply its only signature.
    /// A document that needs more than one signature cannot use it.
    #[instrument(skip_all, fields(owner = %owner, name = %request.name))]
    pub async fn create_and_sign_immediately(
        &self,
        owner: &OwnerId,
        request: CreateRequest,
        signed_document: impl Into<Bytes>,
    ) -> SdkResult<ImmediateResponse> {
        if let Some(required) = request.required_signatures.filter(|&n| n != 1) {
            return Err(SdkError::validation(
                "required_signatures",
                format!("must be 1 when signing immediately, got {required}"),
            ));
        }
        let password = request.password.clone();
        let request = CreateRequest {
            required_signatures: Some(1),
            ..request
        };
        let created = self.create(owner, request).await?;

        let mut sign = SignRequest::new(created.id, signed_document);
        sign.password = password;
        let signed = self.sign(owner, sign).await?;
        Ok(ImmediateResponse { created, signed })
    }

    /// Start a create-then-sign-later wizard for `owner`.
    pub fn begin_session(&self, owner: OwnerId) -> SigningSession {
        SigningSession::new(owner, self.config.session_ttl())
    }

    /// Wizard flow, first half: create the document staged in the session.
    pub async fn create_then_sign_later(
        &self,
        session: &mut SigningSession,
    ) -> SdkResult<CreateResponse> {
        let request = session.take_staged()?;
        let owner = session.owner().clone();
        match self.create(&owner, request.clone()).await {
            Ok(created) => {
                session.mark_created(created.clone());
                Ok(created)
            }
            Err(e) => {
                session.restore_staged(request);
                Err(e)
            }
        }
    }

    /// Wizard flow, second half: sign the document the session created.
    pub async fn sign_in_session(
        &self,
        session: &mut SigningSession,
        signed_document: impl Into<Bytes>,
        password: Option<String>,
    ) -> SdkResult<SignResponse> {
        let document_id = session.created()?.id;
        let mut request = SignRequest::new(document_id, signed_document);
        request.password = password;

        let signer = session.owner().clone();
        let signed = self.sign(&signer, request).await?;
        session.mark_signed(signed.clone());
        Ok(signed)
    }

    // ---- Lifecycle ----

    /// Reject a document of `owner`. Documents of other owners read as
    /// missing.
    pub async fn reject(&self, owner: &OwnerId, document_id: &DocumentId) -> SdkResult<DocumentStatus> {
        self.transition(owner, document_id, DocumentStatus::Rejected).await
    }

    pub async fn expire(&self, owner: &OwnerId, document_id: &DocumentId) -> SdkResult<DocumentStatus> {
        self.transition(owner, document_id, DocumentStatus::Expired).await
    }

    async fn transition(
        &self,
        owner: &OwnerId,
        document_id: &DocumentId,
        next: DocumentStatus,
    ) -> SdkResult<DocumentStatus> {
        self.owned_document(owner, document_id).await?;
        let document = self
            .store
            .update_status(document_id, next)
            .await
            .map_err(SdkError::store("updating status"))?;
        info!(document = %document_id, status = %document.status, "status changed");
        Ok(document.status)
    }

    // ---- Reads ----

    /// A document and its current version. Documents of other owners read
    /// as missing.
    pub async fn document(&self, owner: &OwnerId, document_id: &DocumentId) -> SdkResult<DocumentView> {
        let document = self.owned_document(owner, document_id).await?;
        let current = self
            .store
            .get_current_version(document_id)
            .await
            .map_err(SdkError::store("loading current version"))?;
        Ok(DocumentView { document, current })
    }

    pub async fn version(
        &self,
        owner: &OwnerId,
        document_id: &DocumentId,
        number: VersionNumber,
    ) -> SdkResult<quill_store::VersionRecord> {
        self.owned_document(owner, document_id).await?;
        self.store
            .get_version(document_id, number)
            .await
            .map_err(SdkError::store("loading version"))
    }

    /// Full version history with an integrity audit.
    pub async fn history(&self, owner: &OwnerId, document_id: &DocumentId) -> SdkResult<HistoryReport> {
        let document = self.owned_document(owner, document_id).await?;
        let versions = self
            .store
            .list_versions(document_id)
            .await
            .map_err(SdkError::store("listing versions"))?;

        let audit = VersionHistoryVerifier::verify(&versions);
        if let Err(problem) = &audit {
            warn!(document = %document_id, %problem, "version history failed its audit");
        }
        Ok(HistoryReport {
            anchored: VersionHistoryVerifier::anchored_count(&versions),
            intact: audit.is_ok(),
            problem: audit.err().map(|e| e.to_string()),
            document,
            versions,
        })
    }

    /// Raw bytes of a version.
    pub async fn content(
        &self,
        owner: &OwnerId,
        document_id: &DocumentId,
        number: VersionNumber,
    ) -> SdkResult<Bytes> {
        let version = self.version(owner, document_id, number).await?;
        self.blobs
            .get(&version.content)
            .await
            .map_err(SdkError::store("reading content"))?
            .map(Bytes::from)
            .ok_or_else(|| SdkError::NotFound(format!("content {}", version.content)))
    }

    pub fn transaction_url(&self, tx_signature: &str) -> String {
        self.ledger.transaction_url(tx_signature)
    }

    async fn owned_document(
        &self,
        owner: &OwnerId,
        document_id: &DocumentId,
    ) -> SdkResult<quill_store::DocumentRecord> {
        let document = self
            .store
            .get_document(document_id)
            .await
            .map_err(SdkError::store("loading document"))?;
        if &document.owner != owner {
            return Err(SdkError::NotFound(format!("document {document_id}")));
        }
        Ok(document)
    }

    // ---- Hashing and passwords ----

    async fn hash_one(&self, content: Bytes, marker: u64, secret: &str) -> SdkResult<ContentHash> {
        let hasher = self.hasher;
        let secret = secret.to_owned();
        tokio::task::spawn_blocking(move || hasher.hash(&content, marker, &secret))
            .await
            .map_err(|e| SdkError::Internal(format!("hashing task failed: {e}")))
    }

    /// Hash the original and unsigned buffers concurrently.
    async fn hash_pair(
        &self,
        original: Bytes,
        unsigned: Bytes,
        marker: u64,
        secret: &str,
    ) -> SdkResult<(ContentHash, ContentHash)> {
        tokio::try_join!(
            self.hash_one(original, marker, secret),
            self.hash_one(unsigned, marker, secret),
        )
    }

    async fn protect_password(&self, secret: &str) -> SdkResult<Option<String>> {
        if secret.is_empty() {
            return Ok(None);
        }
        let secret = secret.to_owned();
        tokio::task::spawn_blocking(move || hash_password(&secret))
            .await
            .map_err(|e| SdkError::Internal(format!("password task failed: {e}")))?
            .map(Some)
            .map_err(|e| SdkError::Internal(e.to_string()))
    }

    /// Check the supplied password against the stored hash and return the
    /// secret to bind into hashes.
    async fn unlock(&self, stored: Option<&str>, supplied: Option<&str>) -> SdkResult<String> {
        let Some(phc) = stored else {
            return Ok(String::new());
        };
        let supplied = supplied.unwrap_or_default().to_owned();
        let phc = phc.to_owned();
        let candidate = supplied.clone();
        let ok = tokio::task::spawn_blocking(move || verify_password(&candidate, &phc))
            .await
            .map_err(|e| SdkError::Internal(format!("password task failed: {e}")))?
            .map_err(|e| SdkError::Internal(e.to_string()))?;
        if !ok {
            return Err(SdkError::PasswordMismatch);
        }
        Ok(supplied)
    }
}

/// Compare two digests without exiting early on the first difference.
fn digests_equal(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
