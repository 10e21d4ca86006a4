use chrono::Utc;
use quill_types::{DocumentId, OwnerId, SessionId, Timestamp};

use crate::error::{SdkError, SdkResult};
use crate::request::{CreateRequest, CreateResponse, SignResponse};

/// Where a signing wizard currently stands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WizardStep {
    /// Collecting the document and its metadata.
    Collecting,
    /// The document was created and anchored; waiting for a signature.
    Created(CreateResponse),
    /// The document was signed.
    Signed(SignResponse),
}

/// State of a multi-step create-then-sign flow.
///
/// Passed by `&mut` through each step. Every access checks the expiry, so a
/// stale session can never drive the lifecycle forward.
#[derive(Clone, Debug)]
pub struct SigningSession {
    id: SessionId,
    owner: OwnerId,
    created_at: Timestamp,
    expires_at: Timestamp,
    staged: Option<CreateRequest>,
    step: WizardStep,
}

impl SigningSession {
    pub fn new(owner: OwnerId, ttl: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            owner,
            created_at: now,
            expires_at: now + ttl,
            staged: None,
            step: WizardStep::Collecting,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn expires_at(&self) -> Timestamp {
        self.expires_at
    }

    pub fn step(&self) -> &WizardStep {
        &self.step
    }

    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// Fail with [`SdkError::SessionExpired`] once the session has expired.
    pub fn ensure_active(&self) -> SdkResult<()> {
        self.ensure_active_at(Utc::now())
    }

    pub fn ensure_active_at(&self, now: Timestamp) -> SdkResult<()> {
        if self.is_expired_at(now) {
            return Err(SdkError::SessionExpired(self.id));
        }
        Ok(())
    }

    /// The document created in this session, once there is one.
    pub fn document_id(&self) -> Option<DocumentId> {
        match &self.step {
            WizardStep::Collecting => None,
            WizardStep::Created(created) => Some(created.id),
            WizardStep::Signed(signed) => Some(signed.document_id),
        }
    }

    /// Stage or replace the document to create.
    pub fn stage(&mut self, request: CreateRequest) -> SdkResult<()> {
        self.ensure_active()?;
        if self.step != WizardStep::Collecting {
            return Err(SdkError::InvalidState(
                "document already created in this session".into(),
            ));
        }
        self.staged = Some(request);
        Ok(())
    }

    pub fn staged(&self) -> Option<&CreateRequest> {
        self.staged.as_ref()
    }

    pub(crate) fn take_staged(&mut self) -> SdkResult<CreateRequest> {
        self.ensure_active()?;
        if self.step != WizardStep::Collecting {
            return Err(SdkError::InvalidState(
                "document already created in this session".into(),
            ));
        }
        self.staged
            .take()
            .ok_or_else(|| SdkError::InvalidState("no document staged in this session".into()))
    }

    /// Put a request back after a failed create so the user can retry.
    pub(crate) fn restore_staged(&mut self, request: CreateRequest) {
        self.staged = Some(request);
    }

    pub(crate) fn mark_created(&mut self, created: CreateResponse) {
        self.step = WizardStep::Created(created);
    }

    pub(crate) fn created(&self) -> SdkResult<&CreateResponse> {
        self.ensure_active()?;
        match &self.step {
            WizardStep::Created(created) => Ok(created),
            WizardStep::Collecting => Err(SdkError::InvalidState(
                "no document has been created in this session".into(),
            )),
            WizardStep::Signed(_) => Err(SdkError::InvalidState(
                "document already signed in this session".into(),
            )),
        }
    }

    pub(crate) fn mark_signed(&mut self, signed: SignResponse) {
        self.step = WizardStep::Signed(signed);
    }
}
