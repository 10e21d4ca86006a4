use quill_anchor::AnchorError;
use quill_store::StoreError;
use quill_types::SessionId;
use thiserror::Error;

/// User-facing error taxonomy of the document service.
///
/// Lower-layer errors are wrapped together with the step that failed; only
/// this layer decides which category the caller sees.
#[derive(Debug, Error)]
pub enum SdkError {
    /// Malformed caller input. Never retried automatically.
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    /// The ledger endpoint could not be reached.
    #[error("ledger unreachable while {step}: {source}")]
    Network {
        step: &'static str,
        source: AnchorError,
    },

    /// Anchoring failed, so no integrity guarantee was established.
    #[error("{source}")]
    Anchor {
        step: &'static str,
        source: AnchorError,
    },

    /// A document with this owner and name already exists.
    #[error("already exists: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Any other persistence failure.
    #[error("storage failure while {step}: {source}")]
    Storage {
        step: &'static str,
        source: StoreError,
    },

    #[error("incorrect document password")]
    PasswordMismatch,

    #[error("signing session {0} has expired")]
    SessionExpired(SessionId),

    /// The operation does not apply to the document's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SdkError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Classify a store error raised while performing `step`.
    pub fn store(step: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |err| match err {
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::NotFound { entity, key } => Self::NotFound(format!("{entity} {key}")),
            StoreError::InvalidTransition { document, from, to } => Self::InvalidState(format!(
                "document {document} cannot move from {from} to {to}"
            )),
            source => Self::Storage { step, source },
        }
    }

    /// Classify a ledger read error raised while performing `step`.
    pub fn network(step: &'static str) -> impl FnOnce(AnchorError) -> Self {
        move |source| Self::Network { step, source }
    }

    /// Classify an anchoring error raised while performing `step`.
    pub fn anchor(step: &'static str) -> impl FnOnce(AnchorError) -> Self {
        move |source| Self::Anchor {
            step,
            source: source.into_submission(),
        }
    }
}

pub type SdkResult<T> = Result<T, SdkError>;

#[cfg(test)]
mod tests {
    use super::*;
    use quill_types::{DocumentId, DocumentStatus};

    #[test]
    fn anchor_message_names_cause() {
        let err = SdkError::anchor("anchoring")(AnchorError::Submission("insufficient funds".into()));
        assert_eq!(err.to_string(), "Transaction failed: insufficient funds");
        assert!(matches!(err, SdkError::Anchor { step: "anchoring", .. }));
    }

    #[test]
    fn conflict_is_distinct_from_storage() {
        let err = SdkError::store("persisting")(StoreError::Conflict("owner/name".into()));
        assert!(matches!(err, SdkError::Conflict(_)));

        let err = SdkError::store("persisting")(StoreError::Sqlite("disk I/O error".into()));
        assert!(matches!(err, SdkError::Storage { step: "persisting", .. }));
    }

    #[test]
    fn transitions_become_invalid_state() {
        let err = SdkError::store("rejecting")(StoreError::InvalidTransition {
            document: DocumentId::new(),
            from: DocumentStatus::Completed,
            to: DocumentStatus::Rejected,
        });
        assert!(matches!(err, SdkError::InvalidState(m) if m.contains("completed")));
    }

    #[test]
    fn validation_names_field() {
        let err = SdkError::validation("name", "is required");
        assert!(matches!(err, SdkError::Validation { field: "name", .. }));
    }
}
