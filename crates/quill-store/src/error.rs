use quill_types::{ContentPointer, DocumentId, DocumentStatus};

/// Errors from version and blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated, e.g. a second document with
    /// the same owner and name.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The requested record does not exist.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// The requested status change would move the lifecycle backwards or
    /// leave a terminal state.
    #[error("invalid status transition for document {document}: {from} -> {to}")]
    InvalidTransition {
        document: DocumentId,
        from: DocumentStatus,
        to: DocumentStatus,
    },

    /// Error reported by SQLite.
    #[error("sqlite error: {0}")]
    Sqlite(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Blob bytes on disk do not hash to their pointer (data corruption).
    #[error("blob {pointer} failed its integrity check")]
    BlobMismatch { pointer: ContentPointer },

    /// A persisted row could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn document_not_found(id: &DocumentId) -> Self {
        Self::NotFound {
            entity: "document",
            key: id.to_string(),
        }
    }

    pub fn version_not_found(document: &DocumentId, number: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity: "version",
            key: format!("{document}/{number}"),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, msg)
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                Self::Conflict(msg.clone().unwrap_or_else(|| e.to_string()))
            }
            _ => Self::Sqlite(err.to_string()),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
