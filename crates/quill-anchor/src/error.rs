/// Errors produced by ledger anchor operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnchorError {
    /// The ledger endpoint could not be reached or did not answer.
    #[error("ledger unreachable: {0}")]
    Network(String),

    /// A memo transaction was rejected or could not be submitted.
    #[error("Transaction failed: {0}")]
    Submission(String),

    /// The ledger answered with a JSON-RPC error object.
    #[error("ledger RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The transaction exists but carries no parsable `FILE_HASH=` memo.
    #[error("transaction {0} carries no FILE_HASH memo")]
    MemoMissing(String),

    /// The transaction exists but failed on-chain, so it anchors nothing.
    #[error("transaction {0} failed on-chain")]
    FailedTransaction(String),

    #[error("invalid ledger response: {0}")]
    InvalidResponse(String),

    #[error("keypair error: {0}")]
    Keypair(String),

    #[error("ledger state error: {0}")]
    Internal(String),
}

impl AnchorError {
    /// Fold any error raised while submitting into [`AnchorError::Submission`],
    /// keeping the underlying cause text.
    pub fn into_submission(self) -> Self {
        match self {
            Self::Submission(_) => self,
            other => Self::Submission(other.to_string()),
        }
    }

    /// Fold any error raised while reading chain state into
    /// [`AnchorError::Network`].
    pub fn into_network(self) -> Self {
        match self {
            Self::Network(_) => self,
            other => Self::Network(other.to_string()),
        }
    }
}

/// Result alias for anchor operations.
pub type AnchorResult<T> = Result<T, AnchorError>;
