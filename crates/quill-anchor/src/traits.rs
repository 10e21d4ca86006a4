use std::sync::Arc;

use async_trait::async_trait;
use quill_types::Memo;

use crate::error::AnchorResult;

/// Boundary to an external append-only ledger used purely for
/// timestamping: no value transfer happens through this trait.
#[async_trait]
pub trait LedgerAnchor: Send + Sync {
    /// Current block height, mixed into content hashes as the freshness
    /// marker. Fails with [`crate::AnchorError::Network`] when the ledger
    /// cannot be read.
    async fn freshness_marker(&self) -> AnchorResult<u64>;

    /// Submit a memo transaction and return its signature.
    ///
    /// This spends a fee and is irreversible once confirmed; callers must
    /// not retry it blindly. Fails with [`crate::AnchorError::Submission`].
    async fn anchor(&self, memo: &Memo) -> AnchorResult<String>;

    /// Resolve the memo carried by a transaction.
    ///
    /// Returns `Ok(None)` if the ledger does not know the transaction.
    async fn memo_for(&self, tx_signature: &str) -> AnchorResult<Option<Memo>>;

    /// Human-viewable explorer URL for a transaction.
    fn transaction_url(&self, tx_signature: &str) -> String;
}

#[async_trait]
impl<T: LedgerAnchor + ?Sized> LedgerAnchor for Arc<T> {
    async fn freshness_marker(&self) -> AnchorResult<u64> {
        (**self).freshness_marker().await
    }

    async fn anchor(&self, memo: &Memo) -> AnchorResult<String> {
        (**self).anchor(memo).await
    }

    async fn memo_for(&self, tx_signature: &str) -> AnchorResult<Option<Memo>> {
        (**self).memo_for(tx_signature).await
    }

    fn transaction_url(&self, tx_signature: &str) -> String {
        (**self).transaction_url(tx_signature)
    }
}
