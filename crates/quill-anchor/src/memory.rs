use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use quill_types::Memo;

use crate::error::{AnchorError, AnchorResult};
use crate::traits::LedgerAnchor;

/// Number of calls made against an [`InMemoryLedger`], per operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub freshness_marker: usize,
    pub anchor: usize,
    pub memo_for: usize,
}

/// In-memory ledger for tests, local demos, and embedding.
///
/// Every successful anchor lands in a new block, so the block height grows
/// by one per transaction. Failures can be injected per operation.
pub struct InMemoryLedger {
    inner: RwLock<LedgerState>,
}

#[derive(Default)]
struct LedgerState {
    block_height: u64,
    tx_counter: u64,
    transactions: HashMap<String, String>,
    calls: CallCounts,
    fixed_signature: Option<String>,
    freshness_failure: Option<String>,
    anchor_failure: Option<String>,
}

impl InMemoryLedger {
    pub fn new(block_height: u64) -> Self {
        Self {
            inner: RwLock::new(LedgerState {
                block_height,
                ..Default::default()
            }),
        }
    }

    /// Return `signature` from every successful anchor instead of a
    /// generated one.
    pub fn with_fixed_signature(self, signature: impl Into<String>) -> Self {
        if let Ok(mut state) = self.inner.write() {
            state.fixed_signature = Some(signature.into());
        }
        self
    }

    /// Make `freshness_marker` fail as if the endpoint were unreachable.
    pub fn fail_freshness_with(&self, cause: impl Into<String>) {
        if let Ok(mut state) = self.inner.write() {
            state.freshness_failure = Some(cause.into());
        }
    }

    /// Make `anchor` fail as if the transaction were rejected.
    pub fn fail_anchor_with(&self, cause: impl Into<String>) {
        if let Ok(mut state) = self.inner.write() {
            state.anchor_failure = Some(cause.into());
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut state) = self.inner.write() {
            state.freshness_failure = None;
            state.anchor_failure = None;
        }
    }

    /// Record a transaction with arbitrary memo text, bypassing the memo
    /// format. Lets tests model foreign transactions.
    pub fn insert_raw_transaction(&self, signature: impl Into<String>, memo_text: impl Into<String>) {
        if let Ok(mut state) = self.inner.write() {
            state.transactions.insert(signature.into(), memo_text.into());
        }
    }

    pub fn set_block_height(&self, height: u64) {
        if let Ok(mut state) = self.inner.write() {
            state.block_height = height;
        }
    }

    pub fn block_height(&self) -> u64 {
        self.inner.read().map(|s| s.block_height).unwrap_or_default()
    }

    pub fn calls(&self) -> CallCounts {
        self.inner.read().map(|s| s.calls).unwrap_or_default()
    }

    /// Number of transactions recorded so far.
    pub fn transaction_count(&self) -> usize {
        self.inner
            .read()
            .map(|s| s.transactions.len())
            .unwrap_or_default()
    }

    fn write_state(&self) -> AnchorResult<std::sync::RwLockWriteGuard<'_, LedgerState>> {
        self.inner
            .write()
            .map_err(|_| AnchorError::Internal("ledger write lock poisoned".into()))
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(1)
    }
}

impl std::fmt::Debug for InMemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLedger")
            .field("block_height", &self.block_height())
            .field("transactions", &self.transaction_count())
            .finish()
    }
}

#[async_trait]
impl LedgerAnchor for InMemoryLedger {
    async fn freshness_marker(&self) -> AnchorResult<u64> {
        let mut state = self.write_state()?;
        state.calls.freshness_marker += 1;
        if let Some(cause) = &state.freshness_failure {
            return Err(AnchorError::Network(cause.clone()));
        }
        Ok(state.block_height)
    }

    async fn anchor(&self, memo: &Memo) -> AnchorResult<String> {
        let mut state = self.write_state()?;
        state.calls.anchor += 1;
        if let Some(cause) = &state.anchor_failure {
            return Err(AnchorError::Submission(cause.clone()));
        }

        state.tx_counter += 1;
        state.block_height += 1;
        let signature = state
            .fixed_signature
            .clone()
            .unwrap_or_else(|| format!("memtx{:016x}", state.tx_counter));
        state.transactions.insert(signature.clone(), memo.to_string());
        Ok(signature)
    }

    async fn memo_for(&self, tx_signature: &str) -> AnchorResult<Option<Memo>> {
        let mut state = self.write_state()?;
        state.calls.memo_for += 1;
        match state.transactions.get(tx_signature) {
            None => Ok(None),
            Some(text) => Memo::parse(text)
                .map(Some)
                .map_err(|_| AnchorError::MemoMissing(tx_signature.to_string())),
        }
    }

    fn transaction_url(&self, tx_signature: &str) -> String {
        format!("memory://ledger/tx/{tx_signature}")
    }
}
