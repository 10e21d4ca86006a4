use quill_types::{Digest, Memo, VersionNumber};

/// A persisted version as seen by the history audit.
pub trait HistoryEntry {
    /// The version number assigned by the store.
    fn number(&self) -> u32;
    /// The cached canonical digest of the version's content.
    fn digest(&self) -> Digest;
    /// The memo of the anchoring transaction, if the version was anchored.
    fn anchored_memo(&self) -> Option<Memo>;
}

/// Audits a document's version history.
///
/// Checks, in order:
/// 1. The first version carries the base number
/// 2. Numbers are contiguous and strictly increasing
/// 3. Every anchored version's memo names that version's digest
pub struct VersionHistoryVerifier;

impl VersionHistoryVerifier {
    /// Verify a history ordered by version number.
    pub fn verify(entries: &[impl HistoryEntry]) -> Result<(), HistoryError> {
        let Some(first) = entries.first() else {
            return Ok(());
        };

        if first.number() != VersionNumber::BASE.get() {
            return Err(HistoryError::WrongBase {
                found: first.number(),
            });
        }

        for (index, entry) in entries.iter().enumerate() {
            let expected = VersionNumber::BASE.get() + index as u32;
            if entry.number() != expected {
                return Err(HistoryError::Gap {
                    index,
                    expected,
                    found: entry.number(),
                });
            }

            if let Some(memo) = entry.anchored_memo() {
                if *memo.digest() != entry.digest() {
                    return Err(HistoryError::MemoMismatch {
                        number: entry.number(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Number of versions that carry an anchor.
    pub fn anchored_count(entries: &[impl HistoryEntry]) -> usize {
        entries
            .iter()
            .filter(|e| e.anchored_memo().is_some())
            .count()
    }
}

/// Errors from history verification.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("first version is {found}, expected the base version")]
    WrongBase { found: u32 },

    #[error("gap at index {index}: expected version {expected}, found {found}")]
    Gap {
        index: usize,
        expected: u32,
        found: u32,
    },

    #[error("version {number} is anchored with a memo for a different hash")]
    MemoMismatch { number: u32 },
}
