use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid memo: {0}")]
    InvalidMemo(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("invalid content pointer: {0}")]
    InvalidPointer(String),

    #[error("unknown status: {0}")]
    UnknownStatus(String),

    #[error("unknown version stage: {0}")]
    UnknownStage(String),
}
