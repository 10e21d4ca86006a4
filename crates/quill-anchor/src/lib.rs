//! Ledger anchor client for Quill.
//!
//! This crate records content hashes on a public ledger and reads them back:
//! - `LedgerAnchor` trait boundary (freshness marker, anchor, memo lookup)
//! - `RpcLedger` JSON-RPC client submitting signed memo transactions
//! - `InMemoryLedger` implementation for tests and embedding
//! - Wire encoding of single-instruction memo transactions

pub mod config;
pub mod error;
pub mod memory;
pub mod rpc;
pub mod traits;
pub mod transaction;

pub use config::{Cluster, Commitment, LedgerConfig};
pub use error::{AnchorError, AnchorResult};
pub use memory::{CallCounts, InMemoryLedger};
pub use rpc::RpcLedger;
pub use traits::LedgerAnchor;
pub use transaction::{MemoTransaction, MAX_MEMO_LEN, MEMO_PROGRAM_ID};
