//! Error types for ledger access.

use bitcoin::Txid;
use thiserror::Error;

/// Errors that can occur while reading the ledger.
///
/// Every variant is fatal to a resolution in progress.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No block at this height.
    #[error("block not found at height {0}")]
    BlockNotFound(u64),

    /// A transaction referenced by an input is unknown.
    #[error("transaction not found: {0}")]
    TransactionNotFound(Txid),

    /// The backing node or index failed.
    #[error("ledger backend error: {0}")]
    Backend(String),

    /// A lock guarding in-memory state was poisoned.
    #[error("ledger state lock poisoned")]
    Poisoned,
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
