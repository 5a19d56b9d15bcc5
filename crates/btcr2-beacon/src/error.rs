//! Error types for beacon processing.

use btcr2_core::CoreError;
use btcr2_ledger::LedgerError;
use thiserror::Error;

/// Errors that can occur while scanning for or decoding beacon signals.
#[derive(Debug, Error)]
pub enum BeaconError {
    /// Ledger access failed.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// A core primitive failed.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// An SMT proof does not verify.
    #[error("invalid SMT proof: {0}")]
    InvalidSmtProof(String),
}

/// Result type for beacon operations.
pub type Result<T> = std::result::Result<T, BeaconError>;
