//! Error types for resolution and the write path.

use btcr2_beacon::BeaconError;
use btcr2_core::{CoreError, GenesisError, IdentifierError};
use btcr2_ledger::LedgerError;
use thiserror::Error;

use crate::resolver::Checkpoint;

/// Errors that end a resolution.
///
/// Rejected updates are not errors; they are counted in the metadata.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The identifier does not decode.
    #[error("malformed identifier: {0}")]
    MalformedIdentifier(#[from] IdentifierError),

    /// The identifier's version is not one this resolver implements.
    #[error("unsupported identifier version {0}")]
    UnsupportedVersion(u8),

    /// The genesis document could not be established.
    #[error("genesis error: {0}")]
    Genesis(#[from] GenesisError),

    /// Ledger access failed.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// A core primitive failed outside update validation.
    #[error("core error: {0}")]
    Core(CoreError),

    /// Beacon processing failed.
    #[error("beacon error: {0}")]
    Beacon(BeaconError),

    /// Resolution options are inconsistent.
    #[error("invalid resolution options: {0}")]
    InvalidOptions(String),

    /// Resolution was cancelled; the checkpoint resumes it.
    #[error("resolution cancelled at height {}", .0.cursor.height)]
    Cancelled(Box<Checkpoint>),
}

impl From<CoreError> for ResolveError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Identifier(e) => ResolveError::MalformedIdentifier(e),
            CoreError::Genesis(e) => ResolveError::Genesis(e),
            other => ResolveError::Core(other),
        }
    }
}

impl From<BeaconError> for ResolveError {
    fn from(e: BeaconError) -> Self {
        match e {
            BeaconError::Ledger(e) => ResolveError::Ledger(e),
            BeaconError::Core(e) => e.into(),
            other => ResolveError::Beacon(other),
        }
    }
}

/// Errors preparing an update for publication.
#[derive(Debug, Error)]
pub enum PrepareError {
    /// Building or signing the update failed.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// The source document has no beacon with this id.
    #[error("no usable beacon {0} in the source document")]
    UnknownBeacon(String),

    /// Only singleton beacons publish an update hash directly.
    #[error("beacon {0} is an aggregate beacon; its signal is built by the aggregator")]
    NotSingleton(String),
}

/// Result type for resolution.
pub type Result<T> = std::result::Result<T, ResolveError>;
