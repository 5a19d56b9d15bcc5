//! Error types for did:btcr2 core primitives.

use thiserror::Error;

use crate::identifier::IdType;
use crate::types::ContentHash;

/// Core errors that can occur while building or reading documents and updates.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid secret key")]
    InvalidSecretKey,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid multibase value: {0}")]
    InvalidMultibase(String),

    #[error("canonicalization failed: {0}")]
    Canonicalization(String),

    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("malformed proof: {0}")]
    MalformedProof(String),

    #[error("invalid beacon address: {0}")]
    InvalidAddress(String),

    #[error("patch error: {0}")]
    Patch(#[from] PatchError),

    #[error("identifier error: {0}")]
    Identifier(#[from] IdentifierError),

    #[error("genesis error: {0}")]
    Genesis(#[from] GenesisError),

    #[error("verification method not found: {0}")]
    VerificationMethodNotFound(String),

    #[error("verification method {0} is not in capabilityInvocation")]
    Unauthorized(String),

    #[error("keypair does not match verification method {0}")]
    KeyMismatch(String),

    #[error("document {0} is deactivated")]
    Deactivated(String),
}

/// Errors decoding or encoding a `did:btcr2` identifier.
///
/// Every variant is fatal to the call that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("identifier must start with did:btcr2:")]
    MissingPrefix,

    #[error("missing bech32 separator")]
    MissingSeparator,

    #[error("invalid character {0:?}")]
    InvalidCharacter(char),

    #[error("identifier mixes upper and lower case")]
    MixedCase,

    #[error("checksum mismatch")]
    InvalidChecksum,

    #[error("unknown identifier type prefix {0:?}")]
    UnknownIdType(String),

    #[error("unknown network {0:#x}")]
    UnknownNetwork(u8),

    #[error("unsupported version {0}")]
    UnsupportedVersion(u8),

    #[error("non-zero padding in identifier payload")]
    InvalidPadding,

    #[error("identifier payload is empty")]
    EmptyPayload,

    #[error("{id_type} genesis bytes must be {expected} bytes, got {got}")]
    InvalidGenesisLength {
        id_type: IdType,
        expected: usize,
        got: usize,
    },

    #[error("genesis bytes are not a valid compressed public key")]
    InvalidGenesisKey,

    #[error("bech32 encoding failed: {0}")]
    Encoding(String),
}

/// Errors applying an RFC 6902 patch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("invalid JSON pointer {0:?}")]
    InvalidPointer(String),

    #[error("path not found: {0}")]
    PathNotFound(String),

    #[error("invalid array index {index:?} at {path}")]
    InvalidIndex { path: String, index: String },

    #[error("test failed at {0}")]
    TestFailed(String),

    #[error("cannot move {from} into its own child {path}")]
    MoveIntoChild { from: String, path: String },
}

/// Errors establishing the genesis document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenesisError {
    #[error("EXTERNAL identifier requires a sidecar genesis document")]
    Missing,

    #[error("genesis document hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        expected: ContentHash,
        actual: ContentHash,
    },

    #[error("invalid genesis document: {0}")]
    Invalid(String),
}

/// Reasons a candidate update is rejected.
///
/// A rejection is not fatal: the resolver logs it and moves on to the next
/// signal at the same version.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalRejected {
    #[error("document is already deactivated")]
    AlreadyDeactivated,

    #[error("stale version: expected sourceVersionId {expected}, got {got}")]
    StaleVersion { expected: u64, got: u64 },

    #[error("source hash mismatch: expected {expected}, got {got}")]
    SourceHashMismatch {
        expected: ContentHash,
        got: ContentHash,
    },

    #[error("invalid proof: {0}")]
    InvalidProof(String),

    #[error("verification method {0} is not authorized for capabilityInvocation")]
    UnauthorizedSigner(String),

    #[error("signature verification failed")]
    InvalidSignature,

    #[error("malformed patch: {0}")]
    MalformedPatch(String),

    #[error("patched document is invalid: {0}")]
    MalformedDocument(String),

    #[error("target hash mismatch: expected {expected}, got {got}")]
    TargetHashMismatch {
        expected: ContentHash,
        got: ContentHash,
    },

    #[error("canonicalization failed: {0}")]
    Canonicalization(String),
}

impl From<PatchError> for SignalRejected {
    fn from(e: PatchError) -> Self {
        SignalRejected::MalformedPatch(e.to_string())
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
