//! JSON Canonicalization Scheme (RFC 8785) and content hashing.
//!
//! Every hash in did:btcr2 is SHA-256 over the canonical form:
//! - Object members sorted by UTF-16 code units of their names
//! - No insignificant whitespace
//! - Numbers in their shortest ECMAScript form
//!
//! The same value therefore produces the same hash on every platform, which
//! is what lets `sourceHash`/`targetHash` chain documents together.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{CoreError, Result};
use crate::types::ContentHash;

/// Serialize a value to its JCS canonical string.
pub fn canonicalize<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_jcs::to_string(value).map_err(|e| CoreError::Canonicalization(e.to_string()))
}

/// SHA-256 of the canonical form of a value.
pub fn canonical_hash<T: Serialize + ?Sized>(value: &T) -> Result<ContentHash> {
    let canonical = canonicalize(value)?;
    Ok(sha256(canonical.as_bytes()))
}

/// Plain SHA-256.
pub fn sha256(data: &[u8]) -> ContentHash {
    ContentHash(Sha256::digest(data).into())
}

/// SHA-256 over the concatenation of two 32-byte digests.
pub(crate) fn sha256_pair(left: &ContentHash, right: &ContentHash) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    ContentHash(hasher.finalize().into())
}
