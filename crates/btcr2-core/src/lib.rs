//! # did:btcr2 Core
//!
//! Pure primitives for the did:btcr2 method: identifiers, canonical hashing,
//! DID documents, JSON patches, and authenticated updates.
//!
//! This crate contains no I/O, no ledger access, no networking. It is pure
//! computation over documents and signatures.
//!
//! ## Key Types
//!
//! - [`IdentifierComponents`] - Decoded form of a `did:btcr2:` identifier
//! - [`DidDocument`] - Copy-on-write snapshot of a DID document
//! - [`SignedUpdate`] - A patch authenticated by a BIP-340 Data Integrity proof
//! - [`UpdateValidator`] - Applies a candidate update to a document, or rejects it
//! - [`UpdateBuilder`] - The write path: diff, sign, and assemble an update
//!
//! ## Canonicalization
//!
//! Every hash is SHA-256 over the JSON Canonicalization Scheme (RFC 8785)
//! form of a value. See [`canonical`] module.

pub mod canonical;
pub mod crypto;
pub mod document;
pub mod error;
pub mod genesis;
pub mod identifier;
pub mod patch;
pub mod proof;
pub mod types;
pub mod update;
pub mod validation;

pub use canonical::{canonical_hash, canonicalize, sha256};
pub use crypto::{Keypair, PublicKey, SchnorrSignature};
pub use document::{BeaconService, BeaconType, DidDocument, Service, VerificationMethod};
pub use error::{CoreError, GenesisError, IdentifierError, PatchError, Result, SignalRejected};
pub use genesis::{
    create_deterministic, create_external, deterministic_document, external_document,
    initial_document, intermediate_document, PLACEHOLDER_DID,
};
pub use identifier::{IdType, IdentifierComponents, Network, DID_PREFIX};
pub use patch::{apply_patch, diff, PatchOperation};
pub use proof::{Bip340JcsSuite, CryptoSuite, DataIntegrityProof, ProofOptions};
pub use types::ContentHash;
pub use update::{construct, root_capability, SignedUpdate, UnsignedUpdate, UpdateBuilder};
pub use validation::{AppliedUpdate, UpdateValidator};
