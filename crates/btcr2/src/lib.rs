//! # did:btcr2
//!
//! Resolve and update `did:btcr2` identifiers: DIDs whose history is a
//! chain of signed document patches announced in Bitcoin transactions.
//!
//! ## Overview
//!
//! - **Create**: a KEY identifier is derived from a public key, an EXTERNAL
//!   one from the hash of an intermediate document
//! - **Resolve**: establish the genesis document, then replay every update
//!   announced through the document's beacons, in ledger order
//! - **Update**: sign a patch against the current document and publish its
//!   hash through a beacon
//!
//! ## Usage
//!
//! ```rust,no_run
//! use btcr2::{create_deterministic, Keypair, Network};
//! use btcr2::{ResolutionOptions, Resolver, ResolverConfig, SidecarData};
//! use btcr2::ledger::MemoryLedger;
//!
//! async fn example() {
//!     let keypair = Keypair::generate();
//!     let (did, _document) =
//!         create_deterministic(&keypair.public_key(), Network::Regtest, 1).unwrap();
//!
//!     let resolver = Resolver::new(MemoryLedger::new(), ResolverConfig::default());
//!     let resolution = resolver
//!         .resolve(&did, &SidecarData::new(), &ResolutionOptions::new())
//!         .await
//!         .unwrap();
//!     println!("{} at version {}", did, resolution.metadata.version_id);
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `btcr2::core` - Identifiers, documents, updates, and validation
//! - `btcr2::ledger` - Ledger access
//! - `btcr2::beacon` - Beacons, sidecar data, and the signal scanner

pub mod error;
pub mod resolver;
pub mod update;

pub use btcr2_beacon as beacon;
pub use btcr2_core as core;
pub use btcr2_ledger as ledger;

pub use error::{PrepareError, ResolveError, Result};
pub use resolver::{
    CancelToken, Checkpoint, Resolution, ResolutionMetadata, ResolutionOptions, ResolutionState,
    Resolver, ResolverConfig, SUPPORTED_VERSION,
};
pub use update::{prepare_update, PreparedUpdate};

pub use btcr2_beacon::{CasAnnouncement, SidecarData, SmtProof, SparseMerkleTree};
pub use btcr2_core::{
    construct, create_deterministic, create_external, DidDocument, IdType, IdentifierComponents,
    Keypair, Network, PatchOperation, PublicKey, SignalRejected, SignedUpdate, UpdateBuilder,
};
