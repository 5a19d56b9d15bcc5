//! # did:btcr2 Beacons
//!
//! Everything between a DID document and the ledger: which addresses to
//! watch, which transactions spend from them, and what update each of those
//! transactions announces.
//!
//! ## Overview
//!
//! A document's beacon services name Bitcoin addresses. A controller
//! announces an update by spending from one of them in a transaction whose
//! last OP_RETURN output carries 32 bytes. The update itself travels
//! off-chain, in sidecar data.
//!
//! ## Pipeline
//!
//! ```text
//! DidDocument ──► BeaconRegistry ──► SignalScanner ──► BeaconSignal
//!                                          ▲                │
//!                                       Ledger              ▼
//!                               SidecarIndex ──► decode_signal ──► SignedUpdate
//! ```
//!
//! ## Key Properties
//!
//! - **Ordered**: signals come out in `(height, tx index)` order whatever
//!   the prefetch window
//! - **Resumable**: a [`ScanCursor`] always sits on a transaction boundary
//! - **Lenient**: malformed sidecar entries and unusable beacon endpoints are
//!   skipped with a warning, never fatal

pub mod beacon;
pub mod error;
pub mod scanner;
pub mod sidecar;
pub mod signal;
pub mod smt;

pub use beacon::{Beacon, BeaconRegistry};
pub use error::{BeaconError, Result};
pub use scanner::{scan, ScanCursor, SignalScanner};
pub use sidecar::{CasAnnouncement, SidecarData, SidecarIndex};
pub use signal::{decode_signal, signal_bytes, signal_script, BeaconSignal};
pub use smt::{tree_key, SmtProof, SparseMerkleTree, TREE_DEPTH};
