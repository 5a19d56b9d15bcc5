//! # did:btcr2 Ledger
//!
//! Read access to the Bitcoin ledger for did:btcr2 resolution. Resolution
//! needs very little from a node: the chain tip, blocks by height, and the
//! transactions whose outputs a beacon signal spends.
//!
//! ## Key Types
//!
//! - [`Ledger`] - The async trait a node, indexer, or test double implements
//! - [`LedgerBlock`] - A block's height, timestamp, and ordered transactions
//! - [`MemoryLedger`] - In-memory chain for tests and offline resolution
//!
//! ## Design Notes
//!
//! - **Read-only**: nothing here broadcasts; publishing signals belongs to
//!   wallet tooling
//! - **Timeouts** are the implementation's concern, surfaced as
//!   [`LedgerError::Backend`]

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{LedgerError, Result};
pub use memory::MemoryLedger;
pub use traits::{Ledger, LedgerBlock};
