//! # did:btcr2 Testkit
//!
//! Testing utilities for did:btcr2.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: identifier strings every codec must reproduce
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: an identity on an in-memory chain, with helpers to fund
//!   beacons and mine signals
//!
//! ## Golden Vectors
//!
//! ```rust
//! use btcr2_testkit::vectors::verify_all_vectors;
//!
//! for (name, passed, detail) in verify_all_vectors() {
//!     assert!(passed, "{name}: {detail}");
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use btcr2_testkit::generators::identifier_components;
//!
//! proptest! {
//!     #[test]
//!     fn round_trip(components in identifier_components()) {
//!         let did = components.encode().unwrap();
//!         prop_assert_eq!(btcr2_core::IdentifierComponents::decode(&did).unwrap(), components);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use btcr2_testkit::fixtures::TestFixture;
//!
//! let mut fixture = TestFixture::new();
//! let genesis = fixture.genesis.clone();
//! let height = fixture.announce(&genesis, "#initialP2PKH", &btcr2_core::ContentHash::ZERO);
//! assert_eq!(height, 2);
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{funding_transaction, patched, signal_transaction, TestFixture};
pub use vectors::{all_vectors, verify_all_vectors, GoldenVector};
