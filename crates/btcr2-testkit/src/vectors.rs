//! Golden identifier vectors.
//!
//! Every implementation of the did:btcr2 identifier codec must map these
//! components to exactly these strings, and back.

use btcr2_core::{IdType, IdentifierComponents, Network};

/// The compressed key used by every KEY vector.
pub const VECTOR_KEY: &str = "03620d4fb8d5c40b0dc2f9fd84636d85487e51ecf55fbcd5ccf08c6ac148bc8a36";

/// The genesis hash used by every EXTERNAL vector: bytes `0x00..=0x1f`.
pub const VECTOR_GENESIS_HASH: &str =
    "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

/// A golden identifier vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    pub name: &'static str,
    pub id_type: IdType,
    pub version: u8,
    pub network: Network,
    /// Genesis bytes (hex).
    pub genesis: &'static str,
    pub did: &'static str,
}

impl GoldenVector {
    /// The components this vector encodes.
    pub fn components(&self) -> IdentifierComponents {
        IdentifierComponents {
            id_type: self.id_type,
            version: self.version,
            network: self.network,
            genesis_bytes: hex::decode(self.genesis).expect("vector genesis is hex"),
        }
    }
}

/// Get all golden vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    let key = |name, network, did| GoldenVector {
        name,
        id_type: IdType::Key,
        version: 1,
        network,
        genesis: VECTOR_KEY,
        did,
    };
    let external = |name, network, did| GoldenVector {
        name,
        id_type: IdType::External,
        version: 1,
        network,
        genesis: VECTOR_GENESIS_HASH,
        did,
    };

    vec![
        key(
            "KEY bitcoin",
            Network::Bitcoin,
            "did:btcr2:k1qqpkyr20hr2ugzcdctulmprrdkz5slj3an64l0x4encgc6kpfz7g5dsaaw53r",
        ),
        key(
            "KEY signet",
            Network::Signet,
            "did:btcr2:k1qypkyr20hr2ugzcdctulmprrdkz5slj3an64l0x4encgc6kpfz7g5dsekdtnx",
        ),
        key(
            "KEY regtest",
            Network::Regtest,
            "did:btcr2:k1qgpkyr20hr2ugzcdctulmprrdkz5slj3an64l0x4encgc6kpfz7g5ds4tgr4f",
        ),
        key(
            "KEY testnet3",
            Network::Testnet3,
            "did:btcr2:k1qvpkyr20hr2ugzcdctulmprrdkz5slj3an64l0x4encgc6kpfz7g5ds3qtuhv",
        ),
        key(
            "KEY testnet4",
            Network::Testnet4,
            "did:btcr2:k1qspkyr20hr2ugzcdctulmprrdkz5slj3an64l0x4encgc6kpfz7g5dsdczneh",
        ),
        key(
            "KEY mutinynet",
            Network::Mutinynet,
            "did:btcr2:k1q5pkyr20hr2ugzcdctulmprrdkz5slj3an64l0x4encgc6kpfz7g5dsfnpvmj",
        ),
        GoldenVector {
            name: "KEY bitcoin version 16",
            version: 16,
            ..key(
                "",
                Network::Bitcoin,
                "did:btcr2:k17qpkyr20hr2ugzcdctulmprrdkz5slj3an64l0x4encgc6kpfz7g5dsrm42t6",
            )
        },
        external(
            "EXTERNAL bitcoin",
            Network::Bitcoin,
            "did:btcr2:x1qqqqzqsrqszsvpcgpy9qkrqdpc83qygjzv2p29shrqv35xcur50p7xgdez8",
        ),
        external(
            "EXTERNAL regtest",
            Network::Regtest,
            "did:btcr2:x1qgqqzqsrqszsvpcgpy9qkrqdpc83qygjzv2p29shrqv35xcur50p7mlwwyq",
        ),
    ]
}

/// Check every vector in both directions.
///
/// Returns `(name, passed, detail)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let components = v.components();
            let encoded = components.encode();
            let decoded = IdentifierComponents::decode(v.did);

            let passed = encoded.as_deref() == Ok(v.did) && decoded.as_ref() == Ok(&components);
            let detail = match (encoded, decoded) {
                (Ok(did), Ok(_)) => did,
                (Err(e), _) | (_, Err(e)) => e.to_string(),
            };
            (v.name.to_string(), passed, detail)
        })
        .collect()
}
