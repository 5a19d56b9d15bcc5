//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::{Map, Value};

use btcr2_core::{ContentHash, IdType, IdentifierComponents, Keypair, Network};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_filter_map("valid secret key", |seed| {
        Keypair::from_secret_bytes(&seed).ok()
    })
}

/// Generate a network.
pub fn network() -> impl Strategy<Value = Network> {
    prop::sample::select(Network::ALL.to_vec())
}

/// Generate an identifier version.
pub fn version() -> impl Strategy<Value = u8> {
    1u8..=16
}

/// Generate a random ContentHash.
pub fn content_hash() -> impl Strategy<Value = ContentHash> {
    any::<[u8; 32]>().prop_map(ContentHash::from_bytes)
}

/// Generate valid identifier components of either type.
pub fn identifier_components() -> impl Strategy<Value = IdentifierComponents> {
    prop_oneof![
        (keypair(), network(), version()).prop_map(|(kp, network, version)| {
            IdentifierComponents {
                id_type: IdType::Key,
                version,
                network,
                genesis_bytes: kp.public_key().as_bytes().to_vec(),
            }
        }),
        (content_hash(), network(), version()).prop_map(|(hash, network, version)| {
            IdentifierComponents {
                id_type: IdType::External,
                version,
                network,
                genesis_bytes: hash.as_bytes().to_vec(),
            }
        }),
    ]
}

/// Generate an object key, including characters that need escaping in a
/// JSON pointer.
pub fn json_key() -> impl Strategy<Value = String> {
    "[a-z~/]{1,6}".prop_map(String::from)
}

/// Generate an arbitrary JSON value of bounded size.
pub fn json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(Value::from),
        "[a-z0-9 ]{0,8}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map(json_key(), inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<String, Value>>())),
        ]
    })
}

/// Generate a JSON object, the shape every patched document has.
pub fn json_object() -> impl Strategy<Value = Value> {
    prop::collection::btree_map(json_key(), json_value(), 0..5)
        .prop_map(|m| Value::Object(m.into_iter().collect()))
}
