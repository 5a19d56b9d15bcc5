//! Genesis documents: the version-1 document every resolution starts from.
//!
//! - KEY identifiers derive it deterministically from the genesis key.
//! - EXTERNAL identifiers carry its hash; the document itself arrives in
//!   sidecar data and must hash to the identifier's genesis bytes.

use bitcoin::{Address, CompressedPublicKey};
use serde_json::{json, Value};

use crate::canonical::canonical_hash;
use crate::crypto::{secp, PublicKey};
use crate::document::{BeaconService, BeaconType, DidDocument, BTCR2_CONTEXT_V1, DID_CONTEXT_V1};
use crate::error::{CoreError, GenesisError, Result};
use crate::identifier::{IdType, IdentifierComponents, Network};

/// Self-reference used inside an intermediate (pre-identifier) document.
///
/// Every string equal to this value, or containing it (for `#fragment`
/// ids), is rewritten to the real identifier once it is known.
pub const PLACEHOLDER_DID: &str =
    "did:btcr2:_______________________________________________________________";

/// The deterministic genesis document of a KEY identifier.
pub fn deterministic_document(components: &IdentifierComponents) -> Result<DidDocument> {
    if components.id_type != IdType::Key {
        return Err(GenesisError::Invalid("not a KEY identifier".into()).into());
    }
    let key = components.public_key().ok_or(CoreError::InvalidPublicKey)?;
    let did = components.encode()?;
    DidDocument::from_value(key_document(&did, &key, components.network)?)
}

/// An intermediate document for `key`, ready to be hashed into an
/// EXTERNAL identifier.
pub fn intermediate_document(key: &PublicKey, network: Network) -> Result<Value> {
    key_document(PLACEHOLDER_DID, key, network)
}

/// The genesis document of an EXTERNAL identifier.
///
/// `genesis` is the sidecar's intermediate document. It must hash to the
/// identifier's genesis bytes.
pub fn external_document(
    components: &IdentifierComponents,
    genesis: Option<&Value>,
) -> std::result::Result<DidDocument, GenesisError> {
    let expected = components
        .genesis_hash()
        .ok_or_else(|| GenesisError::Invalid("not an EXTERNAL identifier".into()))?;
    let intermediate = genesis.ok_or(GenesisError::Missing)?;

    let actual = canonical_hash(intermediate).map_err(|e| GenesisError::Invalid(e.to_string()))?;
    if actual != expected {
        return Err(GenesisError::HashMismatch { expected, actual });
    }

    let did = components
        .encode()
        .map_err(|e| GenesisError::Invalid(e.to_string()))?;
    let document = replace_placeholder(intermediate, &did);
    let document = DidDocument::from_value(document).map_err(|e| GenesisError::Invalid(e.to_string()))?;
    if document.id() != did {
        return Err(GenesisError::Invalid(format!(
            "genesis document id {} is not {did}",
            document.id()
        )));
    }
    Ok(document)
}

/// The genesis document for any identifier.
pub fn initial_document(
    components: &IdentifierComponents,
    genesis: Option<&Value>,
) -> Result<DidDocument> {
    match components.id_type {
        IdType::Key => deterministic_document(components),
        IdType::External => Ok(external_document(components, genesis)?),
    }
}

/// Create a KEY identifier and its genesis document.
pub fn create_deterministic(
    key: &PublicKey,
    network: Network,
    version: u8,
) -> Result<(String, DidDocument)> {
    let components =
        IdentifierComponents::new(IdType::Key, version, network, key.as_bytes().to_vec())?;
    let did = components.encode()?;
    let document = deterministic_document(&components)?;
    Ok((did, document))
}

/// Create an EXTERNAL identifier from an intermediate document.
pub fn create_external(
    intermediate: &Value,
    network: Network,
    version: u8,
) -> Result<(String, DidDocument)> {
    let hash = canonical_hash(intermediate)?;
    let components =
        IdentifierComponents::new(IdType::External, version, network, hash.as_bytes().to_vec())?;
    let did = components.encode()?;
    let document = external_document(&components, Some(intermediate))?;
    Ok((did, document))
}

fn key_document(did: &str, key: &PublicKey, network: Network) -> Result<Value> {
    let vm_id = format!("{did}#initialKey");
    let compressed = CompressedPublicKey(key.inner());
    let net = network.bitcoin_network();

    let beacons = [
        ("#initialP2PKH", Address::p2pkh(compressed.pubkey_hash(), net)),
        ("#initialP2WPKH", Address::p2wpkh(&compressed, net)),
        ("#initialP2TR", Address::p2tr(secp(), key.x_only(), None, net)),
    ];
    let services: Vec<Value> = beacons
        .iter()
        .map(|(fragment, address)| {
            BeaconService::new(format!("{did}{fragment}"), BeaconType::Singleton, address).to_value()
        })
        .collect();

    Ok(json!({
        "@context": [DID_CONTEXT_V1, BTCR2_CONTEXT_V1],
        "id": did,
        "controller": [did],
        "verificationMethod": [{
            "id": vm_id,
            "type": "Multikey",
            "controller": did,
            "publicKeyMultibase": key.to_multikey(),
        }],
        "authentication": [vm_id],
        "assertionMethod": [vm_id],
        "capabilityInvocation": [vm_id],
        "capabilityDelegation": [vm_id],
        "service": services,
    }))
}

fn replace_placeholder(value: &Value, did: &str) -> Value {
    match value {
        Value::String(s) => Value::String(s.replace(PLACEHOLDER_DID, did)),
        Value::Array(items) => Value::Array(items.iter().map(|v| replace_placeholder(v, did)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), replace_placeholder(v, did)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;

    const VECTOR_KEY: &str = "03620d4fb8d5c40b0dc2f9fd84636d85487e51ecf55fbcd5ccf08c6ac148bc8a36";

    #[test]
    fn test_deterministic_document_shape() {
        let key = PublicKey::from_hex(VECTOR_KEY).unwrap();
        let (did, doc) = create_deterministic(&key, Network::Bitcoin, 1).unwrap();

        assert_eq!(
            did,
            "did:btcr2:k1qqpkyr20hr2ugzcdctulmprrdkz5slj3an64l0x4encgc6kpfz7g5dsaaw53r"
        );
        assert_eq!(doc.id(), did);

        let vm = doc.verification_method("#initialKey").unwrap();
        assert_eq!(vm.public_key().unwrap(), key);
        for rel in crate::document::RELATIONSHIPS {
            assert_eq!(doc.relationship(rel), vec![vm.id.clone()], "{rel}");
        }

        let beacons = doc.beacon_services();
        assert_eq!(beacons.len(), 3);
        assert!(beacons.iter().all(|b| b.beacon_type == BeaconType::Singleton));
        assert!(beacons[0].service_endpoint.starts_with("bitcoin:1"));
        assert!(beacons[1].service_endpoint.starts_with("bitcoin:bc1q"));
        assert!(beacons[2].service_endpoint.starts_with("bitcoin:bc1p"));
    }

    #[test]
    fn test_deterministic_document_is_deterministic() {
        let key = Keypair::generate().public_key();
        let (_, a) = create_deterministic(&key, Network::Regtest, 1).unwrap();
        let (_, b) = create_deterministic(&key, Network::Regtest, 1).unwrap();
        assert_eq!(a.hash().unwrap(), b.hash().unwrap());
    }

    #[test]
    fn test_beacon_addresses_follow_network() {
        let key = Keypair::generate().public_key();
        let (_, doc) = create_deterministic(&key, Network::Regtest, 1).unwrap();
        for beacon in doc.beacon_services() {
            assert!(beacon.address(Network::Regtest).is_ok());
        }
        assert!(doc.beacon_services()[1].service_endpoint.starts_with("bitcoin:bcrt1q"));
    }

    #[test]
    fn test_external_roundtrip() {
        let key = Keypair::generate().public_key();
        let intermediate = intermediate_document(&key, Network::Signet).unwrap();
        let (did, doc) = create_external(&intermediate, Network::Signet, 1).unwrap();

        assert!(did.starts_with("did:btcr2:x1"));
        assert_eq!(doc.id(), did);
        assert_eq!(
            doc.verification_method("#initialKey").unwrap().id,
            format!("{did}#initialKey")
        );
        assert!(!serde_json::to_string(&doc).unwrap().contains(PLACEHOLDER_DID));
    }

    #[test]
    fn test_external_requires_sidecar() {
        let components = IdentifierComponents::external(
            &crate::types::ContentHash::from_bytes([1; 32]),
            Network::Regtest,
        );
        assert_eq!(external_document(&components, None), Err(GenesisError::Missing));
    }

    #[test]
    fn test_external_hash_mismatch() {
        let key = Keypair::generate().public_key();
        let intermediate = intermediate_document(&key, Network::Regtest).unwrap();
        let hash = canonical_hash(&intermediate).unwrap();
        let components = IdentifierComponents::external(&hash, Network::Regtest);

        let mut tampered = intermediate.clone();
        tampered["controller"] = json!([]);
        assert!(matches!(
            external_document(&components, Some(&tampered)),
            Err(GenesisError::HashMismatch { .. })
        ));
    }

    #[test]
    fn test_initial_document_dispatch() {
        let key = Keypair::generate().public_key();
        let components = IdentifierComponents::key(&key, Network::Mutinynet);
        let doc = initial_document(&components, None).unwrap();
        assert_eq!(doc.id(), components.encode().unwrap());
    }
}
