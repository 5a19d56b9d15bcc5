//! DID documents.
//!
//! A [`DidDocument`] is an immutable snapshot backed by its JSON value. The
//! JSON is the source of truth: hashes are computed over it, and patches
//! apply to it, so members this crate does not model survive untouched.
//! Typed views ([`VerificationMethod`], [`Service`], [`BeaconService`]) are
//! parsed on demand.

use bitcoin::address::{Address, NetworkUnchecked};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::canonical::canonical_hash;
use crate::crypto::PublicKey;
use crate::error::{CoreError, Result};
use crate::identifier::Network;
use crate::types::ContentHash;

/// W3C DID core context.
pub const DID_CONTEXT_V1: &str = "https://www.w3.org/ns/did/v1";

/// did:btcr2 method context.
pub const BTCR2_CONTEXT_V1: &str = "https://btcr2.dev/context/v1";

/// Verification relationships a method can be referenced from.
pub const RELATIONSHIPS: [&str; 4] = [
    "authentication",
    "assertionMethod",
    "capabilityInvocation",
    "capabilityDelegation",
];

/// An immutable DID document snapshot.
///
/// Cloning is cheap; a patch always produces a new snapshot.
#[derive(Clone, PartialEq)]
pub struct DidDocument(Arc<Value>);

impl DidDocument {
    /// Validate and wrap a JSON value.
    ///
    /// The value must be an object with a string `id`, and every
    /// verification method must carry a unique id.
    pub fn from_value(value: Value) -> Result<Self> {
        validate(&value)?;
        Ok(Self(Arc::new(value)))
    }

    /// Parse from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| CoreError::MalformedDocument(e.to_string()))?;
        Self::from_value(value)
    }

    /// The underlying JSON.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Take the underlying JSON.
    pub fn into_value(self) -> Value {
        Arc::try_unwrap(self.0).unwrap_or_else(|shared| (*shared).clone())
    }

    /// The document's `id`.
    pub fn id(&self) -> &str {
        // Checked by `validate`.
        self.0.get("id").and_then(Value::as_str).unwrap_or_default()
    }

    /// Canonical hash of this document.
    pub fn hash(&self) -> Result<ContentHash> {
        canonical_hash(&*self.0)
    }

    /// Whether the document carries `"deactivated": true`.
    pub fn is_deactivated(&self) -> bool {
        self.0.get("deactivated").and_then(Value::as_bool).unwrap_or(false)
    }

    /// Resolve a possibly relative reference (`#frag`) against the document id.
    pub fn absolute_ref(&self, reference: &str) -> String {
        absolute_ref(self.id(), reference)
    }

    /// All verification methods, including those embedded in relationships.
    pub fn verification_methods(&self) -> Vec<VerificationMethod> {
        let id = self.id();
        let mut methods: Vec<VerificationMethod> = array(&self.0, "verificationMethod")
            .iter()
            .filter_map(|v| VerificationMethod::parse(v, id))
            .collect();

        for rel in RELATIONSHIPS {
            for entry in array(&self.0, rel) {
                if entry.is_object() {
                    if let Some(vm) = VerificationMethod::parse(entry, id) {
                        methods.push(vm);
                    }
                }
            }
        }
        methods
    }

    /// Look up a verification method by (absolute or relative) id.
    pub fn verification_method(&self, reference: &str) -> Option<VerificationMethod> {
        let wanted = self.absolute_ref(reference);
        self.verification_methods().into_iter().find(|vm| vm.id == wanted)
    }

    /// Absolute ids referenced from a verification relationship.
    pub fn relationship(&self, name: &str) -> Vec<String> {
        let id = self.id();
        array(&self.0, name)
            .iter()
            .filter_map(|entry| match entry {
                Value::String(s) => Some(absolute_ref(id, s)),
                Value::Object(obj) => obj.get("id").and_then(Value::as_str).map(|s| absolute_ref(id, s)),
                _ => None,
            })
            .collect()
    }

    /// Whether `reference` may sign updates (is in `capabilityInvocation`).
    pub fn can_invoke(&self, reference: &str) -> bool {
        let wanted = self.absolute_ref(reference);
        self.relationship("capabilityInvocation").iter().any(|r| *r == wanted)
    }

    /// All services.
    pub fn services(&self) -> Vec<Service> {
        let id = self.id();
        array(&self.0, "service")
            .iter()
            .filter_map(|v| Service::parse(v, id))
            .collect()
    }

    /// Services whose type is a known beacon type.
    pub fn beacon_services(&self) -> Vec<BeaconService> {
        self.services()
            .into_iter()
            .filter_map(|s| BeaconService::try_from(s).ok())
            .collect()
    }
}

impl fmt::Debug for DidDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DidDocument").field(&self.id()).finish()
    }
}

impl TryFrom<Value> for DidDocument {
    type Error = CoreError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

impl From<DidDocument> for Value {
    fn from(doc: DidDocument) -> Self {
        doc.into_value()
    }
}

impl Serialize for DidDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DidDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

fn array<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn absolute_ref(id: &str, reference: &str) -> String {
    if reference.starts_with('#') {
        format!("{id}{reference}")
    } else {
        reference.to_string()
    }
}

fn validate(value: &Value) -> Result<()> {
    let obj = value
        .as_object()
        .ok_or_else(|| CoreError::MalformedDocument("document must be a JSON object".into()))?;

    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::MalformedDocument("missing string id".into()))?;

    if let Some(deactivated) = obj.get("deactivated") {
        if !deactivated.is_boolean() {
            return Err(CoreError::MalformedDocument("deactivated must be a boolean".into()));
        }
    }

    for key in std::iter::once("verificationMethod")
        .chain(RELATIONSHIPS)
        .chain(std::iter::once("service"))
    {
        if let Some(v) = obj.get(key) {
            if !v.is_array() {
                return Err(CoreError::MalformedDocument(format!("{key} must be an array")));
            }
        }
    }

    let mut seen = HashSet::new();
    for vm in array(value, "verificationMethod") {
        let vm_id = vm
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::MalformedDocument("verification method without id".into()))?;
        if vm.get("type").and_then(Value::as_str).is_none() {
            return Err(CoreError::MalformedDocument(format!(
                "verification method {vm_id} has no type"
            )));
        }
        if !seen.insert(absolute_ref(id, vm_id)) {
            return Err(CoreError::MalformedDocument(format!(
                "duplicate verification method {vm_id}"
            )));
        }
    }

    Ok(())
}

/// A verification method entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    pub id: String,
    #[serde(rename = "type")]
    pub method_type: String,
    pub controller: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_multibase: Option<String>,
}

impl VerificationMethod {
    /// A Multikey method for a secp256k1 key.
    pub fn multikey(id: impl Into<String>, controller: impl Into<String>, key: &PublicKey) -> Self {
        Self {
            id: id.into(),
            method_type: "Multikey".into(),
            controller: controller.into(),
            public_key_multibase: Some(key.to_multikey()),
        }
    }

    fn parse(value: &Value, doc_id: &str) -> Option<Self> {
        let mut vm: VerificationMethod = serde_json::from_value(value.clone()).ok()?;
        vm.id = absolute_ref(doc_id, &vm.id);
        Some(vm)
    }

    /// The secp256k1 key carried in `publicKeyMultibase`.
    pub fn public_key(&self) -> Result<PublicKey> {
        let multibase = self.public_key_multibase.as_deref().ok_or_else(|| {
            CoreError::MalformedDocument(format!("{} has no publicKeyMultibase", self.id))
        })?;
        PublicKey::from_multikey(multibase)
    }
}

/// A service entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    #[serde(rename = "type")]
    pub service_type: String,
    pub service_endpoint: Value,
}

impl Service {
    fn parse(value: &Value, doc_id: &str) -> Option<Self> {
        let mut service: Service = serde_json::from_value(value.clone()).ok()?;
        service.id = absolute_ref(doc_id, &service.id);
        Some(service)
    }
}

/// The closed set of beacon kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BeaconType {
    /// One update per signal, signal bytes are the update hash.
    #[serde(rename = "SingletonBeacon")]
    Singleton,
    /// Signal bytes are the hash of a content-addressed announcement map.
    #[serde(rename = "CIDAggregateBeacon")]
    CidAggregate,
    /// Signal bytes are a sparse Merkle tree root.
    #[serde(rename = "SMTAggregateBeacon")]
    SmtAggregate,
}

impl BeaconType {
    /// The service `type` string.
    pub fn as_str(self) -> &'static str {
        match self {
            BeaconType::Singleton => "SingletonBeacon",
            BeaconType::CidAggregate => "CIDAggregateBeacon",
            BeaconType::SmtAggregate => "SMTAggregateBeacon",
        }
    }
}

impl fmt::Display for BeaconType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BeaconType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SingletonBeacon" => Ok(BeaconType::Singleton),
            "CIDAggregateBeacon" => Ok(BeaconType::CidAggregate),
            "SMTAggregateBeacon" => Ok(BeaconType::SmtAggregate),
            other => Err(CoreError::MalformedDocument(format!("unknown beacon type {other}"))),
        }
    }
}

/// A service that announces updates through a Bitcoin address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconService {
    pub id: String,
    pub beacon_type: BeaconType,
    /// `bitcoin:<address>[?params]`
    pub service_endpoint: String,
}

impl BeaconService {
    /// Build a beacon service for an address.
    pub fn new(id: impl Into<String>, beacon_type: BeaconType, address: &Address) -> Self {
        Self {
            id: id.into(),
            beacon_type,
            service_endpoint: format!("bitcoin:{address}"),
        }
    }

    /// Decode the endpoint to an address valid on `network`.
    pub fn address(&self, network: Network) -> Result<Address> {
        let rest = self
            .service_endpoint
            .strip_prefix("bitcoin:")
            .ok_or_else(|| CoreError::InvalidAddress(self.service_endpoint.clone()))?;
        let addr = rest.split('?').next().unwrap_or_default();

        Address::<NetworkUnchecked>::from_str(addr)
            .map_err(|e| CoreError::InvalidAddress(format!("{addr}: {e}")))?
            .require_network(network.bitcoin_network())
            .map_err(|e| CoreError::InvalidAddress(format!("{addr}: {e}")))
    }

    /// JSON form of this service.
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "type": self.beacon_type.as_str(),
            "serviceEndpoint": self.service_endpoint,
        })
    }
}

impl TryFrom<Service> for BeaconService {
    type Error = CoreError;

    fn try_from(service: Service) -> Result<Self> {
        let beacon_type = service.service_type.parse()?;
        let endpoint = service.service_endpoint.as_str().ok_or_else(|| {
            CoreError::InvalidAddress(format!("{} endpoint is not a string", service.id))
        })?;
        Ok(Self {
            id: service.id,
            beacon_type,
            service_endpoint: endpoint.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use serde_json::json;

    fn sample(key: &PublicKey) -> Value {
        json!({
            "id": "did:btcr2:test",
            "verificationMethod": [{
                "id": "#key-1",
                "type": "Multikey",
                "controller": "did:btcr2:test",
                "publicKeyMultibase": key.to_multikey(),
            }],
            "authentication": ["#key-1"],
            "capabilityInvocation": ["did:btcr2:test#key-1"],
            "service": [
                {"id": "#beacon", "type": "SingletonBeacon",
                 "serviceEndpoint": "bitcoin:bcrt1qw508d6qejxtdg4y5r3zarvary0c5xw7kygt080"},
                {"id": "#hub", "type": "LinkedDomains", "serviceEndpoint": "https://example.com"}
            ],
            "extra": {"kept": true}
        })
    }

    #[test]
    fn test_relative_ids_resolve_against_document() {
        let key = Keypair::generate().public_key();
        let doc = DidDocument::from_value(sample(&key)).unwrap();

        let vm = doc.verification_method("#key-1").unwrap();
        assert_eq!(vm.id, "did:btcr2:test#key-1");
        assert_eq!(vm.public_key().unwrap(), key);
        assert!(doc.can_invoke("#key-1"));
        assert!(doc.can_invoke("did:btcr2:test#key-1"));
        assert!(!doc.can_invoke("#key-2"));
    }

    #[test]
    fn test_beacon_services_filter_by_type() {
        let key = Keypair::generate().public_key();
        let doc = DidDocument::from_value(sample(&key)).unwrap();

        assert_eq!(doc.services().len(), 2);
        let beacons = doc.beacon_services();
        assert_eq!(beacons.len(), 1);
        assert_eq!(beacons[0].beacon_type, BeaconType::Singleton);
        assert_eq!(beacons[0].id, "did:btcr2:test#beacon");
        assert!(beacons[0].address(Network::Regtest).is_ok());
        assert!(beacons[0].address(Network::Bitcoin).is_err());
    }

    #[test]
    fn test_unknown_members_survive() {
        let key = Keypair::generate().public_key();
        let doc = DidDocument::from_value(sample(&key)).unwrap();
        assert_eq!(doc.as_value()["extra"]["kept"], json!(true));
    }

    #[test]
    fn test_rejects_duplicate_methods() {
        let value = json!({
            "id": "did:btcr2:test",
            "verificationMethod": [
                {"id": "#k", "type": "Multikey", "controller": "did:btcr2:test"},
                {"id": "did:btcr2:test#k", "type": "Multikey", "controller": "did:btcr2:test"}
            ]
        });
        assert!(matches!(
            DidDocument::from_value(value),
            Err(CoreError::MalformedDocument(_))
        ));
    }

    #[test]
    fn test_rejects_missing_id() {
        assert!(DidDocument::from_value(json!({"service": []})).is_err());
        assert!(DidDocument::from_value(json!([1, 2])).is_err());
    }

    #[test]
    fn test_deactivated_flag() {
        let doc = DidDocument::from_value(json!({"id": "did:btcr2:x", "deactivated": true})).unwrap();
        assert!(doc.is_deactivated());
        assert!(DidDocument::from_value(json!({"id": "did:btcr2:x", "deactivated": "yes"})).is_err());
    }

    #[test]
    fn test_endpoint_query_is_ignored() {
        let service = BeaconService {
            id: "did:btcr2:x#b".into(),
            beacon_type: BeaconType::CidAggregate,
            service_endpoint: "bitcoin:bcrt1qw508d6qejxtdg4y5r3zarvary0c5xw7kygt080?label=agg".into(),
        };
        assert!(service.address(Network::Regtest).is_ok());
    }

    #[test]
    fn test_serde_roundtrip_preserves_hash() {
        let key = Keypair::generate().public_key();
        let doc = DidDocument::from_value(sample(&key)).unwrap();
        let json = serde_json::to_string(&doc).unwrap();
        let back: DidDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(doc.hash().unwrap(), back.hash().unwrap());
    }
}
