//! Sidecar data: the off-chain half of a resolution.
//!
//! Beacon signals carry only 32 bytes. Everything those bytes point at
//! (updates, CAS announcements, SMT proofs, and the EXTERNAL genesis
//! document) arrives alongside the resolution request.

use std::collections::{BTreeMap, HashMap};

use btcr2_core::{canonical_hash, ContentHash, SignedUpdate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::smt::SmtProof;

/// Sidecar data as supplied by the caller.
///
/// Entries are kept as raw JSON so one malformed entry cannot poison the
/// rest; [`SidecarIndex::build`] skips what it cannot parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidecarData {
    /// Intermediate genesis document (EXTERNAL identifiers only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genesis_document: Option<Value>,
    #[serde(default)]
    pub updates: Vec<Value>,
    #[serde(default)]
    pub cas_announcements: Vec<Value>,
    #[serde(default)]
    pub smt_proofs: Vec<Value>,
    /// Height before which no signal can exist for this identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genesis_height: Option<u64>,
}

impl SidecarData {
    /// Empty sidecar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the genesis document.
    pub fn with_genesis_document(mut self, document: Value) -> Self {
        self.genesis_document = Some(document);
        self
    }

    /// Set the genesis height.
    pub fn with_genesis_height(mut self, height: u64) -> Self {
        self.genesis_height = Some(height);
        self
    }

    /// Add a signed update.
    pub fn push_update(&mut self, update: &SignedUpdate) {
        if let Ok(value) = serde_json::to_value(update) {
            self.updates.push(value);
        }
    }

    /// Add a CAS announcement.
    pub fn push_announcement(&mut self, announcement: &CasAnnouncement) {
        if let Ok(value) = serde_json::to_value(announcement) {
            self.cas_announcements.push(value);
        }
    }

    /// Add an SMT proof.
    pub fn push_smt_proof(&mut self, proof: &SmtProof) {
        if let Ok(value) = serde_json::to_value(proof) {
            self.smt_proofs.push(value);
        }
    }
}

/// A CID aggregate announcement: identifier to update hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CasAnnouncement(pub BTreeMap<String, ContentHash>);

impl CasAnnouncement {
    /// An empty announcement.
    pub fn new() -> Self {
        Self::default()
    }

    /// Announce `update_hash` for `did`.
    pub fn insert(&mut self, did: impl Into<String>, update_hash: ContentHash) {
        self.0.insert(did.into(), update_hash);
    }

    /// The update hash announced for `did`.
    pub fn get(&self, did: &str) -> Option<ContentHash> {
        self.0.get(did).copied()
    }

    /// Canonical hash; this is what the beacon publishes.
    pub fn hash(&self) -> btcr2_core::Result<ContentHash> {
        canonical_hash(self)
    }
}

/// Sidecar data indexed by content hash.
#[derive(Debug, Clone, Default)]
pub struct SidecarIndex {
    updates: HashMap<ContentHash, SignedUpdate>,
    announcements: HashMap<ContentHash, CasAnnouncement>,
    smt_proofs: HashMap<ContentHash, SmtProof>,
}

impl SidecarIndex {
    /// Parse and index every entry, skipping malformed ones with a warning.
    pub fn build(data: &SidecarData) -> Self {
        let mut index = Self::default();

        for raw in &data.updates {
            // Keyed by the JSON as supplied; that is what the beacon announced.
            let hashed = serde_json::from_value::<SignedUpdate>(raw.clone())
                .map_err(|e| e.to_string())
                .and_then(|u| canonical_hash(raw).map(|h| (h, u)).map_err(|e| e.to_string()));
            match hashed {
                Ok((hash, update)) => {
                    index.updates.insert(hash, update);
                }
                Err(e) => warn!(error = %e, "skipping malformed sidecar update"),
            }
        }

        for raw in &data.cas_announcements {
            let hashed = serde_json::from_value::<CasAnnouncement>(raw.clone())
                .map_err(|e| e.to_string())
                .and_then(|a| a.hash().map(|h| (h, a)).map_err(|e| e.to_string()));
            match hashed {
                Ok((hash, announcement)) => {
                    index.announcements.insert(hash, announcement);
                }
                Err(e) => warn!(error = %e, "skipping malformed CAS announcement"),
            }
        }

        for raw in &data.smt_proofs {
            match serde_json::from_value::<SmtProof>(raw.clone()) {
                Ok(proof) => {
                    index.smt_proofs.insert(proof.id, proof);
                }
                Err(e) => warn!(error = %e, "skipping malformed SMT proof"),
            }
        }

        index
    }

    /// The update with this hash.
    pub fn update(&self, hash: &ContentHash) -> Option<&SignedUpdate> {
        self.updates.get(hash)
    }

    /// The CAS announcement with this hash.
    pub fn announcement(&self, hash: &ContentHash) -> Option<&CasAnnouncement> {
        self.announcements.get(hash)
    }

    /// The SMT proof for this root.
    pub fn smt_proof(&self, root: &ContentHash) -> Option<&SmtProof> {
        self.smt_proofs.get(root)
    }

    /// Number of indexed updates.
    pub fn update_count(&self) -> usize {
        self.updates.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_camel_case_fields() {
        let data: SidecarData = serde_json::from_value(json!({
            "genesisDocument": {"id": "x"},
            "casAnnouncements": [],
            "smtProofs": [],
            "genesisHeight": 12
        }))
        .unwrap();
        assert!(data.genesis_document.is_some());
        assert!(data.updates.is_empty());
        assert_eq!(data.genesis_height, Some(12));
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let mut announcement = CasAnnouncement::new();
        announcement.insert("did:btcr2:a", ContentHash::from_bytes([1; 32]));

        let mut data = SidecarData::new();
        data.updates.push(json!({"not": "an update"}));
        data.cas_announcements.push(json!("nope"));
        data.push_announcement(&announcement);

        let index = SidecarIndex::build(&data);
        assert_eq!(index.update_count(), 0);
        let hash = announcement.hash().unwrap();
        assert_eq!(
            index.announcement(&hash).unwrap().get("did:btcr2:a"),
            Some(ContentHash::from_bytes([1; 32]))
        );
    }

    #[test]
    fn test_announcement_hash_is_order_independent() {
        let mut a = CasAnnouncement::new();
        a.insert("did:btcr2:b", ContentHash::from_bytes([2; 32]));
        a.insert("did:btcr2:a", ContentHash::from_bytes([1; 32]));

        let b: CasAnnouncement = serde_json::from_str(&format!(
            r#"{{"did:btcr2:a":"{}","did:btcr2:b":"{}"}}"#,
            "01".repeat(32),
            "02".repeat(32)
        ))
        .unwrap();
        assert_eq!(a.hash().unwrap(), b.hash().unwrap());
    }
}
