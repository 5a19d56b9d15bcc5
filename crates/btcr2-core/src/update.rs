//! Updates: authenticated patches from one document version to the next.
//!
//! An update is immutable once signed. The beacon-facing identity of an
//! update is the canonical hash of the whole signed update.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::canonical::canonical_hash;
use crate::crypto::Keypair;
use crate::document::{DidDocument, BTCR2_CONTEXT_V1};
use crate::error::{CoreError, Result};
use crate::patch::{apply_patch, diff, PatchOperation};
use crate::proof::{Bip340JcsSuite, CryptoSuite, DataIntegrityProof, ProofOptions};
use crate::types::ContentHash;

/// JSON-LD contexts carried by every update this crate builds.
pub const UPDATE_CONTEXT: [&str; 4] = [
    "https://w3id.org/security/v2",
    "https://w3id.org/zcap/v1",
    "https://w3id.org/json-ld-patch/v1",
    BTCR2_CONTEXT_V1,
];

/// The root capability for updating `did`.
///
/// `urn:zcap:root:` followed by the identifier with `:` percent-encoded.
pub fn root_capability(did: &str) -> String {
    format!("urn:zcap:root:{}", did.replace(':', "%3A"))
}

/// An update before its proof is attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedUpdate {
    #[serde(rename = "@context", default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
    pub patch: Vec<PatchOperation>,
    pub source_hash: ContentHash,
    pub target_hash: ContentHash,
    pub source_version_id: u64,
    /// Members this type does not model, carried into the signed payload.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UnsignedUpdate {
    /// JSON form, as covered by the proof.
    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| CoreError::Canonicalization(e.to_string()))
    }

    /// Attach a proof.
    pub fn with_proof(self, proof: DataIntegrityProof) -> SignedUpdate {
        SignedUpdate {
            context: self.context,
            patch: self.patch,
            source_hash: self.source_hash,
            target_hash: self.target_hash,
            source_version_id: self.source_version_id,
            proof,
            extra: self.extra,
        }
    }
}

/// An update with its Data Integrity proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUpdate {
    #[serde(rename = "@context", default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
    pub patch: Vec<PatchOperation>,
    pub source_hash: ContentHash,
    pub target_hash: ContentHash,
    pub source_version_id: u64,
    pub proof: DataIntegrityProof,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SignedUpdate {
    /// The update with its proof removed.
    pub fn unsigned(&self) -> UnsignedUpdate {
        UnsignedUpdate {
            context: self.context.clone(),
            patch: self.patch.clone(),
            source_hash: self.source_hash,
            target_hash: self.target_hash,
            source_version_id: self.source_version_id,
            extra: self.extra.clone(),
        }
    }

    /// Canonical hash of the signed update; this is what beacons announce.
    pub fn hash(&self) -> Result<ContentHash> {
        canonical_hash(self)
    }
}

/// Builder for signed updates.
///
/// Mirrors every check the validator performs, so an update this builder
/// signs will be accepted against the same source document and version.
pub struct UpdateBuilder {
    did: String,
    source: DidDocument,
    source_version_id: u64,
    patch: Vec<PatchOperation>,
    verification_method: Option<String>,
}

impl UpdateBuilder {
    /// Start an update of `source`, currently at `source_version_id`.
    pub fn new(did: impl Into<String>, source: &DidDocument, source_version_id: u64) -> Self {
        Self {
            did: did.into(),
            source: source.clone(),
            source_version_id,
            patch: Vec::new(),
            verification_method: None,
        }
    }

    /// Use an explicit patch.
    pub fn patch(mut self, ops: Vec<PatchOperation>) -> Self {
        self.patch = ops;
        self
    }

    /// Derive the patch from a desired target document.
    pub fn target(mut self, target: &DidDocument) -> Self {
        self.patch = diff(self.source.as_value(), target.as_value());
        self
    }

    /// Append one operation.
    pub fn op(mut self, op: PatchOperation) -> Self {
        self.patch.push(op);
        self
    }

    /// Sign with this verification method. Defaults to the first
    /// `capabilityInvocation` entry of the source document.
    pub fn verification_method(mut self, id: impl Into<String>) -> Self {
        self.verification_method = Some(id.into());
        self
    }

    /// Apply the patch and assemble the unsigned update.
    pub fn build_unsigned(&self) -> Result<(UnsignedUpdate, DidDocument)> {
        if self.source.is_deactivated() {
            return Err(CoreError::Deactivated(self.did.clone()));
        }

        let patched = apply_patch(self.source.as_value(), &self.patch)?;
        let target = DidDocument::from_value(patched)?;
        if target.id() != self.source.id() {
            return Err(CoreError::MalformedDocument(format!(
                "patch changes document id from {} to {}",
                self.source.id(),
                target.id()
            )));
        }

        let unsigned = UnsignedUpdate {
            context: UPDATE_CONTEXT.iter().map(|s| s.to_string()).collect(),
            patch: self.patch.clone(),
            source_hash: self.source.hash()?,
            target_hash: target.hash()?,
            source_version_id: self.source_version_id,
            extra: Map::new(),
        };
        Ok((unsigned, target))
    }

    /// Build and sign the update.
    pub fn sign(self, keypair: &Keypair) -> Result<SignedUpdate> {
        let (unsigned, _) = self.build_unsigned()?;

        let vm_id = match &self.verification_method {
            Some(id) => self.source.absolute_ref(id),
            None => self
                .source
                .relationship("capabilityInvocation")
                .into_iter()
                .next()
                .ok_or_else(|| CoreError::VerificationMethodNotFound("capabilityInvocation".into()))?,
        };

        let vm = self
            .source
            .verification_method(&vm_id)
            .ok_or_else(|| CoreError::VerificationMethodNotFound(vm_id.clone()))?;
        if !self.source.can_invoke(&vm_id) {
            return Err(CoreError::Unauthorized(vm_id));
        }
        if vm.public_key()? != keypair.public_key() {
            return Err(CoreError::KeyMismatch(vm_id));
        }

        let options = ProofOptions::new(vm_id).with_capability(root_capability(&self.did));
        let proof = Bip340JcsSuite.create_proof(&unsigned.to_value()?, &options, keypair)?;

        Ok(unsigned.with_proof(proof))
    }
}

/// Construct and sign an update in one call.
pub fn construct(
    identifier: &str,
    source: &DidDocument,
    source_version_id: u64,
    patch: Vec<PatchOperation>,
    verification_method_id: &str,
    keypair: &Keypair,
) -> Result<SignedUpdate> {
    UpdateBuilder::new(identifier, source, source_version_id)
        .patch(patch)
        .verification_method(verification_method_id)
        .sign(keypair)
}
