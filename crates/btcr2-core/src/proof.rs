//! Data Integrity proofs with the `bip340-jcs-2025` cryptosuite.
//!
//! The signed message is
//!
//! ```text
//! sha256( sha256(JCS(proofConfig)) || sha256(JCS(document)) )
//! ```
//!
//! where `proofConfig` is the proof without `proofValue`. The outer hash
//! reduces the 64-byte concatenation to the 32-byte digest BIP-340 signs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::canonical::{canonical_hash, sha256_pair};
use crate::crypto::{Keypair, PublicKey, SchnorrSignature};
use crate::error::{CoreError, Result};

/// Proof `type`.
pub const DATA_INTEGRITY_PROOF: &str = "DataIntegrityProof";

/// The one cryptosuite did:btcr2 updates use.
pub const BIP340_JCS_2025: &str = "bip340-jcs-2025";

/// Updates are authorized as capability invocations.
pub const CAPABILITY_INVOCATION: &str = "capabilityInvocation";

/// The action a root capability grants.
pub const CAPABILITY_ACTION_WRITE: &str = "Write";

/// A Data Integrity proof attached to an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataIntegrityProof {
    #[serde(rename = "type")]
    pub proof_type: String,
    pub cryptosuite: String,
    pub verification_method: String,
    pub proof_purpose: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_value: Option<String>,
    /// Members this type does not model (`created`, `domain`, ...). They
    /// are part of the proof configuration the signer hashed.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DataIntegrityProof {
    /// This proof with `proofValue` stripped.
    pub fn config(&self) -> Self {
        Self {
            proof_value: None,
            ..self.clone()
        }
    }
}

/// Options for creating a proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofOptions {
    pub verification_method: String,
    pub capability: Option<String>,
    pub capability_action: Option<String>,
}

impl ProofOptions {
    /// Options for a capability invocation by `verification_method`.
    pub fn new(verification_method: impl Into<String>) -> Self {
        Self {
            verification_method: verification_method.into(),
            capability: None,
            capability_action: None,
        }
    }

    /// Invoke `capability` with the `Write` action.
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capability = Some(capability.into());
        self.capability_action = Some(CAPABILITY_ACTION_WRITE.to_string());
        self
    }

    fn config(&self, cryptosuite: &str) -> DataIntegrityProof {
        DataIntegrityProof {
            proof_type: DATA_INTEGRITY_PROOF.to_string(),
            cryptosuite: cryptosuite.to_string(),
            verification_method: self.verification_method.clone(),
            proof_purpose: CAPABILITY_INVOCATION.to_string(),
            capability: self.capability.clone(),
            capability_action: self.capability_action.clone(),
            proof_value: None,
            extra: Map::new(),
        }
    }
}

/// A cryptosuite that can create and verify Data Integrity proofs.
pub trait CryptoSuite: Send + Sync {
    /// The `cryptosuite` identifier.
    fn name(&self) -> &'static str;

    /// The 32-byte digest signed for `document` under `config`.
    fn hash_data(&self, config: &DataIntegrityProof, document: &Value) -> Result<[u8; 32]>;

    /// Create a proof over `document`.
    fn create_proof(
        &self,
        document: &Value,
        options: &ProofOptions,
        keypair: &Keypair,
    ) -> Result<DataIntegrityProof>;

    /// Verify `proof` over `document` against `key`.
    fn verify_proof(&self, document: &Value, proof: &DataIntegrityProof, key: &PublicKey)
        -> Result<()>;
}

/// BIP-340 Schnorr signatures over JCS-canonicalized JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bip340JcsSuite;

impl CryptoSuite for Bip340JcsSuite {
    fn name(&self) -> &'static str {
        BIP340_JCS_2025
    }

    fn hash_data(&self, config: &DataIntegrityProof, document: &Value) -> Result<[u8; 32]> {
        let config_hash = canonical_hash(&config.config())?;
        let document_hash = canonical_hash(document)?;
        Ok(*sha256_pair(&config_hash, &document_hash).as_bytes())
    }

    fn create_proof(
        &self,
        document: &Value,
        options: &ProofOptions,
        keypair: &Keypair,
    ) -> Result<DataIntegrityProof> {
        let mut proof = options.config(self.name());
        let digest = self.hash_data(&proof, document)?;
        proof.proof_value = Some(keypair.sign(&digest).to_multibase());
        Ok(proof)
    }

    fn verify_proof(
        &self,
        document: &Value,
        proof: &DataIntegrityProof,
        key: &PublicKey,
    ) -> Result<()> {
        if proof.proof_type != DATA_INTEGRITY_PROOF {
            return Err(CoreError::MalformedProof(format!(
                "unexpected proof type {}",
                proof.proof_type
            )));
        }
        if proof.cryptosuite != self.name() {
            return Err(CoreError::MalformedProof(format!(
                "unexpected cryptosuite {}",
                proof.cryptosuite
            )));
        }
        let value = proof
            .proof_value
            .as_deref()
            .ok_or_else(|| CoreError::MalformedProof("missing proofValue".into()))?;
        let signature = SchnorrSignature::from_multibase(value)?;

        let digest = self.hash_data(proof, document)?;
        key.verify(&digest, &signature)
    }
}
