//! Update validation: the authentication gate between a candidate update
//! and the document it claims to modify.

use crate::document::DidDocument;
use crate::error::{CoreError, SignalRejected};
use crate::proof::{
    Bip340JcsSuite, CryptoSuite, CAPABILITY_ACTION_WRITE, CAPABILITY_INVOCATION,
    DATA_INTEGRITY_PROOF,
};
use crate::types::ContentHash;
use crate::update::{root_capability, SignedUpdate};
use crate::patch::apply_patch;

/// The outcome of an accepted update.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedUpdate {
    /// The patched document.
    pub document: DidDocument,
    /// `current_version_id + 1`.
    pub version_id: u64,
    /// Canonical hash of the accepted update.
    pub update_hash: ContentHash,
}

/// Validates candidate updates against the current document.
#[derive(Debug, Clone, Default)]
pub struct UpdateValidator<S = Bip340JcsSuite> {
    suite: S,
}

impl UpdateValidator {
    /// A validator for the `bip340-jcs-2025` cryptosuite.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: CryptoSuite> UpdateValidator<S> {
    /// A validator using a specific cryptosuite.
    pub fn with_suite(suite: S) -> Self {
        Self { suite }
    }

    /// Apply `candidate` to `current`, or explain why it was rejected.
    ///
    /// Checks run in a fixed order; the first failure wins:
    /// 1. The current document is not deactivated
    /// 2. `sourceVersionId` equals the current version
    /// 3. `sourceHash` equals the hash of the current document
    /// 4. The proof is a capability invocation by a method in the current
    ///    `capabilityInvocation` set
    /// 5. The signature verifies
    /// 6. The patch applies and yields a valid document with the same id
    /// 7. `targetHash` equals the hash of the patched document
    pub fn apply(
        &self,
        current: &DidDocument,
        current_version_id: u64,
        candidate: &SignedUpdate,
        did: &str,
    ) -> Result<AppliedUpdate, SignalRejected> {
        if current.is_deactivated() {
            return Err(SignalRejected::AlreadyDeactivated);
        }

        if candidate.source_version_id != current_version_id {
            return Err(SignalRejected::StaleVersion {
                expected: current_version_id,
                got: candidate.source_version_id,
            });
        }

        let source_hash = current.hash().map_err(canonicalization)?;
        if candidate.source_hash != source_hash {
            return Err(SignalRejected::SourceHashMismatch {
                expected: source_hash,
                got: candidate.source_hash,
            });
        }

        let proof = &candidate.proof;
        if proof.proof_type != DATA_INTEGRITY_PROOF
            || proof.cryptosuite != self.suite.name()
            || proof.proof_purpose != CAPABILITY_INVOCATION
        {
            return Err(SignalRejected::InvalidProof(format!(
                "unexpected proof {}/{}/{}",
                proof.proof_type, proof.cryptosuite, proof.proof_purpose
            )));
        }
        if let Some(capability) = &proof.capability {
            if *capability != root_capability(did) {
                return Err(SignalRejected::InvalidProof(format!(
                    "capability {capability} is not the root capability of {did}"
                )));
            }
        }
        if let Some(action) = &proof.capability_action {
            if action != CAPABILITY_ACTION_WRITE {
                return Err(SignalRejected::InvalidProof(format!(
                    "unsupported capability action {action}"
                )));
            }
        }

        let vm_id = current.absolute_ref(&proof.verification_method);
        if !current.can_invoke(&vm_id) {
            return Err(SignalRejected::UnauthorizedSigner(vm_id));
        }
        let key = current
            .verification_method(&vm_id)
            .ok_or_else(|| SignalRejected::InvalidProof(format!("{vm_id} is not in the document")))?
            .public_key()
            .map_err(|e| SignalRejected::InvalidProof(e.to_string()))?;

        let unsigned = candidate.unsigned().to_value().map_err(canonicalization)?;
        self.suite
            .verify_proof(&unsigned, proof, &key)
            .map_err(|e| match e {
                CoreError::InvalidSignature => SignalRejected::InvalidSignature,
                CoreError::Canonicalization(msg) => SignalRejected::Canonicalization(msg),
                other => SignalRejected::InvalidProof(other.to_string()),
            })?;

        let patched = apply_patch(current.as_value(), &candidate.patch)?;
        let document = DidDocument::from_value(patched)
            .map_err(|e| SignalRejected::MalformedDocument(e.to_string()))?;
        if document.id() != current.id() {
            return Err(SignalRejected::MalformedDocument(format!(
                "patch changes id to {}",
                document.id()
            )));
        }

        let target_hash = document.hash().map_err(canonicalization)?;
        if candidate.target_hash != target_hash {
            return Err(SignalRejected::TargetHashMismatch {
                expected: candidate.target_hash,
                got: target_hash,
            });
        }

        Ok(AppliedUpdate {
            document,
            version_id: current_version_id + 1,
            update_hash: candidate.hash().map_err(canonicalization)?,
        })
    }
}

fn canonicalization(e: CoreError) -> SignalRejected {
    SignalRejected::Canonicalization(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::genesis::create_deterministic;
    use crate::identifier::Network;
    use crate::patch::PatchOperation;
    use crate::proof::ProofOptions;
    use crate::update::UpdateBuilder;
    use serde_json::json;

    struct Setup {
        did: String,
        doc: DidDocument,
        keypair: Keypair,
    }

    fn setup() -> Setup {
        let keypair = Keypair::from_secret_bytes(&[0x42; 32]).unwrap();
        let (did, doc) = create_deterministic(&keypair.public_key(), Network::Regtest, 1).unwrap();
        Setup { did, doc, keypair }
    }

    fn add_aka(s: &Setup, version: u64) -> SignedUpdate {
        UpdateBuilder::new(&s.did, &s.doc, version)
            .op(PatchOperation::Add {
                path: "/alsoKnownAs".into(),
                value: json!(["https://example.com"]),
            })
            .sign(&s.keypair)
            .unwrap()
    }

    #[test]
    fn test_valid_update_applies() {
        let s = setup();
        let update = add_aka(&s, 1);

        let applied = UpdateValidator::new().apply(&s.doc, 1, &update, &s.did).unwrap();
        assert_eq!(applied.version_id, 2);
        assert_eq!(applied.update_hash, update.hash().unwrap());
        assert_eq!(applied.document.as_value()["alsoKnownAs"][0], json!("https://example.com"));
        assert_eq!(applied.document.hash().unwrap(), update.target_hash);
    }

    #[test]
    fn test_stale_version() {
        let s = setup();
        let update = add_aka(&s, 1);
        let result = UpdateValidator::new().apply(&s.doc, 2, &update, &s.did);
        assert_eq!(result, Err(SignalRejected::StaleVersion { expected: 2, got: 1 }));
    }

    #[test]
    fn test_source_hash_mismatch() {
        let s = setup();
        let mut update = add_aka(&s, 1);
        update.source_hash = ContentHash::from_bytes([9; 32]);
        let result = UpdateValidator::new().apply(&s.doc, 1, &update, &s.did);
        assert!(matches!(result, Err(SignalRejected::SourceHashMismatch { .. })));
    }

    #[test]
    fn test_unauthorized_signer() {
        let s = setup();
        let mut update = add_aka(&s, 1);
        update.proof.verification_method = format!("{}#someoneElse", s.did);
        let result = UpdateValidator::new().apply(&s.doc, 1, &update, &s.did);
        assert!(matches!(result, Err(SignalRejected::UnauthorizedSigner(_))));
    }

    #[test]
    fn test_tampered_patch_fails_signature() {
        let s = setup();
        let mut update = add_aka(&s, 1);
        update.patch.push(PatchOperation::Add {
            path: "/controller".into(),
            value: json!(["did:example:attacker"]),
        });
        let result = UpdateValidator::new().apply(&s.doc, 1, &update, &s.did);
        assert_eq!(result, Err(SignalRejected::InvalidSignature));
    }

    #[test]
    fn test_wrong_capability() {
        let s = setup();
        let mut update = add_aka(&s, 1);
        update.proof.capability = Some(root_capability("did:btcr2:other"));
        let result = UpdateValidator::new().apply(&s.doc, 1, &update, &s.did);
        assert!(matches!(result, Err(SignalRejected::InvalidProof(_))));
    }

    #[test]
    fn test_target_hash_mismatch_with_valid_signature() {
        let s = setup();
        let builder = UpdateBuilder::new(&s.did, &s.doc, 1).op(PatchOperation::Add {
            path: "/alsoKnownAs".into(),
            value: json!([]),
        });
        let (mut unsigned, _) = builder.build_unsigned().unwrap();
        unsigned.target_hash = ContentHash::from_bytes([7; 32]);

        let options = ProofOptions::new(format!("{}#initialKey", s.did))
            .with_capability(root_capability(&s.did));
        let proof = Bip340JcsSuite
            .create_proof(&unsigned.to_value().unwrap(), &options, &s.keypair)
            .unwrap();
        let update = unsigned.with_proof(proof);

        let result = UpdateValidator::new().apply(&s.doc, 1, &update, &s.did);
        assert!(matches!(result, Err(SignalRejected::TargetHashMismatch { .. })));
    }

    #[test]
    fn test_malformed_patch_with_valid_signature() {
        let s = setup();
        let builder = UpdateBuilder::new(&s.did, &s.doc, 1);
        let (mut unsigned, _) = builder.build_unsigned().unwrap();
        unsigned.patch = vec![PatchOperation::Remove {
            path: "/doesNotExist".into(),
        }];

        let options = ProofOptions::new(format!("{}#initialKey", s.did));
        let proof = Bip340JcsSuite
            .create_proof(&unsigned.to_value().unwrap(), &options, &s.keypair)
            .unwrap();
        let update = unsigned.with_proof(proof);

        let result = UpdateValidator::new().apply(&s.doc, 1, &update, &s.did);
        assert!(matches!(result, Err(SignalRejected::MalformedPatch(_))));
    }

    #[test]
    fn test_deactivated_is_terminal() {
        let s = setup();
        let deactivate = UpdateBuilder::new(&s.did, &s.doc, 1)
            .op(PatchOperation::Add {
                path: "/deactivated".into(),
                value: json!(true),
            })
            .sign(&s.keypair)
            .unwrap();
        let applied = UpdateValidator::new()
            .apply(&s.doc, 1, &deactivate, &s.did)
            .unwrap();
        assert!(applied.document.is_deactivated());

        let next = add_aka(&s, 2);
        let result = UpdateValidator::new().apply(&applied.document, 2, &next, &s.did);
        assert_eq!(result, Err(SignalRejected::AlreadyDeactivated));
    }
}
