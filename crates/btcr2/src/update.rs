//! The write path: sign an update and say what to publish for it.

use bitcoin::ScriptBuf;
use btcr2_beacon::{signal_script, Beacon, BeaconRegistry};
use btcr2_core::{
    BeaconType, ContentHash, DidDocument, IdentifierComponents, Keypair, PatchOperation,
    SignedUpdate, UpdateBuilder,
};

use crate::error::PrepareError;

/// A signed update ready to announce through a singleton beacon.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedUpdate {
    pub update: SignedUpdate,
    /// The 32 bytes the beacon transaction commits to.
    pub update_hash: ContentHash,
    /// The beacon to spend from.
    pub beacon: Beacon,
}

impl PreparedUpdate {
    /// The OP_RETURN output script for the beacon transaction.
    pub fn signal_script(&self) -> ScriptBuf {
        signal_script(&self.update_hash)
    }
}

/// Sign `patch` against `source` and pair it with the beacon that will
/// announce it.
///
/// The beacon must be a singleton beacon of `source` itself, since the
/// resolver watches the beacons of the document the update applies to.
pub fn prepare_update(
    did: &str,
    source: &DidDocument,
    source_version_id: u64,
    patch: Vec<PatchOperation>,
    verification_method_id: &str,
    keypair: &Keypair,
    beacon_id: &str,
) -> Result<PreparedUpdate, PrepareError> {
    let network = IdentifierComponents::decode(did)
        .map_err(btcr2_core::CoreError::from)?
        .network;
    let registry = BeaconRegistry::from_document(source, network);
    let beacon_ref = source.absolute_ref(beacon_id);
    let beacon = registry
        .get(&beacon_ref)
        .cloned()
        .ok_or_else(|| PrepareError::UnknownBeacon(beacon_ref.clone()))?;
    if beacon.beacon_type != BeaconType::Singleton {
        return Err(PrepareError::NotSingleton(beacon_ref));
    }

    let update = UpdateBuilder::new(did, source, source_version_id)
        .patch(patch)
        .verification_method(verification_method_id)
        .sign(keypair)?;
    let update_hash = update.hash()?;

    Ok(PreparedUpdate {
        update,
        update_hash,
        beacon,
    })
}
