//! Beacon signals and their decoding into candidate updates.
//!
//! A signal is a transaction spending from a beacon address. Its last
//! OP_RETURN output carries 32 bytes; what those bytes mean depends on the
//! beacon type:
//!
//! | Beacon          | Signal bytes                  | Lookup                                   |
//! |-----------------|-------------------------------|------------------------------------------|
//! | Singleton       | update hash                   | sidecar update                           |
//! | CID aggregate   | hash of a CAS announcement    | announcement[did], then sidecar update   |
//! | SMT aggregate   | SMT root                      | verified proof's `updateId`, then update |

use bitcoin::script::Instruction;
use bitcoin::{Address, ScriptBuf, Transaction, Txid};
use btcr2_core::{BeaconType, ContentHash, SignedUpdate};
use tracing::debug;

use crate::sidecar::SidecarIndex;

/// A transaction that spent from a watched beacon address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconSignal {
    pub beacon_id: String,
    pub beacon_type: BeaconType,
    pub beacon_address: Address,
    pub txid: Txid,
    pub tx: Transaction,
    pub block_height: u64,
    /// Block header timestamp (Unix seconds).
    pub block_time: u64,
    /// Position of the transaction in its block.
    pub tx_index: usize,
}

impl BeaconSignal {
    /// The 32 bytes this signal announces.
    pub fn bytes(&self) -> Option<ContentHash> {
        signal_bytes(&self.tx)
    }
}

/// The 32-byte push of the last OP_RETURN output, if any.
pub fn signal_bytes(tx: &Transaction) -> Option<ContentHash> {
    let script = tx
        .output
        .iter()
        .rev()
        .map(|out| &out.script_pubkey)
        .find(|s| s.is_op_return())?;

    script.instructions().skip(1).find_map(|ins| match ins {
        Ok(Instruction::PushBytes(push)) => ContentHash::try_from(push.as_bytes()).ok(),
        _ => None,
    })
}

/// An OP_RETURN script announcing `bytes`.
pub fn signal_script(bytes: &ContentHash) -> ScriptBuf {
    ScriptBuf::new_op_return(*bytes.as_bytes())
}

/// Resolve a signal to the candidate update it announces for `did`.
///
/// `None` when the signal carries no bytes or the sidecar lacks what the
/// bytes point at. Neither is an error: the signal is simply skipped.
pub fn decode_signal(
    signal: &BeaconSignal,
    did: &str,
    sidecar: &SidecarIndex,
) -> Option<SignedUpdate> {
    let Some(bytes) = signal.bytes() else {
        debug!(txid = %signal.txid, "signal has no OP_RETURN payload");
        return None;
    };

    let update_hash = match signal.beacon_type {
        BeaconType::Singleton => bytes,
        BeaconType::CidAggregate => {
            let announcement = sidecar.announcement(&bytes).or_else(|| {
                debug!(txid = %signal.txid, cid = %bytes, "no CAS announcement in sidecar");
                None
            })?;
            announcement.get(did).or_else(|| {
                debug!(txid = %signal.txid, did, "CAS announcement has no entry for identifier");
                None
            })?
        }
        BeaconType::SmtAggregate => {
            let proof = sidecar.smt_proof(&bytes).or_else(|| {
                debug!(txid = %signal.txid, root = %bytes, "no SMT proof in sidecar");
                None
            })?;
            match proof.verify(did) {
                Ok(Some(update_id)) => update_id,
                Ok(None) => {
                    debug!(txid = %signal.txid, did, "SMT proof shows no update for identifier");
                    return None;
                }
                Err(e) => {
                    tracing::warn!(txid = %signal.txid, error = %e, "SMT proof does not verify");
                    return None;
                }
            }
        }
    };

    let update = sidecar.update(&update_hash).cloned();
    if update.is_none() {
        debug!(txid = %signal.txid, update = %update_hash, "update not in sidecar");
    }
    update
}
