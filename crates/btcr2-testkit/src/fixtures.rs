//! Test fixtures and helpers.
//!
//! A [`TestFixture`] is one identity on an in-memory regtest chain, with
//! helpers to fund its beacons and mine signals.

use std::sync::Arc;

use bitcoin::absolute::LockTime;
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use btcr2_beacon::{signal_script, Beacon, BeaconRegistry, SidecarData};
use btcr2_core::{
    apply_patch, create_deterministic, create_external, intermediate_document, ContentHash,
    DidDocument, Keypair, Network, PatchOperation, PublicKey, SignedUpdate, UpdateBuilder,
};
use btcr2_ledger::MemoryLedger;

/// Block time of the first block a fixture mines, minus one spacing.
pub const START_TIME: u64 = 1_700_000_000;

/// Seconds between blocks a fixture mines.
pub const BLOCK_SPACING: u64 = 600;

/// An identity, its chain, and its sidecar.
pub struct TestFixture {
    pub keypair: Keypair,
    pub network: Network,
    pub did: String,
    /// Genesis document (version 1).
    pub genesis: DidDocument,
    pub ledger: Arc<MemoryLedger>,
    pub sidecar: SidecarData,
    clock: u64,
    funding_tag: u32,
}

impl TestFixture {
    /// A KEY identifier with a random keypair.
    pub fn new() -> Self {
        Self::from_keypair(Keypair::generate())
    }

    /// A KEY identifier with a deterministic keypair.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self::from_keypair(Keypair::from_secret_bytes(&seed).expect("seed is a valid secret key"))
    }

    /// An EXTERNAL identifier. The sidecar carries the intermediate document.
    pub fn external() -> Self {
        let keypair = Keypair::generate();
        let network = Network::Regtest;
        let intermediate = intermediate_document(&keypair.public_key(), network)
            .expect("intermediate document");
        let (did, genesis) = create_external(&intermediate, network, 1).expect("external identifier");

        Self {
            keypair,
            network,
            did,
            genesis,
            ledger: Arc::new(MemoryLedger::new()),
            sidecar: SidecarData::new().with_genesis_document(intermediate),
            clock: START_TIME,
            funding_tag: 0,
        }
    }

    fn from_keypair(keypair: Keypair) -> Self {
        let network = Network::Regtest;
        let (did, genesis) =
            create_deterministic(&keypair.public_key(), network, 1).expect("KEY identifier");
        Self {
            keypair,
            network,
            did,
            genesis,
            ledger: Arc::new(MemoryLedger::new()),
            sidecar: SidecarData::new(),
            clock: START_TIME,
            funding_tag: 0,
        }
    }

    /// Share another fixture's chain.
    pub fn on_ledger(mut self, ledger: Arc<MemoryLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    /// Time of the last block this fixture mined.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Chain
    // ─────────────────────────────────────────────────────────────────────────

    /// Mine a block holding `transactions`; returns its height.
    pub fn mine(&mut self, transactions: Vec<Transaction>) -> u64 {
        self.clock += BLOCK_SPACING;
        self.ledger
            .mine_block(self.clock, transactions)
            .expect("memory ledger accepts blocks")
    }

    /// Mine `count` empty blocks; returns the new tip.
    pub fn mine_empty(&mut self, count: u64) -> u64 {
        let mut height = 0;
        for _ in 0..count {
            height = self.mine(Vec::new());
        }
        height
    }

    /// Create an output locked to `script`. Mines one block.
    pub fn fund(&mut self, script: ScriptBuf) -> OutPoint {
        self.funding_tag += 1;
        let tx = funding_transaction(script, self.funding_tag);
        let outpoint = OutPoint::new(tx.compute_txid(), 0);
        self.mine(vec![tx]);
        outpoint
    }

    /// Spend `outpoints` in a transaction committing to `bytes`. Mines one
    /// block and returns its height and the signal's txid.
    pub fn publish(&mut self, outpoints: &[OutPoint], bytes: &ContentHash) -> (u64, Txid) {
        let tx = signal_transaction(outpoints, bytes);
        let txid = tx.compute_txid();
        (self.mine(vec![tx]), txid)
    }

    /// The beacon `fragment` of `document`.
    pub fn beacon(&self, document: &DidDocument, fragment: &str) -> Beacon {
        BeaconRegistry::from_document(document, self.network)
            .get(&document.absolute_ref(fragment))
            .cloned()
            .expect("beacon present in document")
    }

    /// Fund then spend beacon `fragment` of `document`, committing to
    /// `bytes`. Mines two blocks; returns the height of the signal.
    pub fn announce(&mut self, document: &DidDocument, fragment: &str, bytes: &ContentHash) -> u64 {
        let beacon = self.beacon(document, fragment);
        let outpoint = self.fund(beacon.script_pubkey);
        self.publish(&[outpoint], bytes).0
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Updates
    // ─────────────────────────────────────────────────────────────────────────

    /// Sign `patch` against `source` with the fixture's key.
    pub fn sign_update(
        &self,
        source: &DidDocument,
        source_version_id: u64,
        patch: Vec<PatchOperation>,
    ) -> SignedUpdate {
        UpdateBuilder::new(&self.did, source, source_version_id)
            .patch(patch)
            .sign(&self.keypair)
            .expect("fixture key can sign")
    }

    /// Sign an update, add it to the sidecar, and announce it through the
    /// singleton beacon `fragment` of `source`.
    ///
    /// Returns the update and the document it produces.
    pub fn publish_update(
        &mut self,
        source: &DidDocument,
        source_version_id: u64,
        patch: Vec<PatchOperation>,
        fragment: &str,
    ) -> (SignedUpdate, DidDocument) {
        let update = self.sign_update(source, source_version_id, patch);
        let hash = update.hash().expect("update hashes");
        self.sidecar.push_update(&update);
        self.announce(source, fragment, &hash);
        let document = patched(source, &update.patch);
        (update, document)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// `source` with `patch` applied.
pub fn patched(source: &DidDocument, patch: &[PatchOperation]) -> DidDocument {
    let value = apply_patch(source.as_value(), patch).expect("patch applies");
    DidDocument::from_value(value).expect("patched document is valid")
}

/// A coinbase-like transaction paying to `script`. `tag` keeps txids
/// unique.
pub fn funding_transaction(script: ScriptBuf, tag: u32) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::null(),
            script_sig: ScriptBuf::from_bytes(tag.to_le_bytes().to_vec()),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: vec![TxOut {
            value: Amount::from_sat(50_000),
            script_pubkey: script,
        }],
    }
}

/// A transaction spending `inputs` whose only output is an OP_RETURN
/// committing to `bytes`.
pub fn signal_transaction(inputs: &[OutPoint], bytes: &ContentHash) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: inputs
            .iter()
            .map(|outpoint| TxIn {
                previous_output: *outpoint,
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            })
            .collect(),
        output: vec![TxOut {
            value: Amount::ZERO,
            script_pubkey: signal_script(bytes),
        }],
    }
}
