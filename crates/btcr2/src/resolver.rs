//! The resolution engine.
//!
//! Resolution replays a DID's history from its genesis document:
//!
//! ```text
//! EstablishingGenesis ──► Traversing ──┬──► TargetReached  (range, version or time bound)
//!                                      └──► Terminated     (document deactivated)
//! ```
//!
//! Updates are applied strictly in ledger order, one at a time, each against
//! the document the previous one produced. Blocks may be fetched ahead of
//! that order but never applied out of it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use btcr2_beacon::{
    decode_signal, BeaconRegistry, BeaconSignal, ScanCursor, SidecarData, SidecarIndex,
    SignalScanner,
};
use btcr2_core::{
    initial_document, ContentHash, DidDocument, IdentifierComponents, Network, UpdateValidator,
};
use btcr2_ledger::Ledger;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ResolveError, Result};

/// The only identifier version this resolver implements.
pub const SUPPORTED_VERSION: u8 = 1;

/// Configuration for a [`Resolver`].
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Blocks fetched concurrently ahead of the scan position.
    pub prefetch_window: usize,
    /// Lowest height scanned when the sidecar declares none.
    pub genesis_height: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            prefetch_window: 8,
            genesis_height: 0,
        }
    }
}

/// Cooperative cancellation for an in-flight resolution.
///
/// Checked between transactions. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-call bounds on a resolution.
#[derive(Debug, Clone, Default)]
pub struct ResolutionOptions {
    /// Stop once this version is reached.
    pub version_id: Option<u64>,
    /// Stop before the first signal in a block later than this (Unix seconds).
    pub version_time: Option<u64>,
    /// Last height to scan; clamped to the chain tip.
    pub to_height: Option<u64>,
    pub cancel: Option<CancelToken>,
}

impl ResolutionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version_id(mut self, version_id: u64) -> Self {
        self.version_id = Some(version_id);
        self
    }

    pub fn version_time(mut self, version_time: u64) -> Self {
        self.version_time = Some(version_time);
        self
    }

    pub fn to_height(mut self, height: u64) -> Self {
        self.to_height = Some(height);
        self
    }

    pub fn cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.version_id == Some(0) {
            return Err(ResolveError::InvalidOptions(
                "versionId starts at 1".into(),
            ));
        }
        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    fn version_reached(&self, version_id: u64) -> bool {
        self.version_id.is_some_and(|target| version_id >= target)
    }
}

/// Where a resolution is, or ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolutionState {
    EstablishingGenesis,
    Traversing,
    /// The scan range or a version/time bound was reached.
    TargetReached,
    /// The document was deactivated; nothing after it counts.
    Terminated,
}

/// Metadata returned alongside the resolved document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionMetadata {
    pub version_id: u64,
    /// Height of the last applied update, or the genesis anchor height.
    pub block_height: u64,
    /// Block time of the last applied update; `None` at genesis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_time: Option<u64>,
    pub deactivated: bool,
    pub state: ResolutionState,
    pub update_count: usize,
    pub rejected_count: usize,
    /// A version past the deactivating update was requested.
    pub target_beyond_deactivation: bool,
}

/// Everything needed to continue a resolution where it stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub did: String,
    pub document: DidDocument,
    pub version_id: u64,
    pub cursor: ScanCursor,
    /// Hashes of applied updates, in order.
    pub applied: Vec<ContentHash>,
    pub block_height: u64,
    pub block_time: Option<u64>,
    pub rejected_count: usize,
}

impl Checkpoint {
    fn genesis(did: &str, document: DidDocument, height: u64) -> Self {
        Self {
            did: did.to_string(),
            document,
            version_id: 1,
            cursor: ScanCursor::at_height(height),
            applied: Vec::new(),
            block_height: height,
            block_time: None,
            rejected_count: 0,
        }
    }
}

/// A resolved document.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub document: DidDocument,
    pub metadata: ResolutionMetadata,
    /// Resume point; continuing from it picks up signals mined later.
    pub checkpoint: Checkpoint,
}

/// Resolves `did:btcr2` identifiers against a ledger.
///
/// Holds no per-resolution state; concurrent calls are independent.
pub struct Resolver<L: Ledger> {
    ledger: L,
    config: ResolverConfig,
    validator: UpdateValidator,
}

impl<L: Ledger> Resolver<L> {
    pub fn new(ledger: L, config: ResolverConfig) -> Self {
        Self {
            ledger,
            config,
            validator: UpdateValidator::new(),
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve `did` using the off-chain data in `sidecar`.
    pub async fn resolve(
        &self,
        did: &str,
        sidecar: &SidecarData,
        options: &ResolutionOptions,
    ) -> Result<Resolution> {
        options.validate()?;
        let components = supported_components(did)?;
        debug!(did, state = ?ResolutionState::EstablishingGenesis, "resolving");

        let document = initial_document(&components, sidecar.genesis_document.as_ref())?;
        let from_height = sidecar.genesis_height.unwrap_or(self.config.genesis_height);
        let checkpoint = Checkpoint::genesis(did, document, from_height);

        self.traverse(checkpoint, components.network, sidecar, options)
            .await
    }

    /// Continue from a checkpoint.
    ///
    /// Given the same sidecar and ledger, the result is identical to a
    /// resolution that was never interrupted.
    pub async fn resume(
        &self,
        checkpoint: Checkpoint,
        sidecar: &SidecarData,
        options: &ResolutionOptions,
    ) -> Result<Resolution> {
        options.validate()?;
        let components = supported_components(&checkpoint.did)?;
        self.traverse(checkpoint, components.network, sidecar, options)
            .await
    }

    async fn traverse(
        &self,
        mut cp: Checkpoint,
        network: Network,
        sidecar: &SidecarData,
        options: &ResolutionOptions,
    ) -> Result<Resolution> {
        let tip = self.ledger.tip_height().await?;
        let to_height = options.to_height.map_or(tip, |h| h.min(tip));
        let index = SidecarIndex::build(sidecar);
        let mut registry = BeaconRegistry::from_document(&cp.document, network);
        let mut scanner = SignalScanner::resume(
            &self.ledger,
            cp.cursor,
            to_height,
            self.config.prefetch_window,
        );
        debug!(
            did = %cp.did,
            state = ?ResolutionState::Traversing,
            from = cp.cursor.height,
            to = to_height,
            beacons = registry.len(),
            "traversing"
        );

        let state = loop {
            if options.version_reached(cp.version_id) {
                break ResolutionState::TargetReached;
            }
            if cp.document.is_deactivated() {
                break ResolutionState::Terminated;
            }
            if options.is_cancelled() {
                debug!(did = %cp.did, height = cp.cursor.height, "resolution cancelled");
                return Err(ResolveError::Cancelled(Box::new(cp)));
            }

            let Some(signals) = scanner.next_signals(&registry).await? else {
                cp.cursor = scanner.cursor();
                break ResolutionState::TargetReached;
            };

            if let (Some(limit), Some(first)) = (options.version_time, signals.first()) {
                if first.block_time > limit {
                    cp.cursor = ScanCursor {
                        height: first.block_height,
                        tx_index: first.tx_index,
                    };
                    break ResolutionState::TargetReached;
                }
            }

            for signal in &signals {
                if self.apply_signal(&mut cp, signal, &index) {
                    registry = BeaconRegistry::from_document(&cp.document, network);
                    if options.version_reached(cp.version_id) || cp.document.is_deactivated() {
                        break;
                    }
                }
            }
            cp.cursor = scanner.cursor();
        };

        let metadata = ResolutionMetadata {
            version_id: cp.version_id,
            block_height: cp.block_height,
            block_time: cp.block_time,
            deactivated: cp.document.is_deactivated(),
            state,
            update_count: cp.applied.len(),
            rejected_count: cp.rejected_count,
            target_beyond_deactivation: state == ResolutionState::Terminated
                && options.version_id.is_some_and(|v| v > cp.version_id),
        };
        info!(
            did = %cp.did,
            version_id = metadata.version_id,
            height = metadata.block_height,
            updates = metadata.update_count,
            rejected = metadata.rejected_count,
            state = ?state,
            "resolution complete"
        );

        Ok(Resolution {
            document: cp.document.clone(),
            metadata,
            checkpoint: cp,
        })
    }

    /// Try one signal against the current document. Returns whether it
    /// produced a new version.
    fn apply_signal(&self, cp: &mut Checkpoint, signal: &BeaconSignal, index: &SidecarIndex) -> bool {
        let Some(update) = decode_signal(signal, &cp.did, index) else {
            return false;
        };

        match update.hash() {
            Ok(hash) if cp.applied.contains(&hash) => {
                debug!(txid = %signal.txid, update = %hash, "update already applied");
                return false;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(txid = %signal.txid, error = %e, "cannot hash candidate update");
                cp.rejected_count += 1;
                return false;
            }
        }

        match self
            .validator
            .apply(&cp.document, cp.version_id, &update, &cp.did)
        {
            Ok(applied) => {
                debug!(
                    did = %cp.did,
                    version_id = applied.version_id,
                    height = signal.block_height,
                    beacon = %signal.beacon_id,
                    "applied update"
                );
                cp.document = applied.document;
                cp.version_id = applied.version_id;
                cp.applied.push(applied.update_hash);
                cp.block_height = signal.block_height;
                cp.block_time = Some(signal.block_time);
                true
            }
            Err(reason) => {
                warn!(
                    did = %cp.did,
                    txid = %signal.txid,
                    height = signal.block_height,
                    version_id = cp.version_id,
                    %reason,
                    "rejected update"
                );
                cp.rejected_count += 1;
                false
            }
        }
    }
}

fn supported_components(did: &str) -> Result<IdentifierComponents> {
    let components = IdentifierComponents::decode(did)?;
    if components.version != SUPPORTED_VERSION {
        return Err(ResolveError::UnsupportedVersion(components.version));
    }
    Ok(components)
}
