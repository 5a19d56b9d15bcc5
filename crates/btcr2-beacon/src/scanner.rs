//! Signal scanner: walks the ledger in canonical order and yields the
//! transactions that spend from watched beacon addresses.
//!
//! Order is `(block height, position in block)`. Blocks are fetched ahead
//! of the cursor, `prefetch` at a time and concurrently, but are consumed
//! strictly in height order, so the order of signals never depends on the
//! prefetch window.

use std::collections::VecDeque;

use bitcoin::{ScriptBuf, Transaction};
use btcr2_ledger::{Ledger, LedgerBlock, LedgerError};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::beacon::BeaconRegistry;
use crate::error::Result;
use crate::signal::BeaconSignal;

/// Position of the next transaction to examine.
///
/// Always sits on a transaction boundary, so a scan can be restarted from
/// it without skipping or repeating a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanCursor {
    pub height: u64,
    pub tx_index: usize,
}

impl ScanCursor {
    /// Start of the block at `height`.
    pub fn at_height(height: u64) -> Self {
        Self {
            height,
            tx_index: 0,
        }
    }
}

/// A lazy, restartable scan over a height range.
pub struct SignalScanner<'a, L: Ledger + ?Sized> {
    ledger: &'a L,
    cursor: ScanCursor,
    to_height: u64,
    prefetch: usize,
    buffer: VecDeque<LedgerBlock>,
}

impl<'a, L: Ledger + ?Sized> SignalScanner<'a, L> {
    /// Scan heights `from_height..=to_height`.
    pub fn new(ledger: &'a L, from_height: u64, to_height: u64, prefetch: usize) -> Self {
        Self::resume(ledger, ScanCursor::at_height(from_height), to_height, prefetch)
    }

    /// Continue a scan from a saved cursor.
    pub fn resume(ledger: &'a L, cursor: ScanCursor, to_height: u64, prefetch: usize) -> Self {
        Self {
            ledger,
            cursor,
            to_height,
            prefetch: prefetch.max(1),
            buffer: VecDeque::new(),
        }
    }

    /// Where the scan will continue from.
    pub fn cursor(&self) -> ScanCursor {
        self.cursor
    }

    /// Last height this scan covers.
    pub fn to_height(&self) -> u64 {
        self.to_height
    }

    /// Signals of the next transaction spending from a beacon in `registry`.
    ///
    /// One signal per matching beacon, in registry order. `None` once the
    /// range is exhausted. The registry is taken per call because a
    /// document update can change the beacon set between transactions.
    pub async fn next_signals(
        &mut self,
        registry: &BeaconRegistry,
    ) -> Result<Option<Vec<BeaconSignal>>> {
        while self.cursor.height <= self.to_height {
            self.fill().await?;
            let Some(block) = self.buffer.front() else {
                break;
            };

            if let Some(tx) = block.transactions.get(self.cursor.tx_index) {
                let tx = tx.clone();
                let (height, time, index) = (block.height, block.time, self.cursor.tx_index);
                self.cursor.tx_index += 1;

                if registry.is_empty() {
                    continue;
                }
                let signals = self.match_transaction(&tx, height, time, index, registry).await?;
                if !signals.is_empty() {
                    debug!(height, tx_index = index, count = signals.len(), "beacon signal");
                    return Ok(Some(signals));
                }
            } else {
                self.buffer.pop_front();
                self.cursor = ScanCursor::at_height(self.cursor.height + 1);
            }
        }
        Ok(None)
    }

    /// Fetch the next window of blocks when the buffer runs dry.
    async fn fill(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            return Ok(());
        }
        let start = self.cursor.height;
        let end = self
            .to_height
            .min(start.saturating_add(self.prefetch as u64 - 1));
        trace!(start, end, "prefetching blocks");

        let ledger = self.ledger;
        let blocks: Vec<LedgerBlock> = stream::iter(start..=end)
            .map(|height| ledger.block_at(height))
            .buffered(self.prefetch)
            .try_collect()
            .await?;
        self.buffer.extend(blocks);
        Ok(())
    }

    async fn match_transaction(
        &self,
        tx: &Transaction,
        height: u64,
        time: u64,
        tx_index: usize,
        registry: &BeaconRegistry,
    ) -> Result<Vec<BeaconSignal>> {
        let mut spent: Vec<ScriptBuf> = Vec::with_capacity(tx.input.len());
        for input in &tx.input {
            match self.ledger.prevout_script(&input.previous_output).await {
                Ok(Some(script)) => spent.push(script),
                Ok(None) => {}
                // An output the ledger cannot resolve is not a beacon spend.
                Err(LedgerError::TransactionNotFound(prev)) => {
                    debug!(%prev, height, tx_index, "prevout not found, not a beacon spend");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let txid = tx.compute_txid();
        Ok(registry
            .beacons()
            .iter()
            .filter(|b| spent.contains(&b.script_pubkey))
            .map(|b| BeaconSignal {
                beacon_id: b.id.clone(),
                beacon_type: b.beacon_type,
                beacon_address: b.address.clone(),
                txid,
                tx: tx.clone(),
                block_height: height,
                block_time: time,
                tx_index,
            })
            .collect())
    }
}

/// Every signal in `from_height..=to_height` for a fixed watch set.
pub async fn scan<L: Ledger + ?Sized>(
    ledger: &L,
    from_height: u64,
    to_height: u64,
    registry: &BeaconRegistry,
    prefetch: usize,
) -> Result<Vec<BeaconSignal>> {
    let mut scanner = SignalScanner::new(ledger, from_height, to_height, prefetch);
    let mut out = Vec::new();
    while let Some(signals) = scanner.next_signals(registry).await? {
        out.extend(signals);
    }
    Ok(out)
}
