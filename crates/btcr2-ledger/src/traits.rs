//! Ledger trait: the abstract interface to the Bitcoin chain.

use std::sync::Arc;

use async_trait::async_trait;
use bitcoin::{OutPoint, Script, ScriptBuf, Transaction, Txid};

use crate::error::{LedgerError, Result};

/// A block as seen by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerBlock {
    /// Height of the block.
    pub height: u64,
    /// Block header timestamp (Unix seconds).
    pub time: u64,
    /// Transactions in on-chain order.
    pub transactions: Vec<Transaction>,
}

/// Async read access to a Bitcoin chain.
///
/// Implementations must be safe to call concurrently: the signal scanner
/// fetches a window of upcoming blocks in parallel.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Height of the current chain tip.
    async fn tip_height(&self) -> Result<u64>;

    /// The block at `height`.
    async fn block_at(&self, height: u64) -> Result<LedgerBlock>;

    /// A confirmed transaction by id.
    async fn transaction(&self, txid: &Txid) -> Result<Option<Transaction>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Provided
    // ─────────────────────────────────────────────────────────────────────────

    /// The script of the output an input spends.
    async fn prevout_script(&self, outpoint: &OutPoint) -> Result<Option<ScriptBuf>> {
        if outpoint.is_null() {
            return Ok(None);
        }
        let Some(tx) = self.transaction(&outpoint.txid).await? else {
            return Err(LedgerError::TransactionNotFound(outpoint.txid));
        };
        Ok(tx
            .output
            .get(outpoint.vout as usize)
            .map(|out| out.script_pubkey.clone()))
    }

    /// Whether any input of `tx` spends an output locked to `script`.
    async fn spends_from(&self, tx: &Transaction, script: &Script) -> Result<bool> {
        for input in &tx.input {
            if let Some(prev) = self.prevout_script(&input.previous_output).await? {
                if prev.as_script() == script {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

#[async_trait]
impl<L: Ledger + ?Sized> Ledger for Arc<L> {
    async fn tip_height(&self) -> Result<u64> {
        (**self).tip_height().await
    }

    async fn block_at(&self, height: u64) -> Result<LedgerBlock> {
        (**self).block_at(height).await
    }

    async fn transaction(&self, txid: &Txid) -> Result<Option<Transaction>> {
        (**self).transaction(txid).await
    }

    async fn prevout_script(&self, outpoint: &OutPoint) -> Result<Option<ScriptBuf>> {
        (**self).prevout_script(outpoint).await
    }
}
