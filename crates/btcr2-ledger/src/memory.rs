//! In-memory implementation of the Ledger trait.
//!
//! A chain that only ever grows. Starts with an empty block at height 0;
//! tests mine further blocks with [`MemoryLedger::mine_block`].

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::{Transaction, Txid};
use tracing::trace;

use crate::error::{LedgerError, Result};
use crate::traits::{Ledger, LedgerBlock};

/// In-memory ledger. Thread-safe via RwLock.
pub struct MemoryLedger {
    inner: RwLock<MemoryLedgerInner>,
    latency: Option<Duration>,
}

struct MemoryLedgerInner {
    /// Blocks indexed by height.
    blocks: Vec<LedgerBlock>,

    /// Transaction index: txid -> (height, position in block).
    transactions: HashMap<Txid, (u64, usize)>,
}

impl MemoryLedger {
    /// Create a ledger holding only an empty genesis block.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryLedgerInner {
                blocks: vec![LedgerBlock {
                    height: 0,
                    time: 0,
                    transactions: Vec::new(),
                }],
                transactions: HashMap::new(),
            }),
            latency: None,
        }
    }

    /// Delay every block fetch, to exercise concurrent read-ahead.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Append a block and return its height.
    pub fn mine_block(&self, time: u64, transactions: Vec<Transaction>) -> Result<u64> {
        let mut inner = self.inner.write().map_err(|_| LedgerError::Poisoned)?;
        let height = inner.blocks.len() as u64;

        for (index, tx) in transactions.iter().enumerate() {
            inner.transactions.insert(tx.compute_txid(), (height, index));
        }
        inner.blocks.push(LedgerBlock {
            height,
            time,
            transactions,
        });

        trace!(height, time, "mined block");
        Ok(height)
    }

    /// Mine `count` empty blocks, `spacing` seconds apart.
    pub fn mine_empty(&self, count: u64, spacing: u64) -> Result<u64> {
        let mut height = self.tip()?;
        for _ in 0..count {
            let time = self.time_at(height)? + spacing;
            height = self.mine_block(time, Vec::new())?;
        }
        Ok(height)
    }

    fn tip(&self) -> Result<u64> {
        let inner = self.inner.read().map_err(|_| LedgerError::Poisoned)?;
        Ok(inner.blocks.len() as u64 - 1)
    }

    fn time_at(&self, height: u64) -> Result<u64> {
        let inner = self.inner.read().map_err(|_| LedgerError::Poisoned)?;
        inner
            .blocks
            .get(height as usize)
            .map(|b| b.time)
            .ok_or(LedgerError::BlockNotFound(height))
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn tip_height(&self) -> Result<u64> {
        self.tip()
    }

    async fn block_at(&self, height: u64) -> Result<LedgerBlock> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let inner = self.inner.read().map_err(|_| LedgerError::Poisoned)?;
        inner
            .blocks
            .get(height as usize)
            .cloned()
            .ok_or(LedgerError::BlockNotFound(height))
    }

    async fn transaction(&self, txid: &Txid) -> Result<Option<Transaction>> {
        let inner = self.inner.read().map_err(|_| LedgerError::Poisoned)?;
        Ok(inner
            .transactions
            .get(txid)
            .and_then(|&(height, index)| inner.blocks.get(height as usize)?.transactions.get(index))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::absolute::LockTime;
    use bitcoin::transaction::Version;
    use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, TxIn, TxOut, Witness};

    fn coinbase(tag: u8, script: ScriptBuf) -> Transaction {
        Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig: ScriptBuf::from_bytes(vec![tag]),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(50_000),
                script_pubkey: script,
            }],
        }
    }

    fn spend(outpoint: OutPoint) -> Transaction {
        Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: outpoint,
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![],
        }
    }

    #[tokio::test]
    async fn test_genesis_block() {
        let ledger = MemoryLedger::new();
        assert_eq!(ledger.tip_height().await.unwrap(), 0);
        let block = ledger.block_at(0).await.unwrap();
        assert!(block.transactions.is_empty());
        assert!(matches!(
            ledger.block_at(1).await,
            Err(LedgerError::BlockNotFound(1))
        ));
    }

    #[tokio::test]
    async fn test_mine_and_lookup() {
        let ledger = MemoryLedger::new();
        let tx = coinbase(1, ScriptBuf::from_bytes(vec![0x51]));
        let txid = tx.compute_txid();

        let height = ledger.mine_block(1_000, vec![tx.clone()]).unwrap();
        assert_eq!(height, 1);
        assert_eq!(ledger.tip_height().await.unwrap(), 1);
        assert_eq!(ledger.block_at(1).await.unwrap().time, 1_000);
        assert_eq!(ledger.transaction(&txid).await.unwrap(), Some(tx));
    }

    #[tokio::test]
    async fn test_spends_from() {
        let ledger = MemoryLedger::new();
        let watched = ScriptBuf::from_bytes(vec![0x51]);
        let other = ScriptBuf::from_bytes(vec![0x52]);

        let funding = coinbase(1, watched.clone());
        let outpoint = OutPoint::new(funding.compute_txid(), 0);
        ledger.mine_block(600, vec![funding]).unwrap();

        let spender = spend(outpoint);
        assert!(ledger.spends_from(&spender, &watched).await.unwrap());
        assert!(!ledger.spends_from(&spender, &other).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_prevout_is_an_error() {
        let ledger = MemoryLedger::new();
        let orphan = spend(OutPoint::new(coinbase(9, ScriptBuf::new()).compute_txid(), 0));
        let watched = ScriptBuf::new();
        assert!(matches!(
            ledger.spends_from(&orphan, &watched).await,
            Err(LedgerError::TransactionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mine_empty() {
        let ledger = MemoryLedger::new();
        ledger.mine_block(100, Vec::new()).unwrap();
        let tip = ledger.mine_empty(3, 600).unwrap();
        assert_eq!(tip, 4);
        assert_eq!(ledger.block_at(4).await.unwrap().time, 1_900);
    }
}
