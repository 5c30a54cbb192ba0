//! Test support: a scriptable in-memory chain.
//!
//! [`MockChain`] implements [`ChainSource`](crate::ports::ChainSource) over
//! plain maps so monitor and scenario tests can script blocks, reorgs, and
//! failures without a node. Enabled for unit tests and, via the
//! `test-utils` feature, for integration tests.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use eth_rpc::{Block, BlockHeader, BlockTransactions, Log, LogFilter, Receipt, Transaction};
use parking_lot::Mutex;

use crate::error::Result;
use crate::ports::ChainSource;

/// Scriptable chain state shared with the test body.
#[derive(Debug, Default)]
struct ChainState {
    head: u64,
    blocks: HashMap<u64, Block>,
    transactions: HashMap<B256, Transaction>,
    receipts: HashMap<B256, Receipt>,
    /// Logs served per block number.
    logs: HashMap<u64, Vec<Log>>,
    /// Blocks whose fetch fails with a transient error.
    failing_blocks: std::collections::HashSet<u64>,
    /// Calls observed, for idempotence assertions.
    get_logs_calls: u64,
}

/// An in-memory [`ChainSource`] with mutation helpers.
#[derive(Debug, Clone, Default)]
pub struct MockChain {
    state: Arc<Mutex<ChainState>>,
}

impl MockChain {
    /// Create an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic hash for (number, fork) pairs.
    #[must_use]
    pub fn block_hash(number: u64, fork: u8) -> B256 {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&number.to_be_bytes());
        bytes[31] = fork;
        B256::from(bytes)
    }

    /// The header for a scripted block, for feeding a tracker.
    #[must_use]
    pub fn header(number: u64, fork: u8) -> BlockHeader {
        BlockHeader {
            number,
            hash: Self::block_hash(number, fork),
            parent_hash: Self::block_hash(number.wrapping_sub(1), fork),
            timestamp: 1_700_000_000 + number,
        }
    }

    /// Script an empty block at `number` on fork 0 and advance the head.
    pub fn push_block(&self, number: u64) {
        self.push_block_with_txs(number, Vec::new());
    }

    /// Script a block carrying `txs` and advance the head.
    ///
    /// Each transaction is registered for `transaction()` lookups and given
    /// a success receipt.
    pub fn push_block_with_txs(&self, number: u64, txs: Vec<Transaction>) {
        self.push_fork_block(number, 0, txs);
    }

    /// Script a block on a specific fork (for reorg scenarios).
    pub fn push_fork_block(&self, number: u64, fork: u8, mut txs: Vec<Transaction>) {
        let hash = Self::block_hash(number, fork);
        let mut state = self.state.lock();

        for tx in &mut txs {
            tx.block_number = Some(number);
            tx.block_hash = Some(hash);
            state.transactions.insert(tx.hash, tx.clone());
            state.receipts.insert(
                tx.hash,
                Receipt {
                    transaction_hash: tx.hash,
                    block_number: number,
                    block_hash: hash,
                    status: Some(1),
                    gas_used: Some(U256::from(21_000u64)),
                    logs: Vec::new(),
                },
            );
        }

        state.blocks.insert(
            number,
            Block {
                number,
                hash,
                parent_hash: Self::block_hash(number.wrapping_sub(1), fork),
                timestamp: 1_700_000_000 + number,
                transactions: BlockTransactions::Full(txs),
            },
        );
        state.head = state.head.max(number);
    }

    /// Register a transaction the node knows but has not mined.
    pub fn add_mempool_tx(&self, tx: Transaction) {
        self.state.lock().transactions.insert(tx.hash, tx);
    }

    /// Mark a transaction's receipt as reverted.
    pub fn revert_receipt(&self, hash: B256) {
        let mut state = self.state.lock();
        if let Some(receipt) = state.receipts.get_mut(&hash) {
            receipt.status = Some(0);
        }
    }

    /// Remove a transaction entirely (reorganized out).
    pub fn drop_transaction(&self, hash: B256) {
        let mut state = self.state.lock();
        state.transactions.remove(&hash);
        state.receipts.remove(&hash);
        for block in state.blocks.values_mut() {
            if let BlockTransactions::Full(txs) = &mut block.transactions {
                txs.retain(|tx| tx.hash != hash);
            }
        }
    }

    /// Make every fetch of `block` fail with a transient error.
    pub fn fail_block(&self, number: u64) {
        self.state.lock().failing_blocks.insert(number);
    }

    /// Serve `logs` for queries over `block`.
    pub fn set_logs(&self, block: u64, logs: Vec<Log>) {
        self.state.lock().logs.insert(block, logs);
    }

    /// How many `get_logs` calls the mock has served.
    #[must_use]
    pub fn get_logs_calls(&self) -> u64 {
        self.state.lock().get_logs_calls
    }

    /// Build a plain value-transfer transaction.
    #[must_use]
    pub fn value_tx(seed: u8, from: Address, to: Address, value: U256) -> Transaction {
        Transaction {
            hash: B256::repeat_byte(seed),
            block_hash: None,
            block_number: None,
            transaction_index: Some(0),
            from,
            to: Some(to),
            value,
            gas_price: Some(U256::from(30_000_000_000_u64)),
            nonce: u64::from(seed),
            input: alloy::primitives::Bytes::new(),
        }
    }
}

#[async_trait]
impl ChainSource for MockChain {
    async fn block_number(&self) -> Result<u64> {
        Ok(self.state.lock().head)
    }

    async fn block_by_number(&self, number: u64, with_txs: bool) -> Result<Option<Block>> {
        let state = self.state.lock();
        if state.failing_blocks.contains(&number) {
            return Err(eth_rpc::RpcError::Timeout.into());
        }
        Ok(state.blocks.get(&number).map(|block| {
            let mut block = block.clone();
            if !with_txs {
                let hashes = match &block.transactions {
                    BlockTransactions::Full(txs) => txs.iter().map(|t| t.hash).collect(),
                    BlockTransactions::Hashes(h) => h.clone(),
                };
                block.transactions = BlockTransactions::Hashes(hashes);
            }
            block
        }))
    }

    async fn transaction(&self, hash: B256) -> Result<Option<Transaction>> {
        Ok(self.state.lock().transactions.get(&hash).cloned())
    }

    async fn receipt(&self, hash: B256) -> Result<Option<Receipt>> {
        Ok(self.state.lock().receipts.get(&hash).cloned())
    }

    async fn logs(&self, filter: &LogFilter) -> Result<Vec<Log>> {
        let mut state = self.state.lock();
        state.get_logs_calls += 1;

        let parse = |tag: &str| u64::from_str_radix(tag.trim_start_matches("0x"), 16).unwrap_or(0);
        let (from, to) = (parse(&filter.from_block), parse(&filter.to_block));

        let mut matched = Vec::new();
        for number in from..=to {
            let Some(logs) = state.logs.get(&number) else {
                continue;
            };
            for log in logs {
                if let Some(addresses) = &filter.address {
                    if !addresses.contains(&log.address) {
                        continue;
                    }
                }
                if let Some(topics) = &filter.topics {
                    let ok = topics.iter().enumerate().all(|(i, want)| {
                        want.is_none_or(|w| log.topics.get(i) == Some(&w))
                    });
                    if !ok {
                        continue;
                    }
                }
                matched.push(log.clone());
            }
        }
        Ok(matched)
    }
}
