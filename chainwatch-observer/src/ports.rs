//! Port traits decoupling the monitors from the connection layer.
//!
//! The monitors and the backfill scanner read the chain exclusively through
//! [`ChainSource`], so tests drive them with scripted mock chains and the
//! production wiring adapts the pooled connection manager. The same pattern
//! keeps ownership honest: a port returns data by value, never a handle
//! into another component's tables.

use std::sync::Arc;

use alloy::primitives::B256;
use async_trait::async_trait;
use eth_rpc::{Block, Log, LogFilter, Receipt, Transaction};
use provider_pool::ConnectionManager;

use crate::error::Result;

// ═══════════════════════════════════════════════════════════════════════════════
// CHAIN SOURCE
// ═══════════════════════════════════════════════════════════════════════════════

/// Read-only chain access for the monitors.
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Current head block number.
    async fn block_number(&self) -> Result<u64>;

    /// Fetch a block by number, with or without full transactions.
    async fn block_by_number(&self, number: u64, with_txs: bool) -> Result<Option<Block>>;

    /// Fetch a transaction by hash.
    async fn transaction(&self, hash: B256) -> Result<Option<Transaction>>;

    /// Fetch a transaction receipt by hash.
    async fn receipt(&self, hash: B256) -> Result<Option<Receipt>>;

    /// Fetch logs matching a filter.
    async fn logs(&self, filter: &LogFilter) -> Result<Vec<Log>>;
}

/// Production adapter: every call goes through the pooled connection with
/// rate limiting, deadline, and failure accounting.
#[derive(Debug, Clone)]
pub struct PooledChainSource {
    connection: Arc<ConnectionManager>,
}

impl PooledChainSource {
    /// Wrap a connection manager.
    #[must_use]
    pub const fn new(connection: Arc<ConnectionManager>) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl ChainSource for PooledChainSource {
    async fn block_number(&self) -> Result<u64> {
        Ok(self
            .connection
            .request(|client| async move { client.block_number().await })
            .await?)
    }

    async fn block_by_number(&self, number: u64, with_txs: bool) -> Result<Option<Block>> {
        Ok(self
            .connection
            .request(|client| async move { client.get_block_by_number(number, with_txs).await })
            .await?)
    }

    async fn transaction(&self, hash: B256) -> Result<Option<Transaction>> {
        Ok(self
            .connection
            .request(|client| async move { client.get_transaction(hash).await })
            .await?)
    }

    async fn receipt(&self, hash: B256) -> Result<Option<Receipt>> {
        Ok(self
            .connection
            .request(|client| async move { client.get_transaction_receipt(hash).await })
            .await?)
    }

    async fn logs(&self, filter: &LogFilter) -> Result<Vec<Log>> {
        let filter = filter.clone();
        Ok(self
            .connection
            .request(|client| async move { client.get_logs(&filter).await })
            .await?)
    }
}
