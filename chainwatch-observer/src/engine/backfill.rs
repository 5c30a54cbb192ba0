//! Historical backfill scanner.
//!
//! Walks a closed block range in bounded windows, fetching each block with
//! full transactions and shipping it into the live monitor pipeline over a
//! channel - the monitors stay the single writers of their tables and
//! treat historical blocks exactly like live ones, which is what makes
//! re-running a scan idempotent.
//!
//! Rate discipline: after every window the scanner sleeps the configured
//! inter-batch delay. A missing block is logged and skipped; a block whose
//! fetch keeps failing after three attempts aborts the scan with
//! `BackfillAborted` for its window.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{DomainError, EngineError, Result};
use crate::ports::ChainSource;

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Fetch attempts per block before the scan aborts.
const MAX_BLOCK_RETRIES: u32 = 3;

/// Pause between fetch retries.
const RETRY_DELAY: Duration = Duration::from_millis(500);

// ═══════════════════════════════════════════════════════════════════════════════
// REQUEST
// ═══════════════════════════════════════════════════════════════════════════════

/// One backfill job.
#[derive(Debug, Clone)]
pub struct BackfillRequest {
    /// First block to scan (inclusive).
    pub from_block: u64,
    /// Last block to scan (inclusive); `None` = current head.
    pub to_block: Option<u64>,
    /// Restrict shipped transactions to ones involving this address.
    pub address: Option<Address>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCANNER
// ═══════════════════════════════════════════════════════════════════════════════

/// The backfill worker. Started on demand, one job per run.
pub struct BackfillScanner {
    source: Arc<dyn ChainSource>,
    /// Where fetched blocks are shipped (the engine's monitor loop).
    sink: mpsc::Sender<eth_rpc::Block>,
    batch_size: u64,
    batch_delay: Duration,
}

impl std::fmt::Debug for BackfillScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackfillScanner")
            .field("batch_size", &self.batch_size)
            .field("batch_delay", &self.batch_delay)
            .finish()
    }
}

impl BackfillScanner {
    /// Create a scanner shipping blocks into `sink`.
    #[must_use]
    pub fn new(
        source: Arc<dyn ChainSource>,
        sink: mpsc::Sender<eth_rpc::Block>,
        batch_size: u64,
        batch_delay: Duration,
    ) -> Self {
        Self {
            source,
            sink,
            batch_size: batch_size.max(1),
            batch_delay,
        }
    }

    /// Run one scan to completion.
    ///
    /// Returns the effective `(from, to)` range on success.
    ///
    /// # Errors
    ///
    /// [`DomainError::InvalidBlockRange`] for an inverted range,
    /// [`EngineError::BackfillAborted`] when a window keeps failing,
    /// [`EngineError::Cancelled`] on shutdown.
    #[instrument(skip(self, shutdown), fields(from = request.from_block, to = ?request.to_block))]
    pub async fn run(
        &self,
        request: BackfillRequest,
        shutdown: CancellationToken,
    ) -> Result<(u64, u64)> {
        let to_block = match request.to_block {
            Some(to) => to,
            None => self.source.block_number().await?,
        };
        if request.from_block > to_block {
            return Err(DomainError::InvalidBlockRange {
                from: request.from_block,
                to: to_block,
            }
            .into());
        }

        info!(
            from = request.from_block,
            to = to_block,
            batch = self.batch_size,
            "Starting backfill"
        );
        let total = to_block - request.from_block + 1;
        let mut scanned = 0u64;

        let mut window_start = request.from_block;
        while window_start <= to_block {
            let window_end = (window_start + self.batch_size - 1).min(to_block);

            self.scan_window(window_start, window_end, request.address, &shutdown)
                .await?;

            scanned += window_end - window_start + 1;
            // Precision loss is acceptable for progress percentage display
            #[allow(clippy::cast_precision_loss)]
            let progress = (scanned as f64 / total as f64) * 100.0;
            info!(
                from = window_start,
                to = window_end,
                progress = format!("{progress:.1}%"),
                "Backfill window done"
            );

            window_start = window_end + 1;

            // Respect provider rate limits between windows.
            if window_start <= to_block {
                tokio::select! {
                    () = shutdown.cancelled() => return Err(EngineError::Cancelled),
                    () = tokio::time::sleep(self.batch_delay) => {}
                }
            }
        }

        info!(from = request.from_block, to = to_block, "Backfill complete");
        Ok((request.from_block, to_block))
    }

    /// Fetch and ship one window of blocks.
    async fn scan_window(
        &self,
        from: u64,
        to: u64,
        address: Option<Address>,
        shutdown: &CancellationToken,
    ) -> Result<()> {
        for number in from..=to {
            if shutdown.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let block = match self.fetch_with_retry(number, shutdown).await {
                Ok(Some(block)) => block,
                Ok(None) => {
                    // Unknown height: logged and skipped, never fatal.
                    warn!(number, "Block not found during backfill, skipping");
                    continue;
                }
                Err(error) if error.is_cancelled() => return Err(EngineError::Cancelled),
                Err(error) => {
                    warn!(number, %error, "Window failed after retries, aborting scan");
                    return Err(EngineError::BackfillAborted { from, to });
                }
            };

            let block = filter_by_address(block, address);
            if self.sink.send(block).await.is_err() {
                return Err(EngineError::ChannelClosed("backfill sink".into()));
            }
        }
        Ok(())
    }

    /// Fetch one block, retrying transient failures.
    async fn fetch_with_retry(
        &self,
        number: u64,
        shutdown: &CancellationToken,
    ) -> Result<Option<eth_rpc::Block>> {
        let mut last_error = None;
        for attempt in 1..=MAX_BLOCK_RETRIES {
            match self.source.block_by_number(number, true).await {
                Ok(block) => return Ok(block),
                Err(error) if error.is_cancelled() => return Err(error),
                Err(error) => {
                    debug!(number, attempt, %error, "Block fetch failed");
                    last_error = Some(error);
                }
            }
            if attempt < MAX_BLOCK_RETRIES {
                tokio::select! {
                    () = shutdown.cancelled() => return Err(EngineError::Cancelled),
                    () = tokio::time::sleep(RETRY_DELAY) => {}
                }
            }
        }
        Err(last_error.unwrap_or(EngineError::Cancelled))
    }
}

/// Drop transactions not involving `address`, when a filter is set.
fn filter_by_address(mut block: eth_rpc::Block, address: Option<Address>) -> eth_rpc::Block {
    let Some(address) = address else {
        return block;
    };
    if let eth_rpc::BlockTransactions::Full(txs) = &mut block.transactions {
        txs.retain(|tx| tx.from == address || tx.to == Some(address));
    }
    block
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::MockChain;
    use alloy::primitives::{U256, address};

    fn scanner(
        chain: &MockChain,
        batch_size: u64,
    ) -> (BackfillScanner, mpsc::Receiver<eth_rpc::Block>) {
        let (sink, rx) = mpsc::channel(1_024);
        (
            BackfillScanner::new(
                Arc::new(chain.clone()),
                sink,
                batch_size,
                Duration::from_millis(1),
            ),
            rx,
        )
    }

    #[tokio::test]
    async fn walks_the_full_range_in_windows() {
        let chain = MockChain::new();
        for n in 990..=1_000 {
            chain.push_block(n);
        }
        let (scanner, mut rx) = scanner(&chain, 4);

        let request = BackfillRequest {
            from_block: 990,
            to_block: Some(1_000),
            address: None,
        };
        let range = scanner
            .run(request, CancellationToken::new())
            .await
            .expect("scan");
        assert_eq!(range, (990, 1_000));

        let mut numbers = Vec::new();
        while let Ok(block) = rx.try_recv() {
            numbers.push(block.number);
        }
        assert_eq!(numbers, (990..=1_000).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn to_block_defaults_to_head() {
        let chain = MockChain::new();
        for n in 1..=5 {
            chain.push_block(n);
        }
        let (scanner, mut rx) = scanner(&chain, 100);

        let range = scanner
            .run(
                BackfillRequest {
                    from_block: 3,
                    to_block: None,
                    address: None,
                },
                CancellationToken::new(),
            )
            .await
            .expect("scan");
        assert_eq!(range, (3, 5));

        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn inverted_range_is_rejected() {
        let chain = MockChain::new();
        chain.push_block(10);
        let (scanner, _rx) = scanner(&chain, 100);

        let err = scanner
            .run(
                BackfillRequest {
                    from_block: 20,
                    to_block: Some(10),
                    address: None,
                },
                CancellationToken::new(),
            )
            .await
            .expect_err("should fail");
        assert!(matches!(
            err,
            EngineError::Domain(DomainError::InvalidBlockRange { .. })
        ));
    }

    #[tokio::test]
    async fn missing_blocks_are_skipped() {
        let chain = MockChain::new();
        chain.push_block(1);
        chain.push_block(3);
        let (scanner, mut rx) = scanner(&chain, 100);

        scanner
            .run(
                BackfillRequest {
                    from_block: 1,
                    to_block: Some(3),
                    address: None,
                },
                CancellationToken::new(),
            )
            .await
            .expect("scan");

        let mut numbers = Vec::new();
        while let Ok(block) = rx.try_recv() {
            numbers.push(block.number);
        }
        assert_eq!(numbers, [1, 3]);
    }

    #[tokio::test]
    async fn persistent_failure_aborts_with_window_range() {
        let chain = MockChain::new();
        for n in 1..=10 {
            chain.push_block(n);
        }
        chain.fail_block(5);
        let (scanner, _rx) = scanner(&chain, 4);

        let err = scanner
            .run(
                BackfillRequest {
                    from_block: 1,
                    to_block: Some(10),
                    address: None,
                },
                CancellationToken::new(),
            )
            .await
            .expect_err("should abort");
        assert!(matches!(
            err,
            EngineError::BackfillAborted { from: 5, to: 8 }
        ));
    }

    #[tokio::test]
    async fn address_filter_narrows_shipped_transactions() {
        let watched = address!("a7d9ddbe1f17865597fbd27ec712455208b6b76d");
        let other = address!("f02c1c8e6114b1dbe8937a39260b5b0a374432bb");

        let chain = MockChain::new();
        chain.push_block_with_txs(
            1,
            vec![
                MockChain::value_tx(0x01, watched, other, U256::from(1u64)),
                MockChain::value_tx(0x02, other, other, U256::from(1u64)),
            ],
        );
        let (scanner, mut rx) = scanner(&chain, 100);

        scanner
            .run(
                BackfillRequest {
                    from_block: 1,
                    to_block: Some(1),
                    address: Some(watched),
                },
                CancellationToken::new(),
            )
            .await
            .expect("scan");

        let block = rx.try_recv().expect("block");
        assert_eq!(block.transactions.len(), 1);
    }
}
