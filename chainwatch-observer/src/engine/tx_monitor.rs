//! Transaction monitor: watch-list, filters, confirmation lifecycle.
//!
//! The monitor owns the pending and confirmed transaction tables - no other
//! component touches them. On every head notice it:
//!
//! 1. Recomputes confirmations and promotes pending transactions at the
//!    threshold (checking the receipt: status 0 fails as `Reverted`).
//! 2. Expires pending entries older than the configured maximum age.
//! 3. On a reorg notice, re-fetches every tracked transaction in the
//!    affected range and demotes or fails it.
//! 4. Scans the new block's transactions against the watch-list and
//!    filters, inserting and emitting `TransactionDetected`.
//!
//! Detection is idempotent on transaction hash: re-observing a tracked hash
//! (live or via backfill) is silently ignored. Per-transaction RPC failures
//! are logged and skipped; the loop always advances.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::bus::{EngineEvent, EventBus};
use crate::error::DomainError;
use crate::ports::ChainSource;
use crate::types::{
    FailureReason, HeadNotice, MonitoredTransaction, TransactionFilter, TxStatus,
};

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

/// Tunables for the transaction monitor.
#[derive(Debug, Clone)]
pub struct TxMonitorConfig {
    /// Confirmations required before promotion.
    pub confirmation_threshold: u64,
    /// Depth below head within which reorgs are re-checked.
    pub reorg_depth: u64,
    /// Age after which a pending entry expires.
    pub max_pending_age: Duration,
    /// Pending-table bound; oldest entries evicted on overflow.
    pub max_pending: usize,
    /// How long confirmed entries stay in memory.
    pub retention: Duration,
}

impl Default for TxMonitorConfig {
    fn default() -> Self {
        Self {
            confirmation_threshold: 12,
            reorg_depth: 20,
            max_pending_age: Duration::from_secs(3_600),
            max_pending: 100_000,
            retention: Duration::from_secs(86_400),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSACTION MONITOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Single owner of the transaction tables.
pub struct TransactionMonitor {
    config: TxMonitorConfig,
    bus: Arc<EventBus>,
    enabled: bool,

    watched: HashSet<Address>,
    filters: Vec<TransactionFilter>,

    pending: HashMap<B256, MonitoredTransaction>,
    /// Insertion order of pending hashes, for overflow eviction.
    pending_order: VecDeque<B256>,
    confirmed: HashMap<B256, ConfirmedEntry>,

    last_head: u64,
    /// Running average of detection-to-confirmation latency.
    confirmation_latency_sum_secs: f64,
    confirmation_count: u64,
}

#[derive(Debug, Clone)]
struct ConfirmedEntry {
    transaction: MonitoredTransaction,
    confirmed_at: DateTime<Utc>,
}

impl std::fmt::Debug for TransactionMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionMonitor")
            .field("enabled", &self.enabled)
            .field("watched", &self.watched.len())
            .field("filters", &self.filters.len())
            .field("pending", &self.pending.len())
            .field("confirmed", &self.confirmed.len())
            .field("last_head", &self.last_head)
            .finish()
    }
}

impl TransactionMonitor {
    /// Create a monitor publishing on `bus`.
    #[must_use]
    pub fn new(config: TxMonitorConfig, bus: Arc<EventBus>) -> Self {
        Self {
            config,
            bus,
            enabled: false,
            watched: HashSet::new(),
            filters: Vec::new(),
            pending: HashMap::new(),
            pending_order: VecDeque::new(),
            confirmed: HashMap::new(),
            last_head: 0,
            confirmation_latency_sum_secs: 0.0,
            confirmation_count: 0,
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // COMMANDS
    // ───────────────────────────────────────────────────────────────────────────

    /// Start emitting.
    ///
    /// # Errors
    ///
    /// Fails with [`DomainError::EmptyWatchSet`] when neither an address
    /// nor a non-empty filter is installed - such a monitor can never emit.
    pub fn start(&mut self) -> Result<(), DomainError> {
        if self.watched.is_empty() && !self.filters.iter().any(|f| !f.is_empty()) {
            return Err(DomainError::EmptyWatchSet);
        }
        self.enabled = true;
        info!(
            addresses = self.watched.len(),
            filters = self.filters.len(),
            "Transaction monitoring started"
        );
        Ok(())
    }

    /// Stop emitting; tables are retained.
    pub fn stop(&mut self) {
        self.enabled = false;
        info!("Transaction monitoring stopped");
    }

    /// Whether the monitor is currently emitting.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Add an address to the watch-list.
    pub fn add_address(&mut self, address: Address) {
        self.watched.insert(address);
    }

    /// Remove an address from the watch-list.
    pub fn remove_address(&mut self, address: Address) {
        self.watched.remove(&address);
    }

    /// Install an additional filter.
    pub fn add_filter(&mut self, filter: TransactionFilter) {
        self.filters.push(filter);
    }

    /// Change the confirmation threshold at runtime.
    ///
    /// Lowering it promotes newly-qualifying transactions on the spot.
    ///
    /// # Errors
    ///
    /// Fails when the threshold is outside 1..=100.
    pub async fn set_confirmation_threshold(
        &mut self,
        threshold: u64,
        source: &dyn ChainSource,
    ) -> Result<(), DomainError> {
        if !(1..=100).contains(&threshold) {
            return Err(DomainError::InvalidConfirmationThreshold(
                u32::try_from(threshold).unwrap_or(u32::MAX),
            ));
        }
        let lowered = threshold < self.config.confirmation_threshold;
        self.config.confirmation_threshold = threshold;
        info!(threshold, "Confirmation threshold updated");

        if lowered && self.last_head > 0 {
            self.promote_and_expire(source).await;
        }
        Ok(())
    }

    /// Register a specific transaction (possibly still pending) for
    /// lifecycle tracking.
    ///
    /// Returns the tracked record, or `None` when the chain does not know
    /// the hash - surfaced unchanged, not an engine fault.
    ///
    /// # Errors
    ///
    /// Propagates transport failures from the lookup.
    pub async fn track_transaction(
        &mut self,
        hash: B256,
        source: &dyn ChainSource,
    ) -> crate::error::Result<Option<MonitoredTransaction>> {
        if let Some(existing) = self.lookup(hash) {
            return Ok(Some(existing));
        }

        let Some(wire) = source.transaction(hash).await? else {
            return Ok(None);
        };

        let record = MonitoredTransaction::from_rpc(&wire, Utc::now());
        self.insert_pending(record.clone());
        self.bus
            .publish(&EngineEvent::TransactionDetected(record.clone()));
        Ok(Some(record))
    }

    // ───────────────────────────────────────────────────────────────────────────
    // BLOCK PROCESSING
    // ───────────────────────────────────────────────────────────────────────────

    /// Process one head notice: the four passes of the monitor loop.
    #[instrument(skip(self, source), fields(block = notice.number, reorg = notice.is_reorg))]
    pub async fn on_head(&mut self, notice: HeadNotice, source: &dyn ChainSource) {
        self.last_head = self.last_head.max(notice.head);
        if !self.enabled {
            return;
        }

        if notice.is_reorg {
            self.handle_reorg(notice.number, source).await;
        }

        self.promote_and_expire(source).await;
        self.detect_in_new_block(notice.number, source).await;
    }

    /// Feed a historical block through the live detection path.
    ///
    /// Called by the backfill scanner; promotion happens in the same pass
    /// so deep history confirms immediately.
    pub async fn on_backfill_block(&mut self, block: &eth_rpc::Block, source: &dyn ChainSource) {
        if !self.enabled {
            return;
        }
        self.detect_in_transactions(block.transactions.as_full().unwrap_or(&[]));
        self.promote_and_expire(source).await;
    }

    /// Recompute confirmations, promote at the threshold, expire stale
    /// pending entries.
    async fn promote_and_expire(&mut self, source: &dyn ChainSource) {
        let head = self.last_head;
        let threshold = self.config.confirmation_threshold;

        // Promotion candidates first; the await below cannot hold a borrow
        // of the table.
        let mut candidates = Vec::new();
        for tx in self.pending.values_mut() {
            if !tx.is_mined() {
                continue;
            }
            tx.confirmations = head.saturating_sub(tx.block_number);
            if tx.confirmations >= threshold {
                candidates.push(tx.tx_hash);
            }
        }

        for hash in candidates {
            match source.receipt(hash).await {
                Ok(Some(receipt)) if receipt.reverted() => {
                    if let Some(mut tx) = self.remove_pending(hash) {
                        tx.status = TxStatus::Failed;
                        self.bus.publish(&EngineEvent::TransactionFailed {
                            transaction: tx,
                            reason: FailureReason::Reverted,
                        });
                    }
                }
                Ok(Some(_)) => self.confirm(hash),
                Ok(None) => {
                    // Mined but no receipt yet: try again next head.
                    debug!(tx = %hash, "Receipt not yet available");
                }
                Err(error) if error.is_cancelled() => return,
                Err(error) => {
                    warn!(tx = %hash, %error, "Receipt fetch failed, will retry");
                }
            }
        }

        // Age-based expiry.
        let max_age = chrono::Duration::from_std(self.config.max_pending_age)
            .unwrap_or_else(|_| chrono::Duration::hours(1));
        let now = Utc::now();
        let expired: Vec<B256> = self
            .pending
            .values()
            .filter(|tx| now - tx.first_seen_at > max_age)
            .map(|tx| tx.tx_hash)
            .collect();
        for hash in expired {
            if let Some(mut tx) = self.remove_pending(hash) {
                info!(tx = %hash, "Pending transaction expired");
                tx.status = TxStatus::Failed;
                self.bus.publish(&EngineEvent::TransactionFailed {
                    transaction: tx,
                    reason: FailureReason::Expired,
                });
            }
        }
    }

    fn confirm(&mut self, hash: B256) {
        let Some(mut tx) = self.remove_pending(hash) else {
            return;
        };
        tx.status = TxStatus::Confirmed;
        let now = Utc::now();

        self.confirmation_latency_sum_secs +=
            (now - tx.first_seen_at).num_milliseconds() as f64 / 1_000.0;
        self.confirmation_count += 1;
        metrics::counter!("chainwatch_transactions_confirmed").increment(1);

        self.bus
            .publish(&EngineEvent::TransactionConfirmed(tx.clone()));
        self.confirmed.insert(
            hash,
            ConfirmedEntry {
                transaction: tx,
                confirmed_at: now,
            },
        );
    }

    /// Re-check every tracked transaction at or above the reorged height.
    async fn handle_reorg(&mut self, reorg_block: u64, source: &dyn ChainSource) {
        let floor = self
            .last_head
            .saturating_sub(self.config.reorg_depth)
            .max(reorg_block);

        let affected: Vec<B256> = self
            .pending
            .values()
            .map(|tx| (tx.tx_hash, tx.block_number))
            .chain(
                self.confirmed
                    .values()
                    .map(|e| (e.transaction.tx_hash, e.transaction.block_number)),
            )
            .filter(|(_, block)| *block >= floor)
            .map(|(hash, _)| hash)
            .collect();

        for hash in affected {
            let refetched = match source.transaction(hash).await {
                Ok(tx) => tx,
                Err(error) if error.is_cancelled() => return,
                Err(error) => {
                    warn!(tx = %hash, %error, "Reorg re-fetch failed, keeping entry");
                    continue;
                }
            };

            let Some(mut tracked) = self.remove_tracked(hash) else {
                continue;
            };
            let old_block = tracked.block_number;
            tracked.reorganized = true;

            match refetched {
                None => {
                    // Gone from the canonical chain entirely.
                    self.bus
                        .publish(&EngineEvent::TransactionReorganized(tracked.clone()));
                    tracked.status = TxStatus::Failed;
                    info!(tx = %hash, "Transaction reorganized out");
                    self.bus.publish(&EngineEvent::TransactionFailed {
                        transaction: tracked,
                        reason: FailureReason::ReorganizedOut,
                    });
                }
                Some(wire) if wire.block_number.unwrap_or(0) != old_block => {
                    // Moved to a different block: demote and re-confirm.
                    tracked.block_number = wire.block_number.unwrap_or(0);
                    tracked.status = TxStatus::Pending;
                    tracked.confirmations =
                        self.last_head.saturating_sub(tracked.block_number);
                    info!(
                        tx = %hash,
                        old_block,
                        new_block = tracked.block_number,
                        "Transaction moved by reorganization"
                    );
                    self.bus
                        .publish(&EngineEvent::TransactionReorganized(tracked.clone()));
                    self.insert_pending(tracked);
                }
                Some(_) => {
                    // Same height on the new branch: placement unchanged.
                    self.reinsert(tracked);
                }
            }
        }
    }

    /// Fetch the new block and scan its transactions.
    async fn detect_in_new_block(&mut self, number: u64, source: &dyn ChainSource) {
        match source.block_by_number(number, true).await {
            Ok(Some(block)) => {
                self.detect_in_transactions(block.transactions.as_full().unwrap_or(&[]));
            }
            Ok(None) => debug!(number, "Block not available for scan"),
            Err(error) if error.is_cancelled() => {}
            Err(error) => {
                // Never aborts the loop; the chain has moved on.
                warn!(number, %error, "Block scan failed, skipping");
            }
        }
    }

    /// Insert and announce every new matching transaction.
    fn detect_in_transactions(&mut self, txs: &[eth_rpc::Transaction]) {
        // A monitor with nothing to watch emits nothing.
        if self.watched.is_empty() && !self.filters.iter().any(|f| !f.is_empty()) {
            return;
        }

        for wire in txs {
            if self.pending.contains_key(&wire.hash) || self.confirmed.contains_key(&wire.hash) {
                continue;
            }
            if !self.matches(wire) {
                continue;
            }

            let mut record = MonitoredTransaction::from_rpc(wire, Utc::now());
            record.confirmations = self.last_head.saturating_sub(record.block_number);
            debug!(tx = %record.tx_hash, block = record.block_number, "Transaction detected");
            metrics::counter!("chainwatch_transactions_detected").increment(1);
            self.bus
                .publish(&EngineEvent::TransactionDetected(record.clone()));
            self.insert_pending(record);
        }
    }

    /// Watch-list membership plus OR-across-filters matching.
    fn matches(&self, tx: &eth_rpc::Transaction) -> bool {
        let involves_watched = !self.watched.is_empty()
            && (self.watched.contains(&tx.from)
                || tx.to.is_some_and(|to| self.watched.contains(&to)));

        if involves_watched {
            // Filters narrow the watch-list; none installed means accept.
            return self.filters.is_empty() || self.filters.iter().any(|f| f.matches(tx));
        }

        // Independent of the watch-list, a non-empty filter can select on
        // its own (its own address constraints apply).
        self.filters
            .iter()
            .any(|f| !f.is_empty() && f.matches(tx))
    }

    // ───────────────────────────────────────────────────────────────────────────
    // TABLES
    // ───────────────────────────────────────────────────────────────────────────

    fn insert_pending(&mut self, tx: MonitoredTransaction) {
        let hash = tx.tx_hash;
        self.pending.insert(hash, tx);
        self.pending_order.push_back(hash);

        // Bounded memory: evict the oldest entries on overflow.
        while self.pending.len() > self.config.max_pending {
            let Some(oldest) = self.pending_order.pop_front() else {
                break;
            };
            if self.pending.remove(&oldest).is_some() {
                warn!(tx = %oldest, "Pending table overflow, evicting oldest");
            }
        }
    }

    fn remove_pending(&mut self, hash: B256) -> Option<MonitoredTransaction> {
        self.pending.remove(&hash)
    }

    fn remove_tracked(&mut self, hash: B256) -> Option<MonitoredTransaction> {
        self.pending
            .remove(&hash)
            .or_else(|| self.confirmed.remove(&hash).map(|e| e.transaction))
    }

    fn reinsert(&mut self, tx: MonitoredTransaction) {
        match tx.status {
            TxStatus::Confirmed => {
                self.confirmed.insert(
                    tx.tx_hash,
                    ConfirmedEntry {
                        transaction: tx,
                        confirmed_at: Utc::now(),
                    },
                );
            }
            _ => self.insert_pending(tx),
        }
    }

    fn lookup(&self, hash: B256) -> Option<MonitoredTransaction> {
        self.pending.get(&hash).cloned().or_else(|| {
            self.confirmed
                .get(&hash)
                .map(|entry| entry.transaction.clone())
        })
    }

    /// Evict confirmed entries older than the retention window.
    pub fn cleanup(&mut self) {
        let retention = chrono::Duration::from_std(self.config.retention)
            .unwrap_or_else(|_| chrono::Duration::hours(24));
        let now = Utc::now();
        let before = self.confirmed.len();
        self.confirmed
            .retain(|_, entry| now - entry.confirmed_at <= retention);
        let evicted = before - self.confirmed.len();
        if evicted > 0 {
            debug!(evicted, "Aged out confirmed transactions");
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // QUERIES
    // ───────────────────────────────────────────────────────────────────────────

    /// By-value snapshot of the pending table.
    #[must_use]
    pub fn pending_snapshot(&self) -> Vec<MonitoredTransaction> {
        let mut txs: Vec<_> = self.pending.values().cloned().collect();
        txs.sort_by_key(|tx| (tx.block_number, tx.tx_hash));
        txs
    }

    /// By-value snapshot of the confirmed table.
    #[must_use]
    pub fn confirmed_snapshot(&self) -> Vec<MonitoredTransaction> {
        let mut txs: Vec<_> = self
            .confirmed
            .values()
            .map(|e| e.transaction.clone())
            .collect();
        txs.sort_by_key(|tx| (tx.block_number, tx.tx_hash));
        txs
    }

    /// (pending, confirmed) table sizes.
    #[must_use]
    pub fn table_sizes(&self) -> (usize, usize) {
        (self.pending.len(), self.confirmed.len())
    }

    /// Average seconds from detection to confirmation.
    #[must_use]
    pub fn avg_confirmation_secs(&self) -> f64 {
        if self.confirmation_count == 0 {
            0.0
        } else {
            self.confirmation_latency_sum_secs / self.confirmation_count as f64
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventKind;
    use crate::testkit::MockChain;
    use alloy::primitives::{U256, address};

    const WATCHED: Address = address!("a7d9ddbe1f17865597fbd27ec712455208b6b76d");
    const OTHER: Address = address!("f02c1c8e6114b1dbe8937a39260b5b0a374432bb");

    fn notice(number: u64, is_reorg: bool) -> HeadNotice {
        HeadNotice {
            number,
            hash: MockChain::block_hash(number, u8::from(is_reorg)),
            timestamp: 1_700_000_000 + number,
            is_reorg,
            prev_hash: is_reorg.then(|| MockChain::block_hash(number, 0)),
            head: number,
        }
    }

    fn monitor_with_bus() -> (TransactionMonitor, crate::bus::Subscription, Arc<EventBus>) {
        let bus = Arc::new(EventBus::new());
        let sub = bus.subscribe();
        let mut monitor = TransactionMonitor::new(TxMonitorConfig::default(), Arc::clone(&bus));
        monitor.add_address(WATCHED);
        monitor.start().expect("start");
        (monitor, sub, bus)
    }

    fn drain(sub: &mut crate::bus::Subscription) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = sub.events.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn start_requires_addresses_or_filters() {
        let bus = Arc::new(EventBus::new());
        let mut monitor = TransactionMonitor::new(TxMonitorConfig::default(), bus);
        assert!(matches!(monitor.start(), Err(DomainError::EmptyWatchSet)));

        monitor.add_filter(TransactionFilter {
            min_value: Some(U256::from(1u64)),
            ..Default::default()
        });
        assert!(monitor.start().is_ok());
    }

    /// Scenario S1: detect at block 1000, confirm at head 1012.
    #[tokio::test]
    async fn happy_path_detect_then_confirm() {
        let chain = MockChain::new();
        let (mut monitor, mut sub, _bus) = monitor_with_bus();

        let tx = MockChain::value_tx(0xaa, OTHER, WATCHED, U256::from(1u64));
        chain.push_block_with_txs(1_000, vec![tx.clone()]);
        monitor.on_head(notice(1_000, false), &chain).await;

        let events = drain(&mut sub);
        assert_eq!(events.len(), 1);
        let EngineEvent::TransactionDetected(detected) = &events[0] else {
            panic!("expected detection, got {events:?}");
        };
        assert_eq!(detected.block_number, 1_000);
        assert_eq!(detected.confirmations, 0);

        // Heads 1001..=1011: not yet at the threshold.
        for n in 1_001..=1_011 {
            chain.push_block(n);
            monitor.on_head(notice(n, false), &chain).await;
        }
        assert!(drain(&mut sub).is_empty());

        // Head 1012: twelve confirmations, promoted.
        chain.push_block(1_012);
        monitor.on_head(notice(1_012, false), &chain).await;

        let events = drain(&mut sub);
        assert_eq!(events.len(), 1);
        let EngineEvent::TransactionConfirmed(confirmed) = &events[0] else {
            panic!("expected confirmation, got {events:?}");
        };
        assert_eq!(confirmed.confirmations, 12);
        assert_eq!(confirmed.status, TxStatus::Confirmed);
        assert_eq!(monitor.table_sizes(), (0, 1));
    }

    /// Scenario S2: a reorg removes the transaction entirely.
    #[tokio::test]
    async fn reorg_out_fails_the_transaction() {
        let chain = MockChain::new();
        let (mut monitor, mut sub, _bus) = monitor_with_bus();

        let tx = MockChain::value_tx(0xbb, OTHER, WATCHED, U256::from(1u64));
        chain.push_block_with_txs(1_000, vec![tx.clone()]);
        monitor.on_head(notice(1_000, false), &chain).await;
        for n in 1_001..=1_004 {
            chain.push_block(n);
            monitor.on_head(notice(n, false), &chain).await;
        }
        drain(&mut sub);

        // Block 1000 is replaced and the tx is gone from the new branch.
        chain.drop_transaction(tx.hash);
        chain.push_fork_block(1_000, 1, Vec::new());
        monitor.on_head(notice(1_000, true), &chain).await;

        let events = drain(&mut sub);
        let kinds: Vec<_> = events.iter().map(EngineEvent::kind).collect();
        assert_eq!(
            kinds,
            [
                EventKind::TransactionReorganized,
                EventKind::TransactionFailed
            ]
        );
        let EngineEvent::TransactionFailed { reason, .. } = &events[1] else {
            panic!("expected failure");
        };
        assert_eq!(*reason, FailureReason::ReorganizedOut);
        assert_eq!(monitor.table_sizes(), (0, 0));
    }

    /// Scenario S5: inclusive value-range filters.
    #[tokio::test]
    async fn value_filter_is_inclusive() {
        let eth = U256::from(10u64).pow(U256::from(18u64));
        let chain = MockChain::new();
        let bus = Arc::new(EventBus::new());
        let mut sub = bus.subscribe();
        let mut monitor = TransactionMonitor::new(TxMonitorConfig::default(), Arc::clone(&bus));
        monitor.add_address(WATCHED);
        monitor.add_filter(TransactionFilter {
            min_value: Some(eth),
            ..Default::default()
        });
        monitor.start().expect("start");

        // Half an ether: filtered out.
        let small = MockChain::value_tx(0x01, OTHER, WATCHED, eth / U256::from(2u64));
        chain.push_block_with_txs(1_000, vec![small]);
        monitor.on_head(notice(1_000, false), &chain).await;
        assert!(drain(&mut sub).is_empty());

        // Two ether: detected.
        let large = MockChain::value_tx(0x02, OTHER, WATCHED, eth * U256::from(2u64));
        chain.push_block_with_txs(1_001, vec![large]);
        monitor.on_head(notice(1_001, false), &chain).await;
        assert_eq!(drain(&mut sub).len(), 1);
    }

    #[tokio::test]
    async fn detection_is_idempotent() {
        let chain = MockChain::new();
        let (mut monitor, mut sub, _bus) = monitor_with_bus();

        let tx = MockChain::value_tx(0xcc, WATCHED, OTHER, U256::from(7u64));
        chain.push_block_with_txs(1_000, vec![tx]);

        monitor.on_head(notice(1_000, false), &chain).await;
        assert_eq!(drain(&mut sub).len(), 1);

        // Re-observing the same block yields nothing new.
        monitor.on_head(notice(1_000, false), &chain).await;
        assert!(drain(&mut sub).is_empty());
    }

    #[tokio::test]
    async fn reverted_transaction_fails_at_promotion() {
        let chain = MockChain::new();
        let (mut monitor, mut sub, _bus) = monitor_with_bus();

        let tx = MockChain::value_tx(0xdd, OTHER, WATCHED, U256::from(1u64));
        chain.push_block_with_txs(1_000, vec![tx.clone()]);
        chain.revert_receipt(tx.hash);

        monitor.on_head(notice(1_000, false), &chain).await;
        for n in 1_001..=1_012 {
            chain.push_block(n);
            monitor.on_head(notice(n, false), &chain).await;
        }

        let events = drain(&mut sub);
        let last = events.last().expect("events");
        let EngineEvent::TransactionFailed { reason, .. } = last else {
            panic!("expected failure, got {last:?}");
        };
        assert_eq!(*reason, FailureReason::Reverted);
    }

    #[tokio::test]
    async fn lowering_threshold_promotes_immediately() {
        let chain = MockChain::new();
        let (mut monitor, mut sub, _bus) = monitor_with_bus();

        let tx = MockChain::value_tx(0xee, OTHER, WATCHED, U256::from(1u64));
        chain.push_block_with_txs(1_000, vec![tx]);
        monitor.on_head(notice(1_000, false), &chain).await;
        for n in 1_001..=1_005 {
            chain.push_block(n);
            monitor.on_head(notice(n, false), &chain).await;
        }
        drain(&mut sub);

        // Five confirmations on the books; lower the bar to three.
        monitor
            .set_confirmation_threshold(3, &chain)
            .await
            .expect("threshold");

        let events = drain(&mut sub);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), EventKind::TransactionConfirmed);
    }

    #[tokio::test]
    async fn pending_table_is_bounded() {
        let chain = MockChain::new();
        let bus = Arc::new(EventBus::new());
        let config = TxMonitorConfig {
            max_pending: 3,
            ..Default::default()
        };
        let mut monitor = TransactionMonitor::new(config, bus);
        monitor.add_address(WATCHED);
        monitor.start().expect("start");

        let txs: Vec<_> = (1..=5)
            .map(|i| MockChain::value_tx(i, WATCHED, OTHER, U256::from(1u64)))
            .collect();
        chain.push_block_with_txs(1_000, txs);
        monitor.on_head(notice(1_000, false), &chain).await;

        assert_eq!(monitor.table_sizes().0, 3);
    }

    #[tokio::test]
    async fn track_transaction_registers_pending_mempool_entry() {
        let chain = MockChain::new();
        let (mut monitor, mut sub, _bus) = monitor_with_bus();

        // A mempool transaction: known to the node, not yet mined.
        let tx = MockChain::value_tx(0x77, OTHER, OTHER, U256::from(9u64));
        chain.add_mempool_tx(tx.clone());

        let tracked = monitor
            .track_transaction(tx.hash, &chain)
            .await
            .expect("lookup")
            .expect("known");
        assert_eq!(tracked.status, TxStatus::Pending);
        assert_eq!(tracked.block_number, 0);
        assert_eq!(drain(&mut sub).len(), 1);

        // Unknown hashes surface as None.
        let missing = monitor
            .track_transaction(B256::repeat_byte(0x99), &chain)
            .await
            .expect("lookup");
        assert!(missing.is_none());
    }
}
