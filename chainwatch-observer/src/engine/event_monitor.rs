//! Event monitor: filter registry, log lifecycle, user-action synthesis.
//!
//! The monitor owns the event, reorganization, and user-action tables. On
//! every head notice it:
//!
//! 1. Fetches logs per active filter for exactly that block (serial by
//!    default; a small bounded fan-out when the endpoint's rate cap
//!    allows).
//! 2. Deduplicates by event id (txHash ∥ logIndex) and enqueues new events
//!    as pending.
//! 3. Promotes pending events at the confirmation threshold, attaching
//!    decoded fields and protocol classification from the catalog.
//! 4. On a reorg notice, re-fetches the canonical logs for the replaced
//!    block, compares by event id, and demotes or drops accordingly.
//! 5. Coalesces the confirmed events of each transaction into a single
//!    `UserActionDetected`.
//!
//! Per-filter fetch failures are logged with block and filter context and
//! skipped; the loop always advances.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256};
use chrono::{DateTime, Utc};
use eth_rpc::LogFilter;
use futures::future::join_all;
use moka::sync::Cache as MokaCache;
use tracing::{debug, info, instrument, warn};

use crate::bus::{EngineEvent, EventBus};
use crate::catalog::{self, LogDecoder};
use crate::error::DomainError;
use crate::ports::ChainSource;
use crate::types::{
    ActionKind, EventFilter, EventId, HeadNotice, MonitoredEvent, ReorgRecord, UserAction,
};

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Reorganization history bound.
const REORG_HISTORY_CAP: usize = 1_024;

/// User-action history bound.
const ACTION_HISTORY_CAP: usize = 10_000;

/// Block-timestamp cache bound.
const TIMESTAMP_CACHE_CAPACITY: u64 = 10_000;

/// Detection timestamps kept for the events-per-second estimate.
const RATE_WINDOW: Duration = Duration::from_secs(60);

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

/// Tunables for the event monitor.
#[derive(Debug, Clone)]
pub struct EventMonitorConfig {
    /// Confirmations required before promotion.
    pub confirmation_threshold: u64,
    /// Depth below head within which reorgs are re-checked.
    pub reorg_depth: u64,
    /// How long confirmed events stay in memory.
    pub retention: Duration,
    /// Concurrent per-filter `getLogs` calls (1 = serial, capped at 4).
    pub getlogs_parallelism: usize,
}

impl Default for EventMonitorConfig {
    fn default() -> Self {
        Self {
            confirmation_threshold: 12,
            reorg_depth: 20,
            retention: Duration::from_secs(86_400),
            getlogs_parallelism: 1,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT MONITOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Single owner of the event, reorg, and user-action tables.
pub struct EventMonitor {
    config: EventMonitorConfig,
    bus: Arc<EventBus>,
    decoder: LogDecoder,
    enabled: bool,

    filters: HashMap<String, EventFilter>,

    pending: HashMap<EventId, MonitoredEvent>,
    confirmed: HashMap<EventId, ConfirmedEntry>,
    reorgs: VecDeque<ReorgRecord>,
    actions: VecDeque<UserAction>,
    /// Transactions whose user action has already been emitted.
    actions_emitted: HashSet<B256>,

    /// number → block timestamp, filled from notices and backfill blocks.
    block_timestamps: MokaCache<u64, u64>,
    /// Recent detection instants for the events-per-second estimate.
    detection_times: VecDeque<std::time::Instant>,

    last_head: u64,
}

#[derive(Debug, Clone)]
struct ConfirmedEntry {
    event: MonitoredEvent,
    confirmed_at: DateTime<Utc>,
}

impl std::fmt::Debug for EventMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventMonitor")
            .field("enabled", &self.enabled)
            .field("filters", &self.filters.len())
            .field("pending", &self.pending.len())
            .field("confirmed", &self.confirmed.len())
            .field("reorgs", &self.reorgs.len())
            .field("actions", &self.actions.len())
            .finish()
    }
}

impl EventMonitor {
    /// Create a monitor publishing on `bus`.
    #[must_use]
    pub fn new(config: EventMonitorConfig, bus: Arc<EventBus>) -> Self {
        Self {
            config,
            bus,
            decoder: LogDecoder::new(),
            enabled: false,
            filters: HashMap::new(),
            pending: HashMap::new(),
            confirmed: HashMap::new(),
            reorgs: VecDeque::new(),
            actions: VecDeque::new(),
            actions_emitted: HashSet::new(),
            block_timestamps: MokaCache::builder()
                .max_capacity(TIMESTAMP_CACHE_CAPACITY)
                .build(),
            detection_times: VecDeque::new(),
            last_head: 0,
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // COMMANDS
    // ───────────────────────────────────────────────────────────────────────────

    /// Install the protocol catalog's default filters.
    pub fn install_default_filters(&mut self) {
        for filter in catalog::default_event_filters() {
            self.filters.insert(filter.filter_id(), filter);
        }
        info!(filters = self.filters.len(), "Default event filters installed");
    }

    /// Start emitting.
    pub fn start(&mut self) {
        self.enabled = true;
        info!(filters = self.filters.len(), "Event monitoring started");
    }

    /// Stop emitting; tables are retained.
    pub fn stop(&mut self) {
        self.enabled = false;
        info!("Event monitoring stopped");
    }

    /// Whether the monitor is currently emitting.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Install a filter; returns its derived id.
    pub fn add_filter(&mut self, filter: EventFilter) -> String {
        let id = filter.filter_id();
        self.filters.insert(id.clone(), filter);
        id
    }

    /// Remove a filter by id.
    ///
    /// # Errors
    ///
    /// Fails with [`DomainError::UnknownEventFilter`] when the id is not
    /// installed.
    pub fn remove_filter(&mut self, filter_id: &str) -> Result<(), DomainError> {
        self.filters
            .remove(filter_id)
            .map(|_| ())
            .ok_or_else(|| DomainError::UnknownEventFilter(filter_id.to_string()))
    }

    /// Number of active filters.
    #[must_use]
    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    /// Change the confirmation threshold at runtime.
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
        if lowered && self.last_head > 0 {
            self.promote(source).await;
        }
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    // BLOCK PROCESSING
    // ───────────────────────────────────────────────────────────────────────────

    /// Process one head notice.
    #[instrument(skip(self, source), fields(block = notice.number, reorg = notice.is_reorg))]
    pub async fn on_head(&mut self, notice: HeadNotice, source: &dyn ChainSource) {
        self.last_head = self.last_head.max(notice.head);
        self.block_timestamps.insert(notice.number, notice.timestamp);
        if !self.enabled {
            return;
        }

        if notice.is_reorg {
            self.handle_reorg(&notice, source).await;
        }

        let logs = self.fetch_block_logs(notice.number, source).await;
        for log in logs {
            self.ingest_log(&log, source).await;
        }

        self.promote(source).await;
    }

    /// Feed a historical block's logs through the live path.
    pub async fn on_backfill_block(&mut self, block: &eth_rpc::Block, source: &dyn ChainSource) {
        if !self.enabled {
            return;
        }
        self.block_timestamps.insert(block.number, block.timestamp);
        let logs = self.fetch_block_logs(block.number, source).await;
        for log in logs {
            self.ingest_log(&log, source).await;
        }
        self.promote(source).await;
    }

    /// Per-filter `getLogs` for one block, serial or with bounded fan-out.
    async fn fetch_block_logs(&self, number: u64, source: &dyn ChainSource) -> Vec<eth_rpc::Log> {
        let filters: Vec<(String, LogFilter)> = self
            .filters
            .values()
            .map(|f| {
                (
                    f.filter_id(),
                    LogFilter::for_block(number)
                        .with_address(f.contract)
                        .with_topics(f.topics()),
                )
            })
            .collect();

        let parallelism = self.config.getlogs_parallelism.clamp(1, 4);
        let mut logs = Vec::new();

        for chunk in filters.chunks(parallelism) {
            let results = join_all(chunk.iter().map(|(_, filter)| source.logs(filter))).await;
            for ((filter_id, _), result) in chunk.iter().zip(results) {
                match result {
                    Ok(batch) => logs.extend(batch),
                    Err(error) if error.is_cancelled() => return logs,
                    Err(error) => {
                        // Skipped, never fatal; the filter runs again next block.
                        warn!(block = number, filter = %filter_id, %error, "getLogs failed");
                    }
                }
            }
        }

        // Deterministic ordering across filters.
        logs.sort_by_key(|log| (log.block_number, log.log_index));
        logs
    }

    /// Deduplicate, build the record, and enqueue one raw log.
    async fn ingest_log(&mut self, log: &eth_rpc::Log, source: &dyn ChainSource) {
        let (Some(tx_hash), Some(log_index), Some(block_number), Some(block_hash)) = (
            log.transaction_hash,
            log.log_index,
            log.block_number,
            log.block_hash,
        ) else {
            debug!("Skipping log without placement fields");
            return;
        };
        let event_id = EventId::new(tx_hash, log_index);

        // Placement refresh for an already-tracked event (post-reorg
        // re-observation on the new branch).
        if let Some(existing) = self.pending.get_mut(&event_id) {
            if existing.block_hash != block_hash {
                existing.block_hash = block_hash;
                existing.block_number = block_number;
                existing.confirmations = self.last_head.saturating_sub(block_number);
                let refreshed = existing.clone();
                self.bus.publish(&EngineEvent::EventReorganized(refreshed));
            }
            return;
        }
        if self.confirmed.contains_key(&event_id) {
            return;
        }

        let block_timestamp = self.block_timestamp(block_number, source).await;
        let event = MonitoredEvent {
            event_id,
            contract: log.address,
            event_name: LogDecoder::event_name(&log.topics.first().copied().unwrap_or_default())
                .map(ToString::to_string),
            block_number,
            block_hash,
            tx_hash,
            tx_index: log.transaction_index.unwrap_or_default(),
            log_index,
            topics: log.topics.clone(),
            data: log.data.clone(),
            block_timestamp,
            confirmations: self.last_head.saturating_sub(block_number),
            confirmed: false,
            decoded_fields: None,
            protocol_name: None,
        };

        metrics::counter!("chainwatch_events_detected").increment(1);
        self.note_detection();
        self.bus.publish(&EngineEvent::EventDetected(event.clone()));
        self.pending.insert(event_id, event);
    }

    /// Promote pending events at the threshold; coalesce user actions.
    async fn promote(&mut self, source: &dyn ChainSource) {
        let head = self.last_head;
        let threshold = self.config.confirmation_threshold;

        let mut promoted: Vec<EventId> = Vec::new();
        for event in self.pending.values_mut() {
            event.confirmations = head.saturating_sub(event.block_number);
            if event.confirmations >= threshold {
                promoted.push(event.event_id);
            }
        }
        if promoted.is_empty() {
            return;
        }
        promoted.sort_unstable();

        let mut confirmed_txs: Vec<B256> = Vec::new();
        for event_id in promoted {
            let Some(mut event) = self.pending.remove(&event_id) else {
                continue;
            };
            event.confirmed = true;

            // Attach the decoded payload; unknown signatures still emit.
            match self.decoder.decode_log(&raw_log_of(&event)) {
                Ok(decoded) => {
                    event.event_name = Some(decoded.event_name.to_string());
                    event.protocol_name = decoded.protocol.map(|p| p.name().to_string());
                    event.decoded_fields = Some(decoded.fields);
                }
                Err(error) => {
                    debug!(event = %event.event_id, %error, "Event not decodable");
                }
            }

            metrics::counter!("chainwatch_events_confirmed").increment(1);
            self.bus.publish(&EngineEvent::EventConfirmed(event.clone()));
            if !confirmed_txs.contains(&event.tx_hash) {
                confirmed_txs.push(event.tx_hash);
            }
            self.confirmed.insert(
                event_id,
                ConfirmedEntry {
                    event,
                    confirmed_at: Utc::now(),
                },
            );
        }

        for tx_hash in confirmed_txs {
            self.coalesce_user_action(tx_hash, source).await;
        }
    }

    /// Build and emit the single user action for one transaction.
    async fn coalesce_user_action(&mut self, tx_hash: B256, source: &dyn ChainSource) {
        if self.actions_emitted.contains(&tx_hash) {
            return;
        }

        // Every tracked event of this transaction, in log order.
        let mut tx_events: Vec<&MonitoredEvent> = self
            .confirmed
            .values()
            .map(|entry| &entry.event)
            .filter(|event| event.tx_hash == tx_hash)
            .collect();
        tx_events.sort_by_key(|event| event.log_index);

        // The first confirmed event with a recognizable kind wins the tie.
        let Some((typed_event, action)) = tx_events.iter().find_map(|event| {
            event
                .event_name
                .as_deref()
                .and_then(ActionKind::from_event_name)
                .map(|kind| (*event, kind))
        }) else {
            // Nothing action-like (e.g. only transfers): no user action.
            return;
        };

        // The acting user is the transaction sender.
        let user = match source.transaction(tx_hash).await {
            Ok(Some(tx)) => tx.from,
            Ok(None) | Err(_) => {
                // Fall back to the decoded payload's user-ish field.
                decoded_user(typed_event).unwrap_or(Address::ZERO)
            }
        };

        let action = UserAction {
            user,
            action,
            protocol: typed_event.protocol_name.clone(),
            tx_hash,
            block_number: typed_event.block_number,
            block_timestamp: typed_event.block_timestamp,
            details: typed_event.decoded_fields.clone(),
            events: tx_events.iter().map(|event| event.event_id).collect(),
        };

        info!(
            tx = %tx_hash,
            action = ?action.action,
            events = action.events.len(),
            "User action detected"
        );
        metrics::counter!("chainwatch_user_actions").increment(1);
        self.actions_emitted.insert(tx_hash);
        self.bus
            .publish(&EngineEvent::UserActionDetected(action.clone()));
        self.actions.push_back(action);
        while self.actions.len() > ACTION_HISTORY_CAP {
            if let Some(evicted) = self.actions.pop_front() {
                self.actions_emitted.remove(&evicted.tx_hash);
            }
        }
    }

    /// Re-validate every tracked event against the reorganized chain.
    async fn handle_reorg(&mut self, notice: &HeadNotice, source: &dyn ChainSource) {
        let reorg_block = notice.number;

        // Canonical events of the replacement block.
        let canonical: HashSet<EventId> = self
            .fetch_block_logs(reorg_block, source)
            .await
            .iter()
            .filter_map(|log| {
                Some(EventId::new(log.transaction_hash?, log.log_index?))
            })
            .collect();

        let affected: Vec<EventId> = self
            .pending
            .values()
            .map(|event| (event.event_id, event.block_number))
            .chain(
                self.confirmed
                    .values()
                    .map(|entry| (entry.event.event_id, entry.event.block_number)),
            )
            .filter(|(_, block)| *block >= reorg_block)
            .map(|(id, _)| id)
            .collect();

        let mut dropped_ids = Vec::new();
        for event_id in affected {
            let Some(mut event) = self.remove_tracked(event_id) else {
                continue;
            };
            event.confirmed = false;
            event.confirmations = 0;

            let survives =
                event.block_number > reorg_block || canonical.contains(&event_id);
            if survives {
                // Same id on (or above) the new branch: demote, update the
                // block hash when re-observed, and let it re-confirm.
                event.block_hash = if event.block_number == reorg_block {
                    notice.hash
                } else {
                    event.block_hash
                };
                self.bus.publish(&EngineEvent::EventReorganized(event.clone()));
                self.pending.insert(event_id, event);
            } else {
                // Gone from the canonical chain: dropped.
                self.bus.publish(&EngineEvent::EventReorganized(event));
                dropped_ids.push(event_id);
            }
        }

        let record = ReorgRecord {
            block_number: reorg_block,
            old_hash: notice.prev_hash.unwrap_or_default(),
            new_hash: notice.hash,
            affected_event_ids: dropped_ids,
            detected_at: Utc::now(),
        };
        self.bus
            .publish(&EngineEvent::ChainReorganization(record.clone()));
        self.reorgs.push_back(record);
        while self.reorgs.len() > REORG_HISTORY_CAP {
            self.reorgs.pop_front();
        }
    }

    fn remove_tracked(&mut self, event_id: EventId) -> Option<MonitoredEvent> {
        self.pending
            .remove(&event_id)
            .or_else(|| self.confirmed.remove(&event_id).map(|entry| entry.event))
    }

    /// Resolve a block timestamp: notice/backfill cache first, then RPC.
    async fn block_timestamp(&self, number: u64, source: &dyn ChainSource) -> u64 {
        if let Some(cached) = self.block_timestamps.get(&number) {
            return cached;
        }
        match source.block_by_number(number, false).await {
            Ok(Some(block)) => {
                self.block_timestamps.insert(number, block.timestamp);
                block.timestamp
            }
            Ok(None) => 0,
            Err(error) => {
                warn!(number, %error, "Block timestamp fetch failed");
                0
            }
        }
    }

    fn note_detection(&mut self) {
        let now = std::time::Instant::now();
        self.detection_times.push_back(now);
        while self
            .detection_times
            .front()
            .is_some_and(|t| now.duration_since(*t) > RATE_WINDOW)
        {
            self.detection_times.pop_front();
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // MAINTENANCE & QUERIES
    // ───────────────────────────────────────────────────────────────────────────

    /// Evict confirmed events older than the retention window.
    pub fn cleanup(&mut self) {
        let retention = chrono::Duration::from_std(self.config.retention)
            .unwrap_or_else(|_| chrono::Duration::hours(24));
        let now = Utc::now();
        let before = self.confirmed.len();
        self.confirmed
            .retain(|_, entry| now - entry.confirmed_at <= retention);
        let evicted = before - self.confirmed.len();
        if evicted > 0 {
            debug!(evicted, "Aged out confirmed events");
        }
    }

    /// By-value snapshot of the pending table.
    #[must_use]
    pub fn pending_snapshot(&self) -> Vec<MonitoredEvent> {
        let mut events: Vec<_> = self.pending.values().cloned().collect();
        events.sort_by_key(|event| event.event_id);
        events
    }

    /// By-value snapshot of the confirmed table.
    #[must_use]
    pub fn confirmed_snapshot(&self) -> Vec<MonitoredEvent> {
        let mut events: Vec<_> = self
            .confirmed
            .values()
            .map(|entry| entry.event.clone())
            .collect();
        events.sort_by_key(|event| event.event_id);
        events
    }

    /// By-value snapshot of the reorganization history.
    #[must_use]
    pub fn reorg_snapshot(&self) -> Vec<ReorgRecord> {
        self.reorgs.iter().cloned().collect()
    }

    /// By-value snapshot of the user-action history.
    #[must_use]
    pub fn actions_snapshot(&self) -> Vec<UserAction> {
        self.actions.iter().cloned().collect()
    }

    /// Confirmed events belonging to one user's actions.
    #[must_use]
    pub fn user_events(&self, user: Address) -> Vec<MonitoredEvent> {
        let ids: HashSet<EventId> = self
            .actions
            .iter()
            .filter(|action| action.user == user)
            .flat_map(|action| action.events.iter().copied())
            .collect();
        let mut events: Vec<_> = self
            .confirmed
            .values()
            .map(|entry| &entry.event)
            .filter(|event| ids.contains(&event.event_id))
            .cloned()
            .collect();
        events.sort_by_key(|event| event.event_id);
        events
    }

    /// (pending, confirmed) table sizes.
    #[must_use]
    pub fn table_sizes(&self) -> (usize, usize) {
        (self.pending.len(), self.confirmed.len())
    }

    /// Detections per second over the trailing minute.
    #[must_use]
    pub fn events_per_second(&self) -> f64 {
        self.detection_times.len() as f64 / RATE_WINDOW.as_secs_f64()
    }
}

/// Rebuild the wire log an event was ingested from, for the decoder.
fn raw_log_of(event: &MonitoredEvent) -> eth_rpc::Log {
    eth_rpc::Log {
        address: event.contract,
        topics: event.topics.clone(),
        data: event.data.clone(),
        block_number: Some(event.block_number),
        block_hash: Some(event.block_hash),
        transaction_hash: Some(event.tx_hash),
        transaction_index: Some(event.tx_index),
        log_index: Some(event.log_index),
        removed: false,
    }
}

/// Best-effort user extraction from decoded fields.
fn decoded_user(event: &MonitoredEvent) -> Option<Address> {
    let fields = event.decoded_fields.as_ref()?;
    for key in ["user", "sender", "onBehalfOf", "from", "owner"] {
        if let Some(crate::catalog::DecodedValue::Address(address)) = fields.get(key) {
            return Some(*address);
        }
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
