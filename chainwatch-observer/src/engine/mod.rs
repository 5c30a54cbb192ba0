//! The observation engine: worker wiring and the public command/query API.
//!
//! # Workers
//!
//! One tokio task per concern, all stopped by a shared cancellation token:
//!
//! - **Health probe** - times `eth_blockNumber` against every endpoint.
//! - **Connection supervisor** - dials, streams `newHeads`, fails over.
//! - **Monitor loop** - owns the block tracker and both monitors; consumes
//!   live headers, backfill blocks, and command messages, so every table
//!   keeps exactly one writer.
//! - **Backfill scanner** - started on demand per request.
//!
//! Cross-component communication is typed channels only; queries are
//! request/reply messages returning by-value snapshots.

pub mod backfill;
pub mod block_tracker;
pub mod event_monitor;
pub mod tx_monitor;

pub use backfill::{BackfillRequest, BackfillScanner};
pub use block_tracker::BlockTracker;
pub use event_monitor::{EventMonitor, EventMonitorConfig};
pub use tx_monitor::{TransactionMonitor, TxMonitorConfig};

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256};
use provider_pool::{
    ConnectionManager, ConnectionState, HealthProbe, ProviderRegistry, RateLimiter,
};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::bus::{EngineEvent, EventBus, Subscription};
use crate::config::Settings;
use crate::error::{DomainError, EngineError, Result};
use crate::ports::{ChainSource, PooledChainSource};
use crate::types::{
    EventFilter, MonitoredEvent, MonitoredTransaction, ReorgRecord, TransactionFilter, UserAction,
};

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Endpoint rate cap at which per-filter getLogs fan-out (≤ 4) kicks in.
const PARALLEL_GETLOGS_RPS: u32 = 20;

/// Capacity of the command and backfill channels.
const CHANNEL_CAPACITY: usize = 256;

// ═══════════════════════════════════════════════════════════════════════════════
// STATS
// ═══════════════════════════════════════════════════════════════════════════════

/// Snapshot returned by [`ObservationEngine::monitoring_stats`].
#[derive(Debug, Clone, Serialize)]
pub struct MonitoringStats {
    /// Whether the streaming connection is up.
    pub connected: bool,
    /// Endpoint currently carrying the stream.
    pub current_endpoint: Option<String>,
    /// Highest header number seen.
    pub head_block: u64,
    /// Pending transaction count.
    pub pending_transactions: usize,
    /// Confirmed transaction count.
    pub confirmed_transactions: usize,
    /// Active event filter count.
    pub filters: usize,
    /// Event detections per second (trailing minute).
    pub events_per_second: f64,
    /// Average detection-to-confirmation latency in seconds.
    pub avg_confirmation_secs: f64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMANDS
// ═══════════════════════════════════════════════════════════════════════════════

/// Messages into the monitor loop. Every table mutation and snapshot goes
/// through here, keeping the loop the single writer.
enum Command {
    StartTxMonitoring(oneshot::Sender<std::result::Result<(), DomainError>>),
    StopTxMonitoring(oneshot::Sender<()>),
    AddAddress(Address, oneshot::Sender<()>),
    RemoveAddress(Address, oneshot::Sender<()>),
    AddTxFilter(TransactionFilter, oneshot::Sender<()>),
    StartEventMonitoring(oneshot::Sender<()>),
    StopEventMonitoring(oneshot::Sender<()>),
    AddEventFilter(EventFilter, oneshot::Sender<String>),
    RemoveEventFilter(String, oneshot::Sender<std::result::Result<(), DomainError>>),
    SetConfirmationThreshold(u64, oneshot::Sender<std::result::Result<(), DomainError>>),
    TrackTransaction(B256, oneshot::Sender<Result<Option<MonitoredTransaction>>>),
    PendingTransactions(oneshot::Sender<Vec<MonitoredTransaction>>),
    ConfirmedTransactions(oneshot::Sender<Vec<MonitoredTransaction>>),
    PendingEvents(oneshot::Sender<Vec<MonitoredEvent>>),
    ConfirmedEvents(oneshot::Sender<Vec<MonitoredEvent>>),
    ChainReorganizations(oneshot::Sender<Vec<ReorgRecord>>),
    UserActions(oneshot::Sender<Vec<UserAction>>),
    UserEvents(Address, oneshot::Sender<Vec<MonitoredEvent>>),
    TableStats(oneshot::Sender<TableStats>),
}

#[derive(Debug, Clone, Copy)]
struct TableStats {
    pending_transactions: usize,
    confirmed_transactions: usize,
    filters: usize,
    events_per_second: f64,
    avg_confirmation_secs: f64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// The assembled observation engine.
///
/// Constructed with [`ObservationEngine::start`]; emits on its
/// [`EventBus`]; stopped with [`ObservationEngine::disconnect`].
pub struct ObservationEngine {
    settings: Settings,
    registry: Arc<ProviderRegistry>,
    connection: Arc<ConnectionManager>,
    bus: Arc<EventBus>,
    source: Arc<dyn ChainSource>,
    commands: mpsc::Sender<Command>,
    backfill_sink: mpsc::Sender<eth_rpc::Block>,
    shutdown: CancellationToken,
    workers: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for ObservationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservationEngine")
            .field("endpoints", &self.settings.endpoints.len())
            .field("connection", &self.connection.state())
            .finish()
    }
}

impl ObservationEngine {
    /// Validate configuration, verify that at least one endpoint answers,
    /// and spawn the workers.
    ///
    /// # Errors
    ///
    /// [`EngineError::Config`] for invalid settings and
    /// [`EngineError::Initialization`] when no endpoint is healthy at
    /// startup - both fatal, per the propagation policy.
    pub async fn start(settings: Settings) -> Result<Self> {
        settings
            .validate()
            .map_err(|errors| EngineError::Config(errors.join("; ")))?;

        // Registry and rate buckets.
        let registry = Arc::new(ProviderRegistry::new());
        let limiter = Arc::new(RateLimiter::new());
        for endpoint in &settings.endpoints {
            limiter.register(endpoint.name.clone(), endpoint.rate_limit_rps);
            registry
                .register(endpoint.clone())
                .map_err(|e| EngineError::Config(e.to_string()))?;
        }

        // One synchronous probe round: nothing answering here is fatal.
        // (The three-strike unhealthy threshold is for runtime flapping;
        // at startup an endpoint must actually respond.)
        let probe = HealthProbe::with_interval(
            Arc::clone(&registry),
            settings.monitoring.health_probe_interval(),
        );
        probe.probe_all().await;
        let any_responsive = registry
            .snapshot()
            .iter()
            .any(|endpoint| endpoint.health.healthy && endpoint.health.head_block.is_some());
        if !any_responsive {
            return Err(EngineError::Initialization(
                "no healthy endpoint at startup".into(),
            ));
        }

        let shutdown = CancellationToken::new();
        let bus = Arc::new(EventBus::new());
        let (connection, header_rx) = ConnectionManager::new(
            Arc::clone(&registry),
            Arc::clone(&limiter),
            shutdown.clone(),
        );
        let source: Arc<dyn ChainSource> =
            Arc::new(PooledChainSource::new(Arc::clone(&connection)));

        let (command_tx, command_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (backfill_sink, backfill_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let engine = Self {
            registry,
            connection: Arc::clone(&connection),
            bus: Arc::clone(&bus),
            source: Arc::clone(&source),
            commands: command_tx,
            backfill_sink,
            shutdown: shutdown.clone(),
            workers: parking_lot::Mutex::new(Vec::new()),
            settings,
        };

        // Worker: health probe timer.
        let probe_shutdown = shutdown.clone();
        engine.workers.lock().push(tokio::spawn(async move {
            probe.run(probe_shutdown).await;
        }));

        // Worker: connection supervisor (stream ingestion included).
        engine.workers.lock().push(tokio::spawn(async move {
            if let Err(error) = connection.run().await {
                error!(%error, "Connection supervisor exited");
            }
        }));

        // Worker: monitor loop.
        let loop_ctx = MonitorLoop {
            tracker: BlockTracker::new(engine.settings.monitoring.block_window),
            tx_monitor: TransactionMonitor::new(
                engine.tx_monitor_config(),
                Arc::clone(&bus),
            ),
            event_monitor: {
                let mut monitor =
                    EventMonitor::new(engine.event_monitor_config(), Arc::clone(&bus));
                monitor.install_default_filters();
                monitor
            },
            source,
            cleanup_interval: engine.settings.monitoring.cleanup_interval(),
            shutdown,
        };
        engine.workers.lock().push(tokio::spawn(loop_ctx.run(
            header_rx,
            backfill_rx,
            command_rx,
        )));

        info!(
            endpoints = engine.settings.endpoints.len(),
            "Observation engine started"
        );
        Ok(engine)
    }

    fn tx_monitor_config(&self) -> TxMonitorConfig {
        let m = &self.settings.monitoring;
        TxMonitorConfig {
            confirmation_threshold: m.confirmation_threshold,
            reorg_depth: m.reorg_depth,
            max_pending_age: m.max_pending_age(),
            max_pending: m.max_pending_transactions,
            retention: m.retention(),
        }
    }

    fn event_monitor_config(&self) -> EventMonitorConfig {
        let m = &self.settings.monitoring;
        let high_cap = self
            .settings
            .endpoints
            .iter()
            .any(|e| e.rate_limit_rps >= PARALLEL_GETLOGS_RPS);
        EventMonitorConfig {
            confirmation_threshold: m.confirmation_threshold,
            reorg_depth: m.reorg_depth,
            retention: m.retention(),
            getlogs_parallelism: if high_cap { 4 } else { 1 },
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // SUBSCRIPTIONS
    // ───────────────────────────────────────────────────────────────────────────

    /// Subscribe to every published event.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe()
    }

    /// The engine's event bus, for kind-filtered subscriptions.
    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    // ───────────────────────────────────────────────────────────────────────────
    // COMMAND API
    // ───────────────────────────────────────────────────────────────────────────

    /// Start transaction monitoring.
    ///
    /// # Errors
    /// Fails when the watch set is empty or the engine is shutting down.
    pub async fn start_transaction_monitoring(&self) -> Result<()> {
        self.send(Command::StartTxMonitoring).await??;
        Ok(())
    }

    /// Stop transaction monitoring.
    ///
    /// # Errors
    /// Fails when the engine is shutting down.
    pub async fn stop_transaction_monitoring(&self) -> Result<()> {
        self.send(Command::StopTxMonitoring).await
    }

    /// Add an address to the transaction watch-list.
    ///
    /// # Errors
    /// Fails when the engine is shutting down.
    pub async fn add_address_to_monitor(&self, address: Address) -> Result<()> {
        self.send(|reply| Command::AddAddress(address, reply)).await
    }

    /// Remove an address from the transaction watch-list.
    ///
    /// # Errors
    /// Fails when the engine is shutting down.
    pub async fn remove_address_from_monitor(&self, address: Address) -> Result<()> {
        self.send(|reply| Command::RemoveAddress(address, reply))
            .await
    }

    /// Install a transaction filter.
    ///
    /// # Errors
    /// Fails when the engine is shutting down.
    pub async fn add_transaction_filter(&self, filter: TransactionFilter) -> Result<()> {
        self.send(|reply| Command::AddTxFilter(filter, reply)).await
    }

    /// Start event monitoring.
    ///
    /// # Errors
    /// Fails when the engine is shutting down.
    pub async fn start_event_monitoring(&self) -> Result<()> {
        self.send(Command::StartEventMonitoring).await
    }

    /// Stop event monitoring.
    ///
    /// # Errors
    /// Fails when the engine is shutting down.
    pub async fn stop_event_monitoring(&self) -> Result<()> {
        self.send(Command::StopEventMonitoring).await
    }

    /// Install an event filter; returns its derived id.
    ///
    /// # Errors
    /// Fails when the engine is shutting down.
    pub async fn add_event_filter(&self, filter: EventFilter) -> Result<String> {
        self.send(|reply| Command::AddEventFilter(filter, reply))
            .await
    }

    /// Remove an event filter by id.
    ///
    /// # Errors
    /// Fails for unknown ids or when the engine is shutting down.
    pub async fn remove_event_filter(&self, filter_id: impl Into<String>) -> Result<()> {
        self.send(|reply| Command::RemoveEventFilter(filter_id.into(), reply))
            .await??;
        Ok(())
    }

    /// Change the confirmation threshold for both monitors at runtime.
    ///
    /// # Errors
    /// Fails when the threshold is outside 1..=100.
    pub async fn set_confirmation_threshold(&self, threshold: u64) -> Result<()> {
        self.send(|reply| Command::SetConfirmationThreshold(threshold, reply))
            .await??;
        Ok(())
    }

    /// Register a specific transaction hash for lifecycle tracking.
    ///
    /// # Errors
    /// Propagates lookup failures; unknown hashes return `Ok(None)`.
    pub async fn track_transaction(&self, hash: B256) -> Result<Option<MonitoredTransaction>> {
        self.send(|reply| Command::TrackTransaction(hash, reply))
            .await?
    }

    /// Run one historical backfill to completion and announce it.
    ///
    /// # Errors
    /// [`EngineError::BackfillAborted`] when a window keeps failing.
    pub async fn backfill_transactions(&self, request: BackfillRequest) -> Result<(u64, u64)> {
        let scanner = BackfillScanner::new(
            Arc::clone(&self.source),
            self.backfill_sink.clone(),
            self.settings.backfill.batch_size,
            self.settings.backfill.batch_delay(),
        );
        let (from, to) = scanner.run(request, self.shutdown.clone()).await?;
        self.bus.publish(&EngineEvent::BackfillCompleted {
            from_block: from,
            to_block: to,
        });
        Ok((from, to))
    }

    /// Pin the connection to one endpoint.
    ///
    /// # Errors
    /// Fails for unknown or unhealthy endpoints.
    pub fn force_provider(&self, name: &str) -> Result<()> {
        Ok(self.connection.force_provider(name)?)
    }

    /// Shut down: cancel every worker, drain in-flight calls, and wait for
    /// the tasks to finish (bounded by twice the longest endpoint timeout).
    pub async fn disconnect(&self) {
        info!("Engine disconnecting");
        self.connection.disconnect();

        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        let deadline = self.shutdown_bound();
        for worker in workers {
            if tokio::time::timeout(deadline, worker).await.is_err() {
                warn!("Worker did not stop within the shutdown bound");
            }
        }
        info!("Engine disconnected");
    }

    fn shutdown_bound(&self) -> Duration {
        let longest = self
            .settings
            .endpoints
            .iter()
            .map(provider_pool::EndpointConfig::timeout)
            .max()
            .unwrap_or(Duration::from_secs(10));
        longest * 2
    }

    // ───────────────────────────────────────────────────────────────────────────
    // QUERY API
    // ───────────────────────────────────────────────────────────────────────────

    /// Connection and table statistics.
    ///
    /// # Errors
    /// Fails when the engine is shutting down.
    pub async fn monitoring_stats(&self) -> Result<MonitoringStats> {
        let tables = self.send(Command::TableStats).await?;
        let connection: ConnectionState = self.connection.state();
        Ok(MonitoringStats {
            connected: connection.connected,
            current_endpoint: connection.current_endpoint,
            head_block: connection.last_head_block,
            pending_transactions: tables.pending_transactions,
            confirmed_transactions: tables.confirmed_transactions,
            filters: tables.filters,
            events_per_second: tables.events_per_second,
            avg_confirmation_secs: tables.avg_confirmation_secs,
        })
    }

    /// Snapshot of the pending transaction table.
    ///
    /// # Errors
    /// Fails when the engine is shutting down.
    pub async fn pending_transactions(&self) -> Result<Vec<MonitoredTransaction>> {
        self.send(Command::PendingTransactions).await
    }

    /// Snapshot of the confirmed transaction table.
    ///
    /// # Errors
    /// Fails when the engine is shutting down.
    pub async fn confirmed_transactions(&self) -> Result<Vec<MonitoredTransaction>> {
        self.send(Command::ConfirmedTransactions).await
    }

    /// Snapshot of the pending event table.
    ///
    /// # Errors
    /// Fails when the engine is shutting down.
    pub async fn pending_events(&self) -> Result<Vec<MonitoredEvent>> {
        self.send(Command::PendingEvents).await
    }

    /// Snapshot of the confirmed event table.
    ///
    /// # Errors
    /// Fails when the engine is shutting down.
    pub async fn confirmed_events(&self) -> Result<Vec<MonitoredEvent>> {
        self.send(Command::ConfirmedEvents).await
    }

    /// Snapshot of the reorganization history.
    ///
    /// # Errors
    /// Fails when the engine is shutting down.
    pub async fn chain_reorganizations(&self) -> Result<Vec<ReorgRecord>> {
        self.send(Command::ChainReorganizations).await
    }

    /// Snapshot of the user-action history.
    ///
    /// # Errors
    /// Fails when the engine is shutting down.
    pub async fn user_actions(&self) -> Result<Vec<UserAction>> {
        self.send(Command::UserActions).await
    }

    /// Confirmed events belonging to one user's actions.
    ///
    /// # Errors
    /// Fails when the engine is shutting down.
    pub async fn user_events(&self, user: Address) -> Result<Vec<MonitoredEvent>> {
        self.send(|reply| Command::UserEvents(user, reply)).await
    }

    /// Priority-ordered endpoint snapshot.
    #[must_use]
    pub fn endpoints(&self) -> Vec<provider_pool::Endpoint> {
        self.registry.snapshot()
    }

    /// Send a command and await its reply.
    async fn send<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(make(reply_tx))
            .await
            .map_err(|_| EngineError::Cancelled)?;
        reply_rx.await.map_err(|_| EngineError::Cancelled)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MONITOR LOOP
// ═══════════════════════════════════════════════════════════════════════════════

/// The single-writer loop owning the tracker and both monitors.
struct MonitorLoop {
    tracker: BlockTracker,
    tx_monitor: TransactionMonitor,
    event_monitor: EventMonitor,
    source: Arc<dyn ChainSource>,
    cleanup_interval: Duration,
    shutdown: CancellationToken,
}

impl MonitorLoop {
    async fn run(
        mut self,
        mut header_rx: mpsc::Receiver<eth_rpc::BlockHeader>,
        mut backfill_rx: mpsc::Receiver<eth_rpc::Block>,
        mut command_rx: mpsc::Receiver<Command>,
    ) {
        let mut cleanup = tokio::time::interval(self.cleanup_interval);
        cleanup.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,

                Some(header) = header_rx.recv() => {
                    for notice in self.tracker.process_header(header) {
                        // Event monitor first: on a reorg this publishes the
                        // ChainReorganization record before the per-tx fallout.
                        self.event_monitor.on_head(notice, self.source.as_ref()).await;
                        self.tx_monitor.on_head(notice, self.source.as_ref()).await;
                    }
                }

                Some(block) = backfill_rx.recv() => {
                    self.tx_monitor
                        .on_backfill_block(&block, self.source.as_ref())
                        .await;
                    self.event_monitor
                        .on_backfill_block(&block, self.source.as_ref())
                        .await;
                }

                Some(command) = command_rx.recv() => {
                    self.handle_command(command).await;
                }

                _ = cleanup.tick() => {
                    self.tx_monitor.cleanup();
                    self.event_monitor.cleanup();
                }
            }
        }
        info!("Monitor loop stopped");
    }

    #[allow(clippy::too_many_lines)] // One arm per API command.
    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::StartTxMonitoring(reply) => {
                let _ = reply.send(self.tx_monitor.start());
            }
            Command::StopTxMonitoring(reply) => {
                self.tx_monitor.stop();
                let _ = reply.send(());
            }
            Command::AddAddress(address, reply) => {
                self.tx_monitor.add_address(address);
                let _ = reply.send(());
            }
            Command::RemoveAddress(address, reply) => {
                self.tx_monitor.remove_address(address);
                let _ = reply.send(());
            }
            Command::AddTxFilter(filter, reply) => {
                self.tx_monitor.add_filter(filter);
                let _ = reply.send(());
            }
            Command::StartEventMonitoring(reply) => {
                self.event_monitor.start();
                let _ = reply.send(());
            }
            Command::StopEventMonitoring(reply) => {
                self.event_monitor.stop();
                let _ = reply.send(());
            }
            Command::AddEventFilter(filter, reply) => {
                let _ = reply.send(self.event_monitor.add_filter(filter));
            }
            Command::RemoveEventFilter(filter_id, reply) => {
                let _ = reply.send(self.event_monitor.remove_filter(&filter_id));
            }
            Command::SetConfirmationThreshold(threshold, reply) => {
                let result = match self
                    .tx_monitor
                    .set_confirmation_threshold(threshold, self.source.as_ref())
                    .await
                {
                    Ok(()) => {
                        self.event_monitor
                            .set_confirmation_threshold(threshold, self.source.as_ref())
                            .await
                    }
                    Err(error) => Err(error),
                };
                let _ = reply.send(result);
            }
            Command::TrackTransaction(hash, reply) => {
                let result = self
                    .tx_monitor
                    .track_transaction(hash, self.source.as_ref())
                    .await;
                let _ = reply.send(result);
            }
            Command::PendingTransactions(reply) => {
                let _ = reply.send(self.tx_monitor.pending_snapshot());
            }
            Command::ConfirmedTransactions(reply) => {
                let _ = reply.send(self.tx_monitor.confirmed_snapshot());
            }
            Command::PendingEvents(reply) => {
                let _ = reply.send(self.event_monitor.pending_snapshot());
            }
            Command::ConfirmedEvents(reply) => {
                let _ = reply.send(self.event_monitor.confirmed_snapshot());
            }
            Command::ChainReorganizations(reply) => {
                let _ = reply.send(self.event_monitor.reorg_snapshot());
            }
            Command::UserActions(reply) => {
                let _ = reply.send(self.event_monitor.actions_snapshot());
            }
            Command::UserEvents(user, reply) => {
                let _ = reply.send(self.event_monitor.user_events(user));
            }
            Command::TableStats(reply) => {
                let (pending_transactions, confirmed_transactions) =
                    self.tx_monitor.table_sizes();
                let _ = reply.send(TableStats {
                    pending_transactions,
                    confirmed_transactions,
                    filters: self.event_monitor.filter_count(),
                    events_per_second: self.event_monitor.events_per_second(),
                    avg_confirmation_secs: self.tx_monitor.avg_confirmation_secs(),
                });
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackfillSettings, LoggingSettings, MonitoringSettings};
    use provider_pool::EndpointConfig;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(rpc_url: String) -> Settings {
        Settings {
            endpoints: vec![EndpointConfig {
                name: "primary".into(),
                rpc_url,
                stream_url: "ws://localhost:1".into(),
                credential: None,
                priority: 0,
                rate_limit_rps: 25,
                timeout_ms: 1_000,
            }],
            monitoring: MonitoringSettings {
                confirmation_threshold: 12,
                reorg_depth: 20,
                block_window: 100,
                health_probe_interval_ms: 60_000,
                max_pending_age_ms: 3_600_000,
                max_pending_transactions: 100_000,
                retention_ms: 86_400_000,
                cleanup_interval_ms: 300_000,
            },
            backfill: BackfillSettings {
                batch_size: 100,
                batch_delay_ms: 10,
            },
            logging: LoggingSettings {
                level: "info".into(),
                format: "json".into(),
            },
        }
    }

    async fn healthy_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "result": "0x12d687"
            })))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn unresponsive_endpoints_are_fatal_at_startup() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = ObservationEngine::start(settings(server.uri())).await;
        assert!(matches!(result, Err(EngineError::Initialization(_))));
    }

    #[tokio::test]
    async fn empty_endpoint_list_is_a_config_error() {
        let mut bad = settings("http://localhost:1".into());
        bad.endpoints.clear();
        let result = ObservationEngine::start(bad).await;
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[tokio::test]
    async fn engine_starts_and_answers_queries() {
        let server = healthy_server().await;
        let engine = ObservationEngine::start(settings(server.uri()))
            .await
            .expect("engine");

        // Command round-trips through the monitor loop.
        engine
            .add_address_to_monitor(alloy::primitives::Address::ZERO)
            .await
            .expect("command");
        engine
            .start_transaction_monitoring()
            .await
            .expect("command");
        engine.start_event_monitoring().await.expect("command");

        let stats = engine.monitoring_stats().await.expect("stats");
        assert_eq!(stats.pending_transactions, 0);
        // Default catalog filters are installed at startup.
        assert!(stats.filters > 0);

        assert!(engine.pending_transactions().await.expect("query").is_empty());
        assert!(engine.user_actions().await.expect("query").is_empty());

        engine.disconnect().await;
    }

    #[tokio::test]
    async fn commands_fail_after_disconnect() {
        let server = healthy_server().await;
        let engine = ObservationEngine::start(settings(server.uri()))
            .await
            .expect("engine");
        engine.disconnect().await;

        let result = engine.start_event_monitoring().await;
        assert!(matches!(result, Err(EngineError::Cancelled)));
    }

    #[tokio::test]
    async fn threshold_validation_round_trips() {
        let server = healthy_server().await;
        let engine = ObservationEngine::start(settings(server.uri()))
            .await
            .expect("engine");

        assert!(engine.set_confirmation_threshold(6).await.is_ok());
        assert!(engine.set_confirmation_threshold(0).await.is_err());
        assert!(engine.set_confirmation_threshold(101).await.is_err());

        engine.disconnect().await;
    }

    #[tokio::test]
    async fn force_provider_rejects_unknown_name() {
        let server = healthy_server().await;
        let engine = ObservationEngine::start(settings(server.uri()))
            .await
            .expect("engine");

        assert!(engine.force_provider("nonexistent").is_err());
        assert!(engine.force_provider("primary").is_ok());

        engine.disconnect().await;
    }
}
