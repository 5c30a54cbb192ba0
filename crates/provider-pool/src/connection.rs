//! Connection manager: dial, stream, failover.
//!
//! The manager owns the engine's two channels to the chain: the HTTP
//! request path (dispatched to the current endpoint's [`EthRpcClient`]) and
//! the `newHeads` WebSocket subscription, whose headers it forwards to the
//! block tracker.
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected → Connecting → Ready → Degraded → Reconnecting → Connecting …
//!                                                     │
//!                                                 ShutDown (terminal)
//! ```
//!
//! Connecting scans the registry in priority order and takes the first
//! healthy endpoint that answers both an HTTP probe and a WS subscription;
//! a scan that exhausts every candidate yields `NoHealthyProvider`. A
//! stream failure marks the endpoint, then the supervisor reconnects with
//! delay `min(base * 2^attempts, cap)`; the attempt counter resets on
//! success.

use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy::providers::{DynProvider, Provider, ProviderBuilder, WsConnect};
use dashmap::DashMap;
use eth_rpc::{BlockHeader, ClientConfig, EthRpcClient};
use futures::StreamExt;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::endpoint::Endpoint;
use crate::error::{PoolError, Result};
use crate::limiter::RateLimiter;
use crate::registry::ProviderRegistry;

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Base reconnect delay.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Reconnect delay ceiling.
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Capacity of the header channel toward the block tracker.
const HEADER_CHANNEL_CAPACITY: usize = 256;

// ═══════════════════════════════════════════════════════════════════════════════
// CONNECTION STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifecycle states of the connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No connection has been attempted yet.
    Disconnected,
    /// Scanning the registry and dialing.
    Connecting,
    /// Stream and request channels are open.
    Ready,
    /// The stream was lost; requests may still work.
    Degraded,
    /// Waiting out the backoff delay before redialing.
    Reconnecting,
    /// Terminal: `disconnect` was called.
    ShutDown,
}

/// By-value snapshot of the connection state.
#[derive(Debug, Clone)]
pub struct ConnectionState {
    /// Current lifecycle state.
    pub status: ConnectionStatus,
    /// Endpoint currently carrying stream and requests, if any.
    pub current_endpoint: Option<String>,
    /// Whether both channels are open.
    pub connected: bool,
    /// Highest header number seen on the stream.
    pub last_head_block: u64,
    /// Consecutive failed dial attempts since the last success.
    pub reconnect_attempts: u32,
}

#[derive(Debug)]
struct StateInner {
    status: ConnectionStatus,
    current: Option<String>,
    last_head: u64,
    attempts: u32,
}

/// Why a stream pump ended.
enum PumpOutcome {
    /// Shutdown requested or the header receiver went away.
    Shutdown,
    /// `force_provider` requested a redial.
    Aborted,
    /// The stream failed or closed unexpectedly.
    Failed,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONNECTION MANAGER
// ═══════════════════════════════════════════════════════════════════════════════

/// Supervisor for the request and streaming channels.
///
/// Construct with [`ConnectionManager::new`], receive headers from the
/// returned channel, and drive the lifecycle with
/// [`ConnectionManager::run`] on its own task.
#[derive(Debug)]
pub struct ConnectionManager {
    registry: Arc<ProviderRegistry>,
    limiter: Arc<RateLimiter>,
    /// Cached request clients, one per endpoint.
    clients: DashMap<String, Arc<EthRpcClient>>,
    state: RwLock<StateInner>,
    header_tx: mpsc::Sender<BlockHeader>,
    /// Manual pin installed by `force_provider`.
    pinned: RwLock<Option<String>>,
    /// Cancels only the active stream pump, forcing a redial.
    stream_abort: RwLock<CancellationToken>,
    shutdown: CancellationToken,
    backoff_base: Duration,
    backoff_cap: Duration,
}

impl ConnectionManager {
    /// Create a manager and the header channel it will feed.
    #[must_use]
    pub fn new(
        registry: Arc<ProviderRegistry>,
        limiter: Arc<RateLimiter>,
        shutdown: CancellationToken,
    ) -> (Arc<Self>, mpsc::Receiver<BlockHeader>) {
        let (header_tx, header_rx) = mpsc::channel(HEADER_CHANNEL_CAPACITY);
        let manager = Arc::new(Self {
            registry,
            limiter,
            clients: DashMap::new(),
            state: RwLock::new(StateInner {
                status: ConnectionStatus::Disconnected,
                current: None,
                last_head: 0,
                attempts: 0,
            }),
            header_tx,
            pinned: RwLock::new(None),
            stream_abort: RwLock::new(shutdown.child_token()),
            shutdown,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_cap: DEFAULT_BACKOFF_CAP,
        });
        (manager, header_rx)
    }

    /// By-value snapshot of the connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        let inner = self.state.read();
        ConnectionState {
            status: inner.status,
            current_endpoint: inner.current.clone(),
            connected: inner.status == ConnectionStatus::Ready,
            last_head_block: inner.last_head,
            reconnect_attempts: inner.attempts,
        }
    }

    /// Pin the connection to one endpoint.
    ///
    /// The active stream is torn down and redialed against the pinned
    /// endpoint.
    ///
    /// # Errors
    ///
    /// [`PoolError::UnknownEndpoint`] if the name is not registered,
    /// [`PoolError::UnhealthyEndpoint`] if it is currently failed.
    pub fn force_provider(&self, name: &str) -> Result<()> {
        let endpoint = self
            .registry
            .get(name)
            .ok_or_else(|| PoolError::UnknownEndpoint(name.to_string()))?;
        if !endpoint.health.healthy {
            return Err(PoolError::UnhealthyEndpoint(name.to_string()));
        }

        info!(name, "Pinning provider");
        *self.pinned.write() = Some(name.to_string());

        let needs_redial = self.state.read().current.as_deref() != Some(name);
        if needs_redial {
            self.stream_abort.read().cancel();
        }
        Ok(())
    }

    /// Shut the manager down: close the stream, cancel any pending
    /// reconnect, and let in-flight calls drain.
    pub fn disconnect(&self) {
        info!("Disconnect requested");
        self.shutdown.cancel();
    }

    // ───────────────────────────────────────────────────────────────────────────
    // REQUEST DISPATCH
    // ───────────────────────────────────────────────────────────────────────────

    /// Run one RPC operation against the current endpoint.
    ///
    /// Claims a rate-limit token, applies the endpoint timeout as the hard
    /// deadline, and feeds the registry's failure accounting on transient
    /// errors.
    ///
    /// # Errors
    ///
    /// [`PoolError::NotConnected`] when no endpoint is active,
    /// [`PoolError::Cancelled`] on shutdown, [`PoolError::DeadlineExpired`]
    /// when the rate bucket starves the call, or the underlying
    /// [`eth_rpc::RpcError`].
    pub async fn request<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce(Arc<EthRpcClient>) -> Fut,
        Fut: Future<Output = eth_rpc::Result<T>>,
    {
        if self.shutdown.is_cancelled() {
            return Err(PoolError::Cancelled);
        }

        let (name, timeout) = {
            let inner = self.state.read();
            let name = inner.current.clone().ok_or(PoolError::NotConnected)?;
            drop(inner);
            let endpoint = self
                .registry
                .get(&name)
                .ok_or_else(|| PoolError::UnknownEndpoint(name.clone()))?;
            (name, endpoint.config.timeout())
        };
        let client = self.client_for(&name)?;

        let deadline = Instant::now() + timeout;
        self.limiter.acquire(&name, deadline).await?;

        let result = tokio::select! {
            () = self.shutdown.cancelled() => return Err(PoolError::Cancelled),
            result = tokio::time::timeout(timeout, op(client)) => result,
        };

        match result {
            Err(_) => {
                self.registry.mark_failure(&name);
                Err(PoolError::Rpc(eth_rpc::RpcError::Timeout))
            }
            Ok(Err(error)) => {
                if error.is_retryable() {
                    self.registry.mark_failure(&name);
                }
                Err(PoolError::Rpc(error))
            }
            Ok(Ok(value)) => Ok(value),
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // SUPERVISOR
    // ───────────────────────────────────────────────────────────────────────────

    /// Run the connect/stream/failover loop until shutdown.
    ///
    /// Every dial failure - including the first - is retried with
    /// exponential backoff: endpoints recover, and the health probe keeps
    /// the registry honest in the meantime. Callers that must treat
    /// no-endpoint-at-startup as fatal (the engine initializer does) probe
    /// the registry before spawning this loop.
    ///
    /// # Errors
    ///
    /// Reserved for unrecoverable supervisor failures; the loop currently
    /// exits `Ok` only on shutdown.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<()> {
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            self.set_status(ConnectionStatus::Connecting);
            let dialed = self.dial_any().await;

            match dialed {
                Ok((name, provider)) => {
                    self.on_connected(&name);

                    let abort = self.shutdown.child_token();
                    *self.stream_abort.write() = abort.clone();

                    let outcome = self.pump_stream(&name, provider, &abort).await;

                    self.registry.set_active(None);
                    {
                        let mut inner = self.state.write();
                        inner.current = None;
                        inner.status = ConnectionStatus::Degraded;
                    }

                    match outcome {
                        PumpOutcome::Shutdown => break,
                        PumpOutcome::Aborted => {
                            debug!(name, "Stream aborted for redial");
                            continue;
                        }
                        PumpOutcome::Failed => {
                            warn!(name, "Stream lost");
                            self.registry.mark_failure(&name);
                        }
                    }
                }
                Err(error) => {
                    warn!(%error, "Dial failed");
                }
            }

            // Backoff before the next dial attempt.
            let attempts = {
                let mut inner = self.state.write();
                inner.status = ConnectionStatus::Reconnecting;
                inner.attempts += 1;
                inner.attempts
            };
            let delay = self.backoff_delay(attempts);
            debug!(attempts, ?delay, "Reconnecting after backoff");

            tokio::select! {
                () = self.shutdown.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        self.set_status(ConnectionStatus::ShutDown);
        info!("Connection manager shut down");
        Ok(())
    }

    /// Delay before dial attempt `attempts`: `min(base * 2^attempts, cap)`.
    fn backoff_delay(&self, attempts: u32) -> Duration {
        let factor = 1u32.checked_shl(attempts.min(16)).unwrap_or(u32::MAX);
        self.backoff_base
            .saturating_mul(factor)
            .min(self.backoff_cap)
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.state.write().status = status;
    }

    fn on_connected(&self, name: &str) {
        let mut inner = self.state.write();
        inner.status = ConnectionStatus::Ready;
        inner.current = Some(name.to_string());
        inner.attempts = 0;
        drop(inner);
        self.registry.set_active(Some(name.to_string()));
        info!(name, "Connected");
    }

    /// Endpoints to try, best first: the pin when set, otherwise every
    /// healthy endpoint in priority order.
    fn candidates(&self) -> Vec<Endpoint> {
        if let Some(pinned) = self.pinned.read().clone() {
            return self
                .registry
                .get(&pinned)
                .filter(|e| e.health.healthy)
                .into_iter()
                .collect();
        }
        self.registry.healthy()
    }

    /// Dial the first candidate that answers both channels.
    async fn dial_any(&self) -> Result<(String, DynProvider)> {
        let candidates = self.candidates();
        if candidates.is_empty() {
            return Err(PoolError::NoHealthyProvider);
        }

        for endpoint in candidates {
            let name = endpoint.config.name.clone();
            match self.dial(&endpoint).await {
                Ok(provider) => return Ok((name, provider)),
                Err(error) => {
                    warn!(name = %name, %error, "Dial failed, trying next endpoint");
                    self.registry.mark_failure(&name);
                }
            }
        }
        Err(PoolError::NoHealthyProvider)
    }

    /// Verify the HTTP channel and open the WS provider for one endpoint.
    async fn dial(&self, endpoint: &Endpoint) -> Result<DynProvider> {
        let timeout = endpoint.config.timeout();
        let name = &endpoint.config.name;

        // HTTP channel first: cheap, and it seeds health data.
        let client = self.client_for(name)?;
        let started = Instant::now();
        let head = tokio::time::timeout(timeout, client.block_number())
            .await
            .map_err(|_| PoolError::Rpc(eth_rpc::RpcError::Timeout))??;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.registry.mark_success(name, latency_ms, head);

        // Streaming channel.
        let ws = WsConnect::new(&endpoint.config.stream_url);
        let provider = tokio::time::timeout(timeout, ProviderBuilder::new().connect_ws(ws))
            .await
            .map_err(|_| PoolError::Subscription("WebSocket connect timed out".into()))?
            .map_err(|e| PoolError::Subscription(e.to_string()))?;

        Ok(provider.erased())
    }

    /// Forward headers until the stream ends, shutdown fires, or an abort
    /// is requested.
    async fn pump_stream(
        &self,
        name: &str,
        provider: DynProvider,
        abort: &CancellationToken,
    ) -> PumpOutcome {
        let subscription = match provider.subscribe_blocks().await {
            Ok(sub) => sub,
            Err(error) => {
                warn!(name, %error, "newHeads subscription failed");
                return PumpOutcome::Failed;
            }
        };
        let mut stream = subscription.into_stream();
        info!(name, "Streaming newHeads");

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => return PumpOutcome::Shutdown,
                () = abort.cancelled() => return PumpOutcome::Aborted,
                maybe_header = stream.next() => {
                    let Some(header) = maybe_header else {
                        return PumpOutcome::Failed;
                    };
                    let head = BlockHeader {
                        number: header.number,
                        hash: header.hash,
                        parent_hash: header.parent_hash,
                        timestamp: header.timestamp,
                    };
                    self.state.write().last_head = head.number;
                    if self.header_tx.send(head).await.is_err() {
                        // Receiver gone: the engine is shutting down.
                        return PumpOutcome::Shutdown;
                    }
                }
            }
        }
    }

    /// Fetch or build the request client for an endpoint.
    fn client_for(&self, name: &str) -> Result<Arc<EthRpcClient>> {
        if let Some(client) = self.clients.get(name) {
            return Ok(Arc::clone(&client));
        }

        let endpoint = self
            .registry
            .get(name)
            .ok_or_else(|| PoolError::UnknownEndpoint(name.to_string()))?;

        let mut config = ClientConfig::default().with_timeout(endpoint.config.timeout());
        if let Some(credential) = &endpoint.config.credential {
            config = config.with_credential(credential.clone());
        }
        let client = Arc::new(EthRpcClient::with_config(&endpoint.config.rpc_url, config)?);
        self.clients.insert(name.to_string(), Arc::clone(&client));
        Ok(client)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::EndpointConfig;

    fn manager() -> (Arc<ConnectionManager>, mpsc::Receiver<BlockHeader>) {
        let registry = Arc::new(ProviderRegistry::new());
        registry
            .register(EndpointConfig {
                name: "primary".into(),
                rpc_url: "http://localhost:8545".into(),
                stream_url: "ws://localhost:8546".into(),
                credential: None,
                priority: 0,
                rate_limit_rps: 25,
                timeout_ms: 1_000,
            })
            .unwrap();
        ConnectionManager::new(registry, Arc::new(RateLimiter::new()), CancellationToken::new())
    }

    #[test]
    fn starts_disconnected() {
        let (manager, _rx) = manager();
        let state = manager.state();
        assert_eq!(state.status, ConnectionStatus::Disconnected);
        assert!(!state.connected);
        assert!(state.current_endpoint.is_none());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let (manager, _rx) = manager();
        assert_eq!(manager.backoff_delay(0), DEFAULT_BACKOFF_BASE);
        assert_eq!(manager.backoff_delay(1), DEFAULT_BACKOFF_BASE * 2);
        assert_eq!(manager.backoff_delay(3), DEFAULT_BACKOFF_BASE * 8);
        assert_eq!(manager.backoff_delay(30), DEFAULT_BACKOFF_CAP);
        assert_eq!(manager.backoff_delay(u32::MAX), DEFAULT_BACKOFF_CAP);
    }

    #[test]
    fn force_provider_rejects_unknown_and_unhealthy() {
        let (manager, _rx) = manager();
        assert!(matches!(
            manager.force_provider("nonexistent"),
            Err(PoolError::UnknownEndpoint(_))
        ));

        for _ in 0..3 {
            manager.registry.mark_failure("primary");
        }
        assert!(matches!(
            manager.force_provider("primary"),
            Err(PoolError::UnhealthyEndpoint(_))
        ));
    }

    #[test]
    fn force_provider_pins_healthy_endpoint() {
        let (manager, _rx) = manager();
        manager.force_provider("primary").expect("pin");
        assert_eq!(manager.pinned.read().as_deref(), Some("primary"));
    }

    #[tokio::test]
    async fn request_without_connection_fails() {
        let (manager, _rx) = manager();
        let result = manager
            .request(|client| async move { client.block_number().await })
            .await;
        assert!(matches!(result, Err(PoolError::NotConnected)));
    }

    #[tokio::test]
    async fn request_after_shutdown_is_cancelled() {
        let (manager, _rx) = manager();
        manager.disconnect();
        let result = manager
            .request(|client| async move { client.block_number().await })
            .await;
        assert!(matches!(result, Err(PoolError::Cancelled)));
    }
}
