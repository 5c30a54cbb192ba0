//! Periodic endpoint health probing.
//!
//! The probe times an `eth_blockNumber` call against every registered
//! endpoint on a fixed interval, using each endpoint's own timeout as the
//! hard deadline. Results feed the registry: a success records latency and
//! head block and clears the failure counter; a failure increments it
//! (subject to the streaming flap guard, see the registry).

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use eth_rpc::{ClientConfig, EthRpcClient};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::registry::ProviderRegistry;

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default interval between probe rounds.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(60);

// ═══════════════════════════════════════════════════════════════════════════════
// HEALTH PROBE
// ═══════════════════════════════════════════════════════════════════════════════

/// Worker that keeps the registry's health state current.
///
/// One logical task; start it with [`HealthProbe::run`] and stop it by
/// cancelling the token.
#[derive(Debug)]
pub struct HealthProbe {
    registry: Arc<ProviderRegistry>,
    /// Cached probe clients, one per endpoint.
    clients: DashMap<String, Arc<EthRpcClient>>,
    interval: Duration,
}

impl HealthProbe {
    /// Create a probe over `registry` with the default interval.
    #[must_use]
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self::with_interval(registry, DEFAULT_PROBE_INTERVAL)
    }

    /// Create a probe with a custom interval.
    #[must_use]
    pub fn with_interval(registry: Arc<ProviderRegistry>, interval: Duration) -> Self {
        Self {
            registry,
            clients: DashMap::new(),
            interval,
        }
    }

    /// Run the probe loop until `shutdown` is cancelled.
    ///
    /// The first round fires immediately so startup does not wait a full
    /// interval for health data.
    #[instrument(skip(self, shutdown), fields(interval = ?self.interval))]
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("Starting health probe");
        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("Health probe stopping");
                    return;
                }
                _ = timer.tick() => {
                    self.probe_all().await;
                }
            }
        }
    }

    /// Probe every registered endpoint once.
    pub async fn probe_all(&self) {
        for endpoint in self.registry.snapshot() {
            let name = endpoint.config.name.clone();
            match self.probe_one(&endpoint.config).await {
                Ok((latency_ms, head_block)) => {
                    self.registry.mark_success(&name, latency_ms, head_block);
                }
                Err(error) => {
                    warn!(name = %name, %error, "Endpoint probe failed");
                    self.registry.mark_probe_failure(&name);
                }
            }
        }
    }

    /// Time one `eth_blockNumber` call against an endpoint.
    async fn probe_one(
        &self,
        config: &crate::endpoint::EndpointConfig,
    ) -> eth_rpc::Result<(u64, u64)> {
        let client = self.client_for(config)?;
        let started = Instant::now();

        // The client carries the endpoint timeout already; the outer timeout
        // guards against transport stalls that bypass it.
        let head = tokio::time::timeout(config.timeout(), client.block_number())
            .await
            .map_err(|_| eth_rpc::RpcError::Timeout)??;

        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        debug!(name = %config.name, latency_ms, head, "Probe ok");
        Ok((latency_ms, head))
    }

    /// Fetch or build the probe client for an endpoint.
    fn client_for(
        &self,
        config: &crate::endpoint::EndpointConfig,
    ) -> eth_rpc::Result<Arc<EthRpcClient>> {
        if let Some(client) = self.clients.get(&config.name) {
            return Ok(Arc::clone(&client));
        }

        let mut client_config = ClientConfig::default().with_timeout(config.timeout());
        if let Some(credential) = &config.credential {
            client_config = client_config.with_credential(credential.clone());
        }
        let client = Arc::new(EthRpcClient::with_config(&config.rpc_url, client_config)?);
        self.clients
            .insert(config.name.clone(), Arc::clone(&client));
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
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(name: &str, rpc_url: String) -> EndpointConfig {
        EndpointConfig {
            name: name.into(),
            rpc_url,
            stream_url: "ws://localhost:8546".into(),
            credential: None,
            priority: 0,
            rate_limit_rps: 25,
            timeout_ms: 1_000,
        }
    }

    #[tokio::test]
    async fn successful_probe_records_latency_and_head() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "result": "0x12d687"
            })))
            .mount(&server)
            .await;

        let registry = Arc::new(ProviderRegistry::new());
        registry.register(config("primary", server.uri())).unwrap();

        let probe = HealthProbe::new(Arc::clone(&registry));
        probe.probe_all().await;

        let endpoint = registry.get("primary").unwrap();
        assert!(endpoint.health.healthy);
        assert_eq!(endpoint.health.head_block, Some(0x0012_d687));
        assert!(endpoint.health.latency_ms.is_some());
    }

    #[tokio::test]
    async fn failed_probe_increments_counter() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let registry = Arc::new(ProviderRegistry::new());
        registry.register(config("primary", server.uri())).unwrap();

        let probe = HealthProbe::new(Arc::clone(&registry));
        probe.probe_all().await;

        assert_eq!(
            registry.get("primary").unwrap().health.consecutive_failures,
            1
        );
    }

    #[tokio::test]
    async fn three_failed_rounds_mark_unhealthy() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let registry = Arc::new(ProviderRegistry::new());
        registry.register(config("primary", server.uri())).unwrap();

        let probe = HealthProbe::new(Arc::clone(&registry));
        for _ in 0..3 {
            probe.probe_all().await;
        }

        assert!(!registry.get("primary").unwrap().health.healthy);
    }
}
