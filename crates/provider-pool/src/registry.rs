//! Provider registry: the single owner of the endpoint table.
//!
//! The registry holds every configured endpoint sorted by ascending
//! priority, tracks health state, and applies the consecutive-failure
//! threshold. All other components read it through by-value snapshots;
//! only the health probe and the connection manager write to it.
//!
//! # Flap guard
//!
//! The endpoint currently carrying the `newHeads` stream is under the most
//! load, so an isolated probe timeout against it is not meaningful. A single
//! probe failure within [`STREAM_FLAP_WINDOW`] of the previous one is
//! recorded but does not move the failure counter.

use std::time::Instant;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::endpoint::{
    DEFAULT_FAILURE_THRESHOLD, Endpoint, EndpointConfig, EndpointHealth, STREAM_FLAP_WINDOW,
};
use crate::error::{PoolError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

/// Registry entry pairing configuration with mutable health.
#[derive(Debug)]
struct Entry {
    config: EndpointConfig,
    health: EndpointHealth,
}

/// The endpoint table, sorted by ascending priority at all times.
#[derive(Debug)]
pub struct ProviderRegistry {
    entries: RwLock<Vec<Entry>>,
    /// Name of the endpoint currently carrying the stream, if any.
    active: RwLock<Option<String>>,
    failure_threshold: u32,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    /// Create an empty registry with the default failure threshold.
    #[must_use]
    pub fn new() -> Self {
        Self::with_failure_threshold(DEFAULT_FAILURE_THRESHOLD)
    }

    /// Create an empty registry with a custom failure threshold.
    #[must_use]
    pub fn with_failure_threshold(failure_threshold: u32) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            active: RwLock::new(None),
            failure_threshold: failure_threshold.max(1),
        }
    }

    /// Register an endpoint.
    ///
    /// The table stays sorted by priority; insertion among equal priorities
    /// preserves registration order.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidEndpoint`] when validation fails and
    /// [`PoolError::DuplicateEndpoint`] when the name is already taken.
    pub fn register(&self, config: EndpointConfig) -> Result<()> {
        config.validate()?;

        let mut entries = self.entries.write();
        if entries.iter().any(|e| e.config.name == config.name) {
            return Err(PoolError::DuplicateEndpoint(config.name));
        }

        info!(name = %config.name, priority = config.priority, "Registered endpoint");

        let position = entries
            .iter()
            .position(|e| e.config.priority > config.priority)
            .unwrap_or(entries.len());
        entries.insert(
            position,
            Entry {
                config,
                health: EndpointHealth::default(),
            },
        );
        Ok(())
    }

    /// Number of registered endpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Stable priority-ordered snapshot of every endpoint.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Endpoint> {
        self.entries
            .read()
            .iter()
            .map(|e| Endpoint {
                config: e.config.clone(),
                health: e.health.clone(),
            })
            .collect()
    }

    /// Priority-ordered snapshot of the currently healthy endpoints.
    #[must_use]
    pub fn healthy(&self) -> Vec<Endpoint> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.health.healthy)
            .map(|e| Endpoint {
                config: e.config.clone(),
                health: e.health.clone(),
            })
            .collect()
    }

    /// Look up one endpoint by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Endpoint> {
        self.entries
            .read()
            .iter()
            .find(|e| e.config.name == name)
            .map(|e| Endpoint {
                config: e.config.clone(),
                health: e.health.clone(),
            })
    }

    /// Record a successful call or probe against an endpoint.
    ///
    /// Clears the failure counter and restores health.
    pub fn mark_success(&self, name: &str, latency_ms: u64, head_block: u64) {
        let mut entries = self.entries.write();
        let Some(entry) = entries.iter_mut().find(|e| e.config.name == name) else {
            return;
        };
        let was_unhealthy = !entry.health.healthy;
        entry.health.healthy = true;
        entry.health.consecutive_failures = 0;
        entry.health.last_probe = Some(Instant::now());
        entry.health.latency_ms = Some(latency_ms);
        entry.health.head_block = Some(head_block);
        entry.health.last_failure = None;

        if was_unhealthy {
            info!(name, latency_ms, head_block, "Endpoint recovered");
        } else {
            debug!(name, latency_ms, head_block, "Endpoint probe ok");
        }
    }

    /// Record a failed call against an endpoint.
    ///
    /// Reaching the failure threshold flips the endpoint unhealthy until
    /// the next success.
    pub fn mark_failure(&self, name: &str) {
        self.record_failure(name, false);
    }

    /// Record a failed *probe* against an endpoint.
    ///
    /// Identical to [`Self::mark_failure`] except that the currently
    /// streaming endpoint is granted the flap-guard window: an isolated
    /// failure does not move its counter.
    pub fn mark_probe_failure(&self, name: &str) {
        let streaming = self.active.read().as_deref() == Some(name);
        self.record_failure(name, streaming);
    }

    fn record_failure(&self, name: &str, flap_guarded: bool) {
        let mut entries = self.entries.write();
        let Some(entry) = entries.iter_mut().find(|e| e.config.name == name) else {
            return;
        };

        let now = Instant::now();
        entry.health.last_probe = Some(now);

        if flap_guarded {
            let isolated = entry
                .health
                .last_failure
                .is_none_or(|prev| now.duration_since(prev) > STREAM_FLAP_WINDOW);
            entry.health.last_failure = Some(now);
            if isolated {
                debug!(name, "Ignoring isolated probe failure on streaming endpoint");
                return;
            }
        } else {
            entry.health.last_failure = Some(now);
        }

        entry.health.consecutive_failures += 1;
        if entry.health.consecutive_failures >= self.failure_threshold && entry.health.healthy {
            entry.health.healthy = false;
            warn!(
                name,
                failures = entry.health.consecutive_failures,
                "Endpoint marked unhealthy"
            );
        }
    }

    /// Set (or clear) the endpoint currently carrying the stream.
    pub fn set_active(&self, name: Option<String>) {
        *self.active.write() = name;
    }

    /// Name of the endpoint currently carrying the stream.
    #[must_use]
    pub fn active(&self) -> Option<String> {
        self.active.read().clone()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{DEFAULT_RATE_LIMIT_RPS, DEFAULT_TIMEOUT_MS};

    fn config(name: &str, priority: u32) -> EndpointConfig {
        EndpointConfig {
            name: name.into(),
            rpc_url: "http://localhost:8545".into(),
            stream_url: "ws://localhost:8546".into(),
            credential: None,
            priority,
            rate_limit_rps: DEFAULT_RATE_LIMIT_RPS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    #[test]
    fn snapshot_is_priority_ordered() {
        let registry = ProviderRegistry::new();
        registry.register(config("tertiary", 2)).unwrap();
        registry.register(config("primary", 0)).unwrap();
        registry.register(config("secondary", 1)).unwrap();

        let names: Vec<_> = registry
            .snapshot()
            .into_iter()
            .map(|e| e.config.name)
            .collect();
        assert_eq!(names, ["primary", "secondary", "tertiary"]);
    }

    #[test]
    fn equal_priorities_preserve_registration_order() {
        let registry = ProviderRegistry::new();
        registry.register(config("first", 1)).unwrap();
        registry.register(config("second", 1)).unwrap();

        let names: Vec<_> = registry
            .snapshot()
            .into_iter()
            .map(|e| e.config.name)
            .collect();
        assert_eq!(names, ["first", "second"]);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let registry = ProviderRegistry::new();
        registry.register(config("primary", 0)).unwrap();
        assert!(matches!(
            registry.register(config("primary", 1)),
            Err(PoolError::DuplicateEndpoint(_))
        ));
    }

    #[test]
    fn failure_threshold_flips_health() {
        let registry = ProviderRegistry::new();
        registry.register(config("primary", 0)).unwrap();

        registry.mark_failure("primary");
        registry.mark_failure("primary");
        assert!(registry.get("primary").unwrap().health.healthy);

        registry.mark_failure("primary");
        let ep = registry.get("primary").unwrap();
        assert!(!ep.health.healthy);
        assert_eq!(ep.health.consecutive_failures, 3);
    }

    #[test]
    fn success_resets_counter_and_restores_health() {
        let registry = ProviderRegistry::new();
        registry.register(config("primary", 0)).unwrap();

        for _ in 0..3 {
            registry.mark_failure("primary");
        }
        assert!(!registry.get("primary").unwrap().health.healthy);

        registry.mark_success("primary", 42, 19_000_000);
        let ep = registry.get("primary").unwrap();
        assert!(ep.health.healthy);
        assert_eq!(ep.health.consecutive_failures, 0);
        assert_eq!(ep.health.head_block, Some(19_000_000));
        assert_eq!(ep.health.latency_ms, Some(42));
    }

    #[test]
    fn healthy_excludes_failed_endpoints() {
        let registry = ProviderRegistry::new();
        registry.register(config("primary", 0)).unwrap();
        registry.register(config("secondary", 1)).unwrap();

        for _ in 0..3 {
            registry.mark_failure("primary");
        }

        let healthy: Vec<_> = registry
            .healthy()
            .into_iter()
            .map(|e| e.config.name)
            .collect();
        assert_eq!(healthy, ["secondary"]);
    }

    #[test]
    fn isolated_probe_failure_on_streaming_endpoint_is_ignored() {
        let registry = ProviderRegistry::new();
        registry.register(config("primary", 0)).unwrap();
        registry.set_active(Some("primary".into()));

        // First probe failure inside the flap window: counter untouched.
        registry.mark_probe_failure("primary");
        assert_eq!(
            registry.get("primary").unwrap().health.consecutive_failures,
            0
        );

        // A second failure shortly after is no longer isolated.
        registry.mark_probe_failure("primary");
        assert_eq!(
            registry.get("primary").unwrap().health.consecutive_failures,
            1
        );
    }

    #[test]
    fn probe_failure_on_idle_endpoint_counts_immediately() {
        let registry = ProviderRegistry::new();
        registry.register(config("secondary", 1)).unwrap();
        registry.set_active(Some("primary".into()));

        registry.mark_probe_failure("secondary");
        assert_eq!(
            registry
                .get("secondary")
                .unwrap()
                .health
                .consecutive_failures,
            1
        );
    }
}
