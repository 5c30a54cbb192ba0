//! Endpoint configuration and health state.
//!
//! An endpoint is one RPC provider instance with a request URL and a
//! streaming URL. The registry keeps a health record per endpoint; the
//! health probe and the connection manager feed it.

use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::error::{PoolError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Consecutive failures after which an endpoint is marked unhealthy.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Grace window within which a single transient probe failure against the
/// currently streaming endpoint does not touch its counters.
pub const STREAM_FLAP_WINDOW: Duration = Duration::from_secs(30);

/// Default per-request timeout when the configuration omits one.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default requests-per-second cap when the configuration omits one.
pub const DEFAULT_RATE_LIMIT_RPS: u32 = 25;

// ═══════════════════════════════════════════════════════════════════════════════
// ENDPOINT CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

/// Static configuration for one RPC endpoint.
///
/// Priority is ascending: the lowest value is dialed first. Two endpoints
/// may share a priority; registration order breaks the tie.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EndpointConfig {
    /// Stable name, used as the key for health state and rate limiting.
    pub name: String,
    /// HTTP JSON-RPC URL.
    pub rpc_url: String,
    /// WebSocket URL for the `newHeads` subscription.
    pub stream_url: String,
    /// Optional bearer credential for authenticated gateways.
    #[serde(default)]
    pub credential: Option<String>,
    /// Selection priority; lower is preferred.
    pub priority: u32,
    /// Requests-per-second cap enforced by the token bucket.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_rps: u32,
    /// Per-request timeout in milliseconds; the hard deadline for every call.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

const fn default_rate_limit() -> u32 {
    DEFAULT_RATE_LIMIT_RPS
}

const fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl EndpointConfig {
    /// The request timeout as a `Duration`.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Validate this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidEndpoint`] when the name or either URL is
    /// empty, or the rate limit is zero.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PoolError::InvalidEndpoint("name cannot be empty".into()));
        }
        if self.rpc_url.trim().is_empty() {
            return Err(PoolError::InvalidEndpoint(format!(
                "{}: rpc_url cannot be empty",
                self.name
            )));
        }
        if self.stream_url.trim().is_empty() {
            return Err(PoolError::InvalidEndpoint(format!(
                "{}: stream_url cannot be empty",
                self.name
            )));
        }
        if self.rate_limit_rps == 0 {
            return Err(PoolError::InvalidEndpoint(format!(
                "{}: rate_limit_rps must be non-zero",
                self.name
            )));
        }
        if self.timeout_ms == 0 {
            return Err(PoolError::InvalidEndpoint(format!(
                "{}: timeout_ms must be non-zero",
                self.name
            )));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HEALTH STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Mutable health record for one endpoint.
///
/// Owned exclusively by the registry; other components see it only through
/// [`Endpoint`] snapshots.
#[derive(Debug, Clone)]
pub struct EndpointHealth {
    /// Whether the endpoint is currently considered usable.
    pub healthy: bool,
    /// Consecutive failure count; reset by any success.
    pub consecutive_failures: u32,
    /// When the endpoint was last probed (success or failure).
    pub last_probe: Option<Instant>,
    /// Most recent probe latency.
    pub latency_ms: Option<u64>,
    /// Head block reported by the most recent successful probe.
    pub head_block: Option<u64>,
    /// Most recent probe failure, for the streaming flap guard.
    pub(crate) last_failure: Option<Instant>,
}

impl Default for EndpointHealth {
    fn default() -> Self {
        Self {
            healthy: true,
            consecutive_failures: 0,
            last_probe: None,
            latency_ms: None,
            head_block: None,
            last_failure: None,
        }
    }
}

/// By-value snapshot of one endpoint's configuration and health.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Static configuration.
    pub config: EndpointConfig,
    /// Health state at snapshot time.
    pub health: EndpointHealth,
}

impl Endpoint {
    /// Convenience accessor for the endpoint name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str) -> EndpointConfig {
        EndpointConfig {
            name: name.into(),
            rpc_url: "http://localhost:8545".into(),
            stream_url: "ws://localhost:8546".into(),
            credential: None,
            priority: 0,
            rate_limit_rps: DEFAULT_RATE_LIMIT_RPS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(config("primary").validate().is_ok());
    }

    #[test]
    fn empty_fields_are_rejected() {
        let mut c = config("primary");
        c.rpc_url = String::new();
        assert!(c.validate().is_err());

        let mut c = config("primary");
        c.stream_url = "  ".into();
        assert!(c.validate().is_err());

        let mut c = config("primary");
        c.name = String::new();
        assert!(c.validate().is_err());
    }

    #[test]
    fn zero_rate_limit_is_rejected() {
        let mut c = config("primary");
        c.rate_limit_rps = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let json = serde_json::json!({
            "name": "primary",
            "rpc_url": "http://localhost:8545",
            "stream_url": "ws://localhost:8546",
            "priority": 0
        });
        let c: EndpointConfig = serde_json::from_value(json).expect("parse failed");
        assert_eq!(c.rate_limit_rps, DEFAULT_RATE_LIMIT_RPS);
        assert_eq!(c.timeout(), Duration::from_millis(DEFAULT_TIMEOUT_MS));
    }

    #[test]
    fn health_starts_healthy_with_no_history() {
        let health = EndpointHealth::default();
        assert!(health.healthy);
        assert_eq!(health.consecutive_failures, 0);
        assert!(health.last_probe.is_none());
    }
}
