//! Redundant RPC endpoint pool with health tracking and streaming failover.
//!
//! This crate is the connection layer of the observation engine: it owns the
//! ordered endpoint table, keeps health state current with a periodic probe,
//! enforces per-endpoint rate limits, and supervises the dual HTTP/WebSocket
//! connection with exponential-backoff failover.
//!
//! # Overview
//!
//! - [`ProviderRegistry`] - the single owner of the endpoint table
//! - [`HealthProbe`] - periodic `eth_blockNumber` timing against every endpoint
//! - [`RateLimiter`] - token buckets keyed by endpoint name
//! - [`ConnectionManager`] - dial, stream `newHeads`, fail over
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   marks    ┌───────────────────┐
//! │ HealthProbe  │───────────▶│ ProviderRegistry  │
//! └──────────────┘            └─────────┬─────────┘
//!                                       │ priority scan
//!                             ┌─────────▼─────────┐   headers   ┌──────────┐
//!                             │ ConnectionManager │────────────▶│  engine  │
//!                             └─────────┬─────────┘             └──────────┘
//!                                       │ one token per call
//!                             ┌─────────▼─────────┐
//!                             │    RateLimiter    │
//!                             └───────────────────┘
//! ```

#![doc(html_root_url = "https://docs.chainwatch.io/provider-pool")]

// ═══════════════════════════════════════════════════════════════════════════════
// MODULES
// ═══════════════════════════════════════════════════════════════════════════════

pub mod connection;
pub mod endpoint;
pub mod error;
pub mod health;
pub mod limiter;
pub mod registry;

// ═══════════════════════════════════════════════════════════════════════════════
// RE-EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

// Primary types - what most users need
pub use connection::{ConnectionManager, ConnectionState, ConnectionStatus};
pub use endpoint::{Endpoint, EndpointConfig, EndpointHealth};
pub use error::{PoolError, Result};
pub use health::HealthProbe;
pub use limiter::RateLimiter;
pub use registry::ProviderRegistry;

// ═══════════════════════════════════════════════════════════════════════════════
// CRATE INFO
// ═══════════════════════════════════════════════════════════════════════════════

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the crate version string.
#[must_use]
pub const fn version() -> &'static str {
    VERSION
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!version().is_empty());
    }

    #[test]
    fn registry_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ProviderRegistry>();
        assert_send_sync::<ConnectionManager>();
        assert_send_sync::<RateLimiter>();
    }
}
