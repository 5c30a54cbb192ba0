//! Chainwatch Observation Engine
//!
//! A confirmation-aware, reorg-safe observer for EVM chains. The engine
//! watches a pool of redundant RPC endpoints, tracks transactions and
//! contract events through their lifecycle (pending → confirmed →
//! reorganized / failed), classifies activity against a compiled-in DeFi
//! protocol catalog, and publishes a typed, ordered event stream for
//! downstream analytics.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                         OBSERVATION ENGINE                         │
//! │  ┌───────────┐   ┌─────────────┐   ┌─────────────┐                 │
//! │  │ Provider  │──▶│ Connection  │──▶│   Block     │                 │
//! │  │ Pool      │   │ (HTTP + WS) │   │   Tracker   │                 │
//! │  └───────────┘   └─────────────┘   └──────┬──────┘                 │
//! │                                           │ head notices          │
//! │                     ┌─────────────────────┼─────────────────────┐ │
//! │                     ▼                     ▼                     │ │
//! │              ┌─────────────┐       ┌─────────────┐   ┌────────┐ │ │
//! │              │ Transaction │       │   Event     │──▶│Catalog │ │ │
//! │              │ Monitor     │       │   Monitor   │   │Decoder │ │ │
//! │              └──────┬──────┘       └──────┬──────┘   └────────┘ │ │
//! │                     │     ┌────────────┐  │                     │ │
//! │                     └────▶│ Event Bus  │◀─┘  ◀── Backfill ──────┘ │
//! │                           └────────────┘                          │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`types`] - Domain types (transactions, events, filters, actions)
//! - [`error`] - Layered error types
//! - [`config`] - Configuration loading and validation
//! - [`catalog`] - Protocol catalog and log/calldata decoding
//! - [`engine`] - Core workers (tracker, monitors, backfill, facade)
//! - [`bus`] - Typed multi-subscriber event bus
//! - [`ports`] - Chain-access trait decoupling monitors from transport
//!
//! # Getting Started
//!
//! ```bash
//! # Point config/default.toml (or OBSERVER_* env vars) at your endpoints,
//! # then start observing
//! cargo run -- run
//!
//! # Backfill a historical range
//! cargo run -- backfill --from 19000000 --to 19001000
//! ```

#![doc(html_root_url = "https://docs.chainwatch.io/observer")]

pub mod bus;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod ports;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod testkit;

pub use bus::{EngineEvent, EventBus, EventKind, Subscription};
pub use engine::{BackfillRequest, MonitoringStats, ObservationEngine};
pub use error::{DomainError, EngineError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version string
#[must_use]
pub const fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
        assert!(version().starts_with("0."));
    }
}
