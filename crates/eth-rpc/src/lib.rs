//! Typed JSON-RPC wire layer for EVM endpoints.
//!
//! This crate is the request half of the observation engine's connection
//! layer: a hand-rolled JSON-RPC client over `reqwest` with typed wrappers
//! for the handful of methods the engine needs, plus the wire structures and
//! quantity codecs shared with the streaming side.
//!
//! # Overview
//!
//! - [`EthRpcClient`] - one client per endpoint, typed method wrappers
//! - [`types`] - chain objects ([`Block`], [`Transaction`], [`Receipt`],
//!   [`Log`]), the [`LogFilter`], and hex/decimal quantity codecs
//! - [`error`] - [`RpcError`] with retryability classification
//! - [`config`] - [`ClientConfig`] (timeout, optional credential)
//!
//! # Wire rules
//!
//! Hashes are 32 bytes rendered as 0x-prefixed lowercase hex, addresses 20
//! bytes likewise; integers are accepted as hex or decimal and emitted as
//! canonical decimal; unknown response fields are ignored; all numerics are
//! range-validated at the serde boundary.

#![doc(html_root_url = "https://docs.chainwatch.io/eth-rpc")]

// ═══════════════════════════════════════════════════════════════════════════════
// MODULES
// ═══════════════════════════════════════════════════════════════════════════════

pub mod client;
pub mod config;
pub mod error;
pub mod types;

// ═══════════════════════════════════════════════════════════════════════════════
// RE-EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

// Primary types - what most users need
pub use client::EthRpcClient;
pub use config::ClientConfig;
pub use error::{Result, RpcError};
pub use types::{
    Block, BlockHeader, BlockTransactions, JsonRpcRequest, Log, LogFilter, Receipt, Transaction,
    block_tag, canonical_address, canonical_hash,
};

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
        assert!(version().starts_with("0."));
    }

    #[test]
    fn exports_are_available() {
        let _: fn(u64, u64) -> LogFilter = LogFilter::new;
        let _err: RpcError = RpcError::Timeout;
    }
}
