//! Layered error types for the observation engine.
//!
//! This module provides a hierarchical error system:
//!
//! - [`DomainError`] - Requests rejected at the API boundary (bad input)
//! - [`EngineError`] - Application-level errors combining domain faults,
//!   infrastructure failures, and lifecycle outcomes
//!
//! # Error Philosophy
//!
//! - Invalid input is rejected before it reaches a worker
//! - "Not found" is an answer, not a fault: lookups return `Option`
//! - Transient provider failures feed the pool's failure counters and are
//!   retried; they never abort a monitor loop
//! - `Cancelled` is terminal for the operation and non-fatal for the engine
//! - Only misconfiguration or exhaustion of every endpoint is fatal

use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// DOMAIN ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Input validation errors, rejected at the API boundary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DomainError {
    /// Malformed 32-byte hash.
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    /// Malformed 20-byte address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Block range where `from > to` or the range is outside the chain.
    #[error("invalid block range: {from}..={to}")]
    InvalidBlockRange {
        /// Range start.
        from: u64,
        /// Range end.
        to: u64,
    },

    /// Confirmation threshold outside 1..=100.
    #[error("invalid confirmation threshold: {0} (allowed 1..=100)")]
    InvalidConfirmationThreshold(u32),

    /// A transaction monitor needs at least one address or one non-empty
    /// filter before it emits anything.
    #[error("monitor requires at least one address or one non-empty filter")]
    EmptyWatchSet,

    /// The referenced event filter is not installed.
    #[error("unknown event filter: {0}")]
    UnknownEventFilter(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Application-level errors for engine operations.
///
/// This is the primary error type used throughout the service.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// Request rejected at the API boundary.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Provider pool failure (no healthy endpoint, deadline, failover).
    #[error(transparent)]
    Pool(#[from] provider_pool::PoolError),

    /// JSON-RPC failure from the wire layer.
    #[error(transparent)]
    Rpc(#[from] eth_rpc::RpcError),

    /// The operation was cancelled by shutdown or deadline.
    #[error("operation cancelled")]
    Cancelled,

    /// A worker's input or output channel closed unexpectedly.
    #[error("channel closed: {0}")]
    ChannelClosed(String),

    /// A backfill window kept failing after retries; the scan stopped.
    #[error("backfill aborted in block range {from}..={to}")]
    BackfillAborted {
        /// First block of the failing window.
        from: u64,
        /// Last block of the failing window.
        to: u64,
    },

    /// Configuration error (fatal at startup).
    #[error("configuration error: {0}")]
    Config(String),

    /// Initialization error (fatal at startup).
    #[error("initialization error: {0}")]
    Initialization(String),
}

/// Type alias for engine Results.
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Whether this failure is transient: worth retrying and never a reason
    /// to abort a monitor loop.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Rpc(rpc) => rpc.is_retryable(),
            Self::Pool(pool) => pool.is_endpoint_fault(),
            _ => false,
        }
    }

    /// Whether this failure means shutdown was requested.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Pool(provider_pool::PoolError::Cancelled)
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_error_display() {
        let err = DomainError::InvalidAddress("0x1234".into());
        assert!(err.to_string().contains("0x1234"));
    }

    #[test]
    fn engine_error_from_domain() {
        let app: EngineError = DomainError::EmptyWatchSet.into();
        assert!(matches!(app, EngineError::Domain(DomainError::EmptyWatchSet)));
        assert!(!app.is_transient());
    }

    #[test]
    fn transient_classification_follows_rpc() {
        let err: EngineError = eth_rpc::RpcError::Timeout.into();
        assert!(err.is_transient());

        let err: EngineError = eth_rpc::RpcError::InvalidResponse("bad".into()).into();
        assert!(!err.is_transient());
    }

    #[test]
    fn cancelled_detection_covers_pool_cancellation() {
        let err: EngineError = provider_pool::PoolError::Cancelled.into();
        assert!(err.is_cancelled());
        assert!(EngineError::Cancelled.is_cancelled());
        assert!(!EngineError::Config("x".into()).is_cancelled());
    }
}
