//! Error types for the provider pool.
//!
//! [`PoolError`] covers registry misuse, connection lifecycle failures, and
//! the deadline/cancellation outcomes every pooled RPC call can produce.

use thiserror::Error;

/// Result type alias using [`PoolError`].
pub type Result<T> = std::result::Result<T, PoolError>;

/// Errors produced by the provider pool.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// No endpoint in the registry is currently healthy and dialable.
    ///
    /// At engine startup this is fatal; after the first successful
    /// connection the supervisor keeps retrying with backoff instead.
    #[error("no healthy provider available")]
    NoHealthyProvider,

    /// The named endpoint is not registered.
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),

    /// The named endpoint is registered but currently unhealthy.
    ///
    /// Returned by `force_provider`, which refuses to pin to a dead node.
    #[error("endpoint is unhealthy: {0}")]
    UnhealthyEndpoint(String),

    /// Endpoint configuration failed validation at registration.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// An endpoint with this name is already registered.
    #[error("duplicate endpoint name: {0}")]
    DuplicateEndpoint(String),

    /// No connection is currently established.
    #[error("not connected")]
    NotConnected,

    /// The rate-limit token could not be claimed before the call deadline.
    #[error("deadline expired waiting for rate limit token: {endpoint}")]
    DeadlineExpired {
        /// The endpoint whose bucket was exhausted.
        endpoint: String,
    },

    /// The operation was cancelled by shutdown.
    #[error("operation cancelled")]
    Cancelled,

    /// Establishing the streaming subscription failed.
    #[error("stream subscription failed: {0}")]
    Subscription(String),

    /// Underlying JSON-RPC failure.
    #[error(transparent)]
    Rpc(#[from] eth_rpc::RpcError),
}

impl PoolError {
    /// Whether this error should trip the endpoint's failure counter.
    ///
    /// Deadline and cancellation outcomes are caller-side conditions, not
    /// endpoint faults.
    #[must_use]
    pub fn is_endpoint_fault(&self) -> bool {
        match self {
            Self::Rpc(rpc) => rpc.is_retryable(),
            Self::Subscription(_) => true,
            _ => false,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
