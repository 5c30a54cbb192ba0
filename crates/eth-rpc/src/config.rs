//! Configuration for the JSON-RPC client.
//!
//! This module provides [`ClientConfig`] for customizing client behavior:
//!
//! - Request timeouts (the hard deadline for every call)
//! - Optional bearer credential attached to every request
//!
//! # Example
//!
//! ```
//! use eth_rpc::ClientConfig;
//! use std::time::Duration;
//!
//! let config = ClientConfig::default()
//!     .with_timeout(Duration::from_secs(10))
//!     .with_credential("secret-token");
//! ```

use std::time::Duration;

use crate::error::{Result, RpcError};

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default timeout for HTTP requests to an RPC endpoint.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Minimum allowed timeout.
pub const MIN_TIMEOUT: Duration = Duration::from_millis(100);

/// Maximum allowed timeout.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(300);

// ═══════════════════════════════════════════════════════════════════════════════
// CLIENT CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration options for [`EthRpcClient`](crate::EthRpcClient).
///
/// Use the builder pattern to customize settings:
///
/// ```
/// use eth_rpc::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::default().with_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout for HTTP calls.
    ///
    /// Default: 30 seconds.
    /// Range: 100 ms - 300 seconds.
    pub timeout: Duration,

    /// Optional bearer credential sent as an `Authorization` header.
    ///
    /// Some managed endpoints authenticate with a token instead of a
    /// key-in-URL scheme.
    pub credential: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_REQUEST_TIMEOUT,
            credential: None,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the bearer credential.
    #[must_use]
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::InvalidConfig`] if the timeout is outside the
    /// allowed range.
    pub fn validate(&self) -> Result<()> {
        if self.timeout < MIN_TIMEOUT || self.timeout > MAX_TIMEOUT {
            return Err(RpcError::InvalidConfig(format!(
                "timeout {:?} outside allowed range {MIN_TIMEOUT:?}..={MAX_TIMEOUT:?}",
                self.timeout
            )));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
