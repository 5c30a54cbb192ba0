//! Error types for the JSON-RPC wire layer.
//!
//! This module provides the error hierarchy for RPC operations:
//!
//! - [`RpcError`] - The primary error type for all client operations
//! - Various error kinds for different failure modes (network, RPC, parsing)
//!
//! # Error Philosophy
//!
//! These errors are designed to be:
//! - **Actionable**: Each variant tells you what went wrong and often how to fix it
//! - **Classifiable**: [`RpcError::is_retryable`] drives the caller's failover and
//!   endpoint health accounting
//! - **Informative**: Contains enough context for debugging without leaking secrets

use std::fmt;

use thiserror::Error;

/// Result type alias using [`RpcError`].
pub type Result<T> = std::result::Result<T, RpcError>;

/// Errors that can occur when talking to an EVM JSON-RPC endpoint.
///
/// # Categories
///
/// | Category | Variants | Typical Cause |
/// |----------|----------|---------------|
/// | Network | `Connection`, `Timeout`, `Http` | Network issues, server down |
/// | Protocol | `Rpc`, `MethodNotSupported`, `RateLimited` | Server rejected request |
/// | Data | `Serialization`, `InvalidResponse` | Malformed data |
/// | Usage | `InvalidConfig` | Programmer error |
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RpcError {
    /// Failed to establish connection to the RPC endpoint.
    ///
    /// This usually indicates the endpoint is unreachable or the URL is invalid.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Request timed out waiting for response.
    ///
    /// The timeout duration is determined by
    /// [`ClientConfig::timeout`](crate::ClientConfig::timeout).
    #[error("request timed out")]
    Timeout,

    /// HTTP-level error (non-2xx status code, TLS issues, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The endpoint asked us to slow down (HTTP 429 or JSON-RPC -32005).
    #[error("rate limited by endpoint")]
    RateLimited,

    /// JSON-RPC error returned by the server.
    ///
    /// Contains the error code and message from the RPC response.
    #[error("RPC error ({code}): {message}")]
    Rpc {
        /// JSON-RPC error code (e.g., -32601 for method not found).
        code: i64,
        /// Human-readable error message from the server.
        message: String,
        /// Optional additional data from the error response.
        data: Option<String>,
    },

    /// The requested RPC method is not supported by this endpoint.
    ///
    /// This is a specific case of [`RpcError::Rpc`] for method-not-found errors,
    /// separated because callers often want to handle it specially.
    #[error("method not supported: {method}")]
    MethodNotSupported {
        /// The method name that was not supported.
        method: String,
    },

    /// Failed to serialize request or deserialize response.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Response was valid JSON but had unexpected structure.
    ///
    /// This can happen when the RPC returns a different format than expected,
    /// when required fields are missing, or when a numeric field is out of range.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Invalid configuration provided to the client.
    ///
    /// Check the configuration values (URL format, timeout range, etc.).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RpcError {
    /// Create an RPC error from code and message.
    #[must_use]
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Check if this error indicates the method is not supported.
    ///
    /// Returns `true` for both [`RpcError::MethodNotSupported`] and
    /// [`RpcError::Rpc`] with method-not-found error codes.
    #[must_use]
    pub const fn is_method_not_supported(&self) -> bool {
        match self {
            Self::MethodNotSupported { .. } => true,
            Self::Rpc { code, .. } => {
                // -32601 = Method not found (JSON-RPC standard)
                // -32600 = Invalid request (some providers use this for unsupported methods)
                *code == -32601 || *code == -32600
            }
            _ => false,
        }
    }

    /// Check if this error is likely transient and retryable.
    ///
    /// Returns `true` for network issues, timeouts, rate limiting, and
    /// server-side errors that might succeed on retry. This classification
    /// feeds the provider pool's failure counters.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout | Self::RateLimited => true,
            Self::Http(msg) => {
                // 5xx errors are typically retryable
                msg.contains("500")
                    || msg.contains("502")
                    || msg.contains("503")
                    || msg.contains("504")
            }
            Self::Rpc { code, .. } => {
                // Server overloaded or rate limited
                *code == -32005 // Limit exceeded
                    || *code == -32000 // Server error (generic)
            }
            _ => false,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONVERSIONS FROM reqwest ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) {
            Self::RateLimited
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if err.is_request() || err.is_body() || err.is_decode() {
            Self::Http(err.to_string())
        } else {
            Self::Connection(err.to_string())
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RPC ERROR DETAILS
// ═══════════════════════════════════════════════════════════════════════════════

/// Detailed information from a JSON-RPC error response.
///
/// Used internally for parsing error responses from the server.
#[derive(Debug, Clone, serde::Deserialize)]
pub(crate) struct RpcErrorDetail {
    /// JSON-RPC error code.
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional error data.
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl RpcErrorDetail {
    /// Convert this detail into an [`RpcError`].
    pub fn into_error(self, method: &str) -> RpcError {
        // Check for method not supported
        if self.code == -32601 || self.code == -32600 {
            return RpcError::MethodNotSupported {
                method: method.to_string(),
            };
        }

        if self.code == -32005 {
            return RpcError::RateLimited;
        }

        RpcError::Rpc {
            code: self.code,
            message: self.message,
            data: self.data.map(|v| v.to_string()),
        }
    }
}

impl fmt::Display for RpcErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RPC error ({}): {}", self.code, self.message)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
