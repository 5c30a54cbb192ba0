//! JSON-RPC client with typed method wrappers.
//!
//! This module provides [`EthRpcClient`], the HTTP request half of the
//! connection layer. Each public method maps 1:1 to a JSON-RPC method:
//!
//! | Method | JSON-RPC |
//! |--------|----------|
//! | [`EthRpcClient::block_number`] | `eth_blockNumber` |
//! | [`EthRpcClient::get_transaction`] | `eth_getTransactionByHash` |
//! | [`EthRpcClient::get_transaction_receipt`] | `eth_getTransactionReceipt` |
//! | [`EthRpcClient::get_block_by_number`] | `eth_getBlockByNumber` |
//! | [`EthRpcClient::get_logs`] | `eth_getLogs` |
//!
//! The streaming half (`newHeads`) lives with the connection manager, which
//! owns subscription lifecycle and failover.
//!
//! # Thread Safety
//!
//! This client is `Send + Sync` and can be shared across tasks. The internal
//! `reqwest::Client` is designed for concurrent use.
//!
//! # Example
//!
//! ```ignore
//! use eth_rpc::EthRpcClient;
//!
//! let client = EthRpcClient::new("https://eth.llamarpc.com")?;
//! let head = client.block_number().await?;
//! let block = client.get_block_by_number(head, true).await?;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use alloy::primitives::B256;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, trace};

use crate::config::ClientConfig;
use crate::error::{Result, RpcError};
use crate::types::{Block, JsonRpcRequest, JsonRpcResponse, Log, LogFilter, Receipt, Transaction};

/// Newtype for bare quantity results (`eth_blockNumber`).
#[derive(Debug, Deserialize)]
struct Quantity(#[serde(with = "crate::types::quantity::u64_qty")] u64);

// ═══════════════════════════════════════════════════════════════════════════════
// RPC CLIENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Typed JSON-RPC client for a single EVM endpoint.
///
/// One client exists per configured endpoint; the provider pool caches them
/// and routes requests to whichever endpoint currently holds the stream.
/// The configured timeout is the hard deadline for every call.
#[derive(Debug)]
pub struct EthRpcClient {
    /// HTTP client for JSON-RPC requests.
    client: reqwest::Client,

    /// RPC endpoint URL.
    rpc_url: String,

    /// Request ID counter for JSON-RPC correlation.
    request_id: AtomicU64,
}

impl EthRpcClient {
    /// Create a new client with default configuration.
    ///
    /// # Arguments
    ///
    /// * `rpc_url` - HTTP URL of the JSON-RPC endpoint
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(rpc_url: impl Into<String>) -> Result<Self> {
        Self::with_config(rpc_url, ClientConfig::default())
    }

    /// Create a new client with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn with_config(rpc_url: impl Into<String>, config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = reqwest::Client::builder().timeout(config.timeout);

        if let Some(credential) = &config.credential {
            let mut headers = reqwest::header::HeaderMap::new();
            let mut value = reqwest::header::HeaderValue::from_str(&format!(
                "Bearer {credential}"
            ))
            .map_err(|_| RpcError::InvalidConfig("credential is not a valid header".into()))?;
            value.set_sensitive(true);
            headers.insert(reqwest::header::AUTHORIZATION, value);
            builder = builder.default_headers(headers);
        }

        let client = builder
            .build()
            .map_err(|e| RpcError::Connection(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            rpc_url: rpc_url.into(),
            request_id: AtomicU64::new(1),
        })
    }

    /// Get the RPC URL this client is connected to.
    #[must_use]
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Get the next request ID for JSON-RPC correlation.
    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // TYPED METHOD WRAPPERS
    // ───────────────────────────────────────────────────────────────────────────

    /// Fetch the current head block number (`eth_blockNumber`).
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a malformed response.
    #[instrument(skip(self), fields(url = %self.rpc_url))]
    pub async fn block_number(&self) -> Result<u64> {
        let qty: Quantity = self.call("eth_blockNumber", serde_json::json!([])).await?;
        Ok(qty.0)
    }

    /// Fetch a transaction by hash (`eth_getTransactionByHash`).
    ///
    /// Returns `None` when the node does not know the transaction; callers
    /// surface that unchanged rather than treating it as a fault.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a malformed response.
    #[instrument(skip(self), fields(hash = %hash))]
    pub async fn get_transaction(&self, hash: B256) -> Result<Option<Transaction>> {
        self.call_nullable("eth_getTransactionByHash", serde_json::json!([hash]))
            .await
    }

    /// Fetch a transaction receipt by hash (`eth_getTransactionReceipt`).
    ///
    /// Returns `None` until the transaction has been mined.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a malformed response.
    #[instrument(skip(self), fields(hash = %hash))]
    pub async fn get_transaction_receipt(&self, hash: B256) -> Result<Option<Receipt>> {
        self.call_nullable("eth_getTransactionReceipt", serde_json::json!([hash]))
            .await
    }

    /// Fetch a block by number (`eth_getBlockByNumber`).
    ///
    /// With `with_txs` the block carries full transaction objects; otherwise
    /// only hashes. Returns `None` for unknown heights (e.g. beyond head).
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a malformed response.
    #[instrument(skip(self), fields(number, with_txs))]
    pub async fn get_block_by_number(
        &self,
        number: u64,
        with_txs: bool,
    ) -> Result<Option<Block>> {
        self.call_nullable(
            "eth_getBlockByNumber",
            serde_json::json!([crate::types::block_tag(number), with_txs]),
        )
        .await
    }

    /// Fetch logs matching a filter (`eth_getLogs`).
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a malformed response.
    #[instrument(skip(self, filter), fields(from = %filter.from_block, to = %filter.to_block))]
    pub async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>> {
        self.call("eth_getLogs", serde_json::json!([filter])).await
    }

    // ───────────────────────────────────────────────────────────────────────────
    // TRANSPORT
    // ───────────────────────────────────────────────────────────────────────────

    /// Issue a JSON-RPC call whose result must be present.
    async fn call<R: DeserializeOwned>(
        &self,
        method: &'static str,
        params: serde_json::Value,
    ) -> Result<R> {
        self.call_nullable(method, params).await?.ok_or_else(|| {
            RpcError::InvalidResponse(format!("{method}: response carried a null result"))
        })
    }

    /// Issue a JSON-RPC call whose result may legitimately be `null`.
    async fn call_nullable<R: DeserializeOwned>(
        &self,
        method: &'static str,
        params: serde_json::Value,
    ) -> Result<Option<R>> {
        let request = JsonRpcRequest::new(self.next_request_id(), method, params);
        trace!(method, id = request.id, "Sending JSON-RPC request");

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(RpcError::RateLimited);
        }
        if !status.is_success() {
            return Err(RpcError::Http(format!("{method}: HTTP {status}")));
        }

        let envelope: JsonRpcResponse<R> = response.json().await?;

        if let Some(error) = envelope.error {
            debug!(method, %error, "JSON-RPC error response");
            return Err(error.into_error(method));
        }

        Ok(envelope.result)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::b256;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rpc_result(result: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": result
        }))
    }

    #[tokio::test]
    async fn block_number_parses_hex_quantity() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_partial_json(json!({"method": "eth_blockNumber"})))
            .respond_with(rpc_result(json!("0x12d687")))
            .mount(&server)
            .await;

        let client = EthRpcClient::new(server.uri()).expect("client");
        assert_eq!(client.block_number().await.expect("call"), 0x0012_d687);
    }

    #[tokio::test]
    async fn unknown_transaction_returns_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "eth_getTransactionByHash"})))
            .respond_with(rpc_result(json!(null)))
            .mount(&server)
            .await;

        let client = EthRpcClient::new(server.uri()).expect("client");
        let tx = client
            .get_transaction(b256!(
                "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
            ))
            .await
            .expect("call");
        assert!(tx.is_none());
    }

    #[tokio::test]
    async fn rpc_error_is_surfaced_with_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32602, "message": "invalid params"}
            })))
            .mount(&server)
            .await;

        let client = EthRpcClient::new(server.uri()).expect("client");
        let err = client.block_number().await.expect_err("should fail");
        assert!(matches!(err, RpcError::Rpc { code: -32602, .. }));
    }

    #[tokio::test]
    async fn http_429_maps_to_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = EthRpcClient::new(server.uri()).expect("client");
        let err = client.block_number().await.expect_err("should fail");
        assert!(matches!(err, RpcError::RateLimited));
    }

    #[tokio::test]
    async fn get_logs_round_trips_filter_and_logs() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "method": "eth_getLogs",
                "params": [{"fromBlock": "0x64", "toBlock": "0x64"}]
            })))
            .respond_with(rpc_result(json!([{
                "address": "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2",
                "topics": ["0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"],
                "data": "0x",
                "blockNumber": "0x64",
                "blockHash": "0x1d59ff54b1eb26b013ce3cb5fc9dab3705b415a67127a003c3e61eb445bb8df2",
                "transactionHash": "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b",
                "transactionIndex": "0x0",
                "logIndex": "0x2"
            }])))
            .mount(&server)
            .await;

        let client = EthRpcClient::new(server.uri()).expect("client");
        let logs = client
            .get_logs(&LogFilter::for_block(100))
            .await
            .expect("call");
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].log_index, Some(2));
    }

    #[tokio::test]
    async fn null_result_for_required_method_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(rpc_result(json!(null)))
            .mount(&server)
            .await;

        let client = EthRpcClient::new(server.uri()).expect("client");
        let err = client.block_number().await.expect_err("should fail");
        assert!(matches!(err, RpcError::InvalidResponse(_)));
    }

    #[test]
    fn request_ids_are_monotonic() {
        let client = EthRpcClient::new("http://localhost:8545").expect("client");
        let first = client.next_request_id();
        let second = client.next_request_id();
        assert!(second > first);
    }
}
