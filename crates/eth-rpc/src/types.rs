//! Request and response types for EVM JSON-RPC methods.
//!
//! This module defines the wire structures used by [`EthRpcClient`](crate::EthRpcClient):
//!
//! - [`JsonRpcRequest`] - The JSON-RPC 2.0 request envelope
//! - [`Block`], [`Transaction`], [`Receipt`], [`Log`] - chain objects
//! - [`LogFilter`] - filter parameters for `eth_getLogs`
//! - [`BlockHeader`] - the compact header shape delivered by `newHeads`
//!
//! # Quantity encoding
//!
//! Providers disagree on numeric encoding: the JSON-RPC spec says hex
//! quantities (`"0x1b4"`), but some gateways emit decimal strings or raw JSON
//! numbers. The [`quantity`] codecs accept all three and range-check the
//! result. On the way out, everything renders canonically: `u64` as a JSON
//! number, `U256` as a decimal string (arbitrary precision survives).
//!
//! Unknown response fields are ignored everywhere.

use alloy::primitives::{Address, B256, Bytes, U256};
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// JSON-RPC ENVELOPE
// ═══════════════════════════════════════════════════════════════════════════════

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    /// Protocol version, always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Request id for response correlation.
    pub id: u64,
    /// Method name (e.g. `eth_getLogs`).
    pub method: &'static str,
    /// Positional parameters.
    pub params: serde_json::Value,
}

impl JsonRpcRequest {
    /// Build a request for `method` with positional `params`.
    #[must_use]
    pub const fn new(id: u64, method: &'static str, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// A JSON-RPC 2.0 response envelope.
///
/// Exactly one of `result` / `error` is present on a conforming server; a
/// `null` result (tx/block/receipt not found) deserializes as `None`.
#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcResponse<T> {
    #[serde(default = "Option::default")]
    pub result: Option<T>,
    #[serde(default)]
    pub error: Option<crate::error::RpcErrorDetail>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// QUANTITY CODECS
// ═══════════════════════════════════════════════════════════════════════════════

/// Serde codecs for JSON-RPC quantities.
///
/// Accepted inputs: hex strings (`"0x1b4"`), decimal strings (`"436"`), and
/// JSON numbers. Canonical output: JSON numbers for `u64`, decimal strings
/// for `U256`.
pub mod quantity {
    use super::U256;
    use serde::de::{self, Deserializer, Unexpected};
    use serde::ser::Serializer;

    fn parse_u64<E: de::Error>(s: &str) -> Result<u64, E> {
        let parsed = s.strip_prefix("0x").map_or_else(
            || s.parse::<u64>(),
            |hex| u64::from_str_radix(hex, 16),
        );
        parsed.map_err(|_| de::Error::invalid_value(Unexpected::Str(s), &"a u64 quantity"))
    }

    fn parse_u256<E: de::Error>(s: &str) -> Result<U256, E> {
        let parsed = s.strip_prefix("0x").map_or_else(
            || U256::from_str_radix(s, 10),
            |hex| U256::from_str_radix(hex, 16),
        );
        parsed.map_err(|_| de::Error::invalid_value(Unexpected::Str(s), &"a u256 quantity"))
    }

    /// `u64` quantity codec.
    pub mod u64_qty {
        use super::*;
        use serde::Deserialize;

        /// Deserialize a `u64` from hex, decimal string, or number.
        ///
        /// # Errors
        /// Fails when the value does not parse or exceeds `u64::MAX`.
        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
            #[derive(Deserialize)]
            #[serde(untagged)]
            enum Raw<'a> {
                Num(u64),
                Str(&'a str),
                Owned(String),
            }
            match Raw::deserialize(d)? {
                Raw::Num(n) => Ok(n),
                Raw::Str(s) => parse_u64(s),
                Raw::Owned(s) => parse_u64(&s),
            }
        }

        /// Serialize as a JSON number.
        ///
        /// # Errors
        /// Propagates serializer failures.
        pub fn serialize<S: Serializer>(v: &u64, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_u64(*v)
        }
    }

    /// `Option<u64>` quantity codec.
    pub mod opt_u64 {
        use super::*;
        use serde::Deserialize;

        /// Deserialize an optional `u64` quantity; `null` maps to `None`.
        ///
        /// # Errors
        /// Fails when a present value does not parse.
        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
            #[derive(Deserialize)]
            #[serde(untagged)]
            enum Raw<'a> {
                Num(u64),
                Str(&'a str),
                Owned(String),
            }
            Option::<Raw<'_>>::deserialize(d)?
                .map(|raw| match raw {
                    Raw::Num(n) => Ok(n),
                    Raw::Str(s) => parse_u64(s),
                    Raw::Owned(s) => parse_u64(&s),
                })
                .transpose()
        }

        /// Serialize as a JSON number or `null`.
        ///
        /// # Errors
        /// Propagates serializer failures.
        pub fn serialize<S: Serializer>(v: &Option<u64>, s: S) -> Result<S::Ok, S::Error> {
            match v {
                Some(n) => s.serialize_u64(*n),
                None => s.serialize_none(),
            }
        }
    }

    /// `U256` quantity codec.
    pub mod u256 {
        use super::*;
        use serde::Deserialize;

        /// Deserialize a `U256` from hex, decimal string, or number.
        ///
        /// # Errors
        /// Fails when the value does not parse as an unsigned 256-bit integer.
        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<U256, D::Error> {
            #[derive(Deserialize)]
            #[serde(untagged)]
            enum Raw<'a> {
                Num(u64),
                Str(&'a str),
                Owned(String),
            }
            match Raw::deserialize(d)? {
                Raw::Num(n) => Ok(U256::from(n)),
                Raw::Str(s) => parse_u256(s),
                Raw::Owned(s) => parse_u256(&s),
            }
        }

        /// Serialize as a canonical decimal string.
        ///
        /// # Errors
        /// Propagates serializer failures.
        pub fn serialize<S: Serializer>(v: &U256, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_str(&v.to_string())
        }
    }

    /// `Option<U256>` quantity codec.
    pub mod opt_u256 {
        use super::*;
        use serde::Deserialize;

        /// Deserialize an optional `U256` quantity; `null` maps to `None`.
        ///
        /// # Errors
        /// Fails when a present value does not parse.
        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<U256>, D::Error> {
            #[derive(Deserialize)]
            #[serde(untagged)]
            enum Raw<'a> {
                Num(u64),
                Str(&'a str),
                Owned(String),
            }
            Option::<Raw<'_>>::deserialize(d)?
                .map(|raw| match raw {
                    Raw::Num(n) => Ok(U256::from(n)),
                    Raw::Str(s) => parse_u256(s),
                    Raw::Owned(s) => parse_u256(&s),
                })
                .transpose()
        }

        /// Serialize as a canonical decimal string or `null`.
        ///
        /// # Errors
        /// Propagates serializer failures.
        pub fn serialize<S: Serializer>(v: &Option<U256>, s: S) -> Result<S::Ok, S::Error> {
            match v {
                Some(n) => s.serialize_str(&n.to_string()),
                None => s.serialize_none(),
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CANONICAL HEX RENDERING
// ═══════════════════════════════════════════════════════════════════════════════

/// Render an address as canonical 0x-prefixed lowercase hex.
///
/// `Address`'s `Display` impl is EIP-55 checksummed; everything this engine
/// emits is lowercase by contract.
#[must_use]
pub fn canonical_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}

/// Render a 32-byte hash as canonical 0x-prefixed lowercase hex.
#[must_use]
pub fn canonical_hash(hash: &B256) -> String {
    format!("0x{}", hex::encode(hash.as_slice()))
}

/// Render a block number as the hex tag form JSON-RPC filters expect.
#[must_use]
pub fn block_tag(number: u64) -> String {
    format!("0x{number:x}")
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHAIN OBJECTS
// ═══════════════════════════════════════════════════════════════════════════════

/// A transaction as returned by `eth_getTransactionByHash`.
///
/// `block_number` and `block_hash` are absent while the transaction is in
/// the mempool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Transaction hash.
    pub hash: B256,
    /// Containing block hash; `None` while pending.
    #[serde(default)]
    pub block_hash: Option<B256>,
    /// Containing block number; `None` while pending.
    #[serde(default, with = "quantity::opt_u64")]
    pub block_number: Option<u64>,
    /// Position within the block; `None` while pending.
    #[serde(default, with = "quantity::opt_u64")]
    pub transaction_index: Option<u64>,
    /// Sender address.
    pub from: Address,
    /// Recipient address; `None` for contract creation.
    #[serde(default)]
    pub to: Option<Address>,
    /// Transferred value in wei.
    #[serde(with = "quantity::u256")]
    pub value: U256,
    /// Gas price in wei; absent on some EIP-1559 responses.
    #[serde(default, with = "quantity::opt_u256")]
    pub gas_price: Option<U256>,
    /// Sender nonce.
    #[serde(with = "quantity::u64_qty")]
    pub nonce: u64,
    /// Calldata.
    #[serde(default)]
    pub input: Bytes,
}

impl Transaction {
    /// Whether this transaction has been included in a block.
    #[must_use]
    pub const fn is_mined(&self) -> bool {
        self.block_number.is_some()
    }
}

/// A transaction receipt as returned by `eth_getTransactionReceipt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// Hash of the transaction this receipt belongs to.
    pub transaction_hash: B256,
    /// Block the transaction was included in.
    #[serde(with = "quantity::u64_qty")]
    pub block_number: u64,
    /// Hash of that block.
    pub block_hash: B256,
    /// Execution status: 1 = success, 0 = reverted. Absent pre-Byzantium.
    #[serde(default, with = "quantity::opt_u64")]
    pub status: Option<u64>,
    /// Gas consumed by this transaction.
    #[serde(default, with = "quantity::opt_u256")]
    pub gas_used: Option<U256>,
    /// Logs emitted during execution.
    #[serde(default)]
    pub logs: Vec<Log>,
}

impl Receipt {
    /// Whether the transaction reverted (`status == 0`).
    #[must_use]
    pub fn reverted(&self) -> bool {
        self.status == Some(0)
    }
}

/// Transactions carried in a [`Block`]: hashes or full objects depending on
/// the `with_txs` flag of the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockTransactions {
    /// Only transaction hashes were requested.
    Hashes(Vec<B256>),
    /// Full transaction objects were requested.
    Full(Vec<Transaction>),
}

impl Default for BlockTransactions {
    fn default() -> Self {
        Self::Hashes(Vec::new())
    }
}

impl BlockTransactions {
    /// Number of transactions in the block.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Hashes(h) => h.len(),
            Self::Full(f) => f.len(),
        }
    }

    /// Whether the block is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full transaction objects, when they were requested.
    #[must_use]
    pub fn as_full(&self) -> Option<&[Transaction]> {
        match self {
            Self::Full(f) => Some(f),
            Self::Hashes(_) => None,
        }
    }
}

/// A block as returned by `eth_getBlockByNumber`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Block height.
    #[serde(with = "quantity::u64_qty")]
    pub number: u64,
    /// Block hash.
    pub hash: B256,
    /// Hash of the parent block.
    pub parent_hash: B256,
    /// Unix timestamp (seconds) the block was mined.
    #[serde(with = "quantity::u64_qty")]
    pub timestamp: u64,
    /// Transactions, as hashes or full objects.
    #[serde(default)]
    pub transactions: BlockTransactions,
}

impl Block {
    /// The compact header view of this block.
    #[must_use]
    pub const fn header(&self) -> BlockHeader {
        BlockHeader {
            number: self.number,
            hash: self.hash,
            parent_hash: self.parent_hash,
            timestamp: self.timestamp,
        }
    }
}

/// A log entry as returned by `eth_getLogs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    /// Emitting contract address.
    pub address: Address,
    /// Indexed topics; `topics[0]` is the event signature hash.
    #[serde(default)]
    pub topics: Vec<B256>,
    /// Non-indexed data, ABI-encoded 32-byte words.
    #[serde(default)]
    pub data: Bytes,
    /// Containing block number.
    #[serde(default, with = "quantity::opt_u64")]
    pub block_number: Option<u64>,
    /// Containing block hash.
    #[serde(default)]
    pub block_hash: Option<B256>,
    /// Emitting transaction hash.
    #[serde(default)]
    pub transaction_hash: Option<B256>,
    /// Index of the transaction within its block.
    #[serde(default, with = "quantity::opt_u64")]
    pub transaction_index: Option<u64>,
    /// Index of the log within its block.
    #[serde(default, with = "quantity::opt_u64")]
    pub log_index: Option<u64>,
    /// Set when the log was removed by a reorganization.
    #[serde(default)]
    pub removed: bool,
}

impl Log {
    /// The event signature hash (`topics[0]`), when present.
    #[must_use]
    pub fn topic0(&self) -> Option<&B256> {
        self.topics.first()
    }
}

/// The compact header delivered by the `newHeads` subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    /// Block height.
    #[serde(with = "quantity::u64_qty")]
    pub number: u64,
    /// Block hash.
    pub hash: B256,
    /// Parent block hash; links the chain for reorder/reorg checks.
    pub parent_hash: B256,
    /// Unix timestamp (seconds).
    #[serde(with = "quantity::u64_qty")]
    pub timestamp: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOG FILTER
// ═══════════════════════════════════════════════════════════════════════════════

/// Filter parameters for `eth_getLogs`.
///
/// # Example
///
/// ```
/// use eth_rpc::LogFilter;
/// use alloy::primitives::{address, b256};
///
/// let filter = LogFilter::for_block(19_000_000)
///     .with_address(address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"))
///     .with_topic0(b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"));
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFilter {
    /// Starting block (hex tag like "0x100").
    pub from_block: String,

    /// Ending block (hex tag like "0x200").
    pub to_block: String,

    /// Optional contract addresses to filter.
    /// When `None`, logs from all addresses are returned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Vec<Address>>,

    /// Optional topics to filter.
    /// Each element is either a single topic or `None` for wildcard.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<Option<B256>>>,
}

impl LogFilter {
    /// Create a new filter for a block range.
    #[must_use]
    pub fn new(from_block: u64, to_block: u64) -> Self {
        Self {
            from_block: block_tag(from_block),
            to_block: block_tag(to_block),
            address: None,
            topics: None,
        }
    }

    /// Create a filter covering a single block.
    #[must_use]
    pub fn for_block(block: u64) -> Self {
        Self::new(block, block)
    }

    /// Set the address filter.
    #[must_use]
    pub fn with_addresses(mut self, addresses: Vec<Address>) -> Self {
        self.address = Some(addresses);
        self
    }

    /// Set a single address filter.
    #[must_use]
    pub fn with_address(mut self, address: Address) -> Self {
        self.address = Some(vec![address]);
        self
    }

    /// Set the topics filter.
    #[must_use]
    pub fn with_topics(mut self, topics: Vec<Option<B256>>) -> Self {
        self.topics = Some(topics);
        self
    }

    /// Constrain `topics[0]` (the event signature hash).
    #[must_use]
    pub fn with_topic0(mut self, topic0: B256) -> Self {
        self.topics = Some(vec![Some(topic0)]);
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, b256};
    use proptest::prelude::*;
    use rstest::rstest;

    #[derive(Debug, Deserialize, Serialize)]
    struct QtyHolder {
        #[serde(with = "quantity::u64_qty")]
        n: u64,
        #[serde(with = "quantity::u256")]
        v: U256,
    }

    #[rstest]
    #[case(r#"{"n": "0x1b4", "v": "0xde0b6b3a7640000"}"#, 436, "1000000000000000000")]
    #[case(r#"{"n": "436", "v": "1000000000000000000"}"#, 436, "1000000000000000000")]
    #[case(r#"{"n": 436, "v": 1000}"#, 436, "1000")]
    fn quantities_accept_hex_decimal_and_numbers(
        #[case] json: &str,
        #[case] n: u64,
        #[case] v: &str,
    ) {
        let parsed: QtyHolder = serde_json::from_str(json).expect("parse failed");
        assert_eq!(parsed.n, n);
        assert_eq!(parsed.v.to_string(), v);
    }

    #[test]
    fn quantities_emit_canonical_decimal() {
        let holder = QtyHolder {
            n: 436,
            v: U256::from(10).pow(U256::from(18)),
        };
        let json = serde_json::to_value(&holder).expect("serialize failed");
        assert_eq!(json["n"], serde_json::json!(436));
        assert_eq!(json["v"], serde_json::json!("1000000000000000000"));
    }

    #[test]
    fn oversized_quantity_is_rejected() {
        // 2^64 does not fit a u64
        let json = r#"{"n": "0x10000000000000000", "v": "0"}"#;
        assert!(serde_json::from_str::<QtyHolder>(json).is_err());
    }

    #[test]
    fn canonical_rendering_is_lowercase() {
        let addr = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
        assert_eq!(
            canonical_address(&addr),
            "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"
        );
        assert_eq!(block_tag(0x1234), "0x1234");
    }

    #[test]
    fn transaction_parses_pending_and_mined() {
        let pending = r#"{
            "hash": "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b",
            "blockHash": null,
            "blockNumber": null,
            "from": "0xa7d9ddbe1f17865597fbd27ec712455208b6b76d",
            "to": "0xf02c1c8e6114b1dbe8937a39260b5b0a374432bb",
            "value": "0x4563918244f40000",
            "nonce": "0x15",
            "input": "0x"
        }"#;
        let tx: Transaction = serde_json::from_str(pending).expect("parse failed");
        assert!(!tx.is_mined());
        assert_eq!(tx.value, U256::from(5_000_000_000_000_000_000_u64));

        let mined = r#"{
            "hash": "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b",
            "blockHash": "0x1d59ff54b1eb26b013ce3cb5fc9dab3705b415a67127a003c3e61eb445bb8df2",
            "blockNumber": "0x5daf3b",
            "transactionIndex": "0x1",
            "from": "0xa7d9ddbe1f17865597fbd27ec712455208b6b76d",
            "to": "0xf02c1c8e6114b1dbe8937a39260b5b0a374432bb",
            "value": "0x0",
            "gasPrice": "0x4a817c800",
            "nonce": "0x15",
            "input": "0x68656c6c6f21",
            "v": "0x25"
        }"#;
        let tx: Transaction = serde_json::from_str(mined).expect("parse failed");
        assert!(tx.is_mined());
        assert_eq!(tx.block_number, Some(0x005d_af3b));
        // unknown field "v" is ignored
    }

    #[test]
    fn block_parses_hashes_and_full_transactions() {
        let with_hashes = r#"{
            "number": "0x1b4",
            "hash": "0xdc0818cf78f21a8e70579cb46a43643f78291264dda342ae31049421c82d21ae",
            "parentHash": "0xe99e022112df268087ea7eafaf4790497fd21dbeeb6bd7a1721df161a6657a54",
            "timestamp": "0x55ba467c",
            "transactions": ["0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b"]
        }"#;
        let block: Block = serde_json::from_str(with_hashes).expect("parse failed");
        assert_eq!(block.number, 436);
        assert_eq!(block.transactions.len(), 1);
        assert!(block.transactions.as_full().is_none());
        assert_eq!(block.header().number, 436);
    }

    #[test]
    fn receipt_reverted_flag() {
        let json = r#"{
            "transactionHash": "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b",
            "blockNumber": "0x5daf3b",
            "blockHash": "0x1d59ff54b1eb26b013ce3cb5fc9dab3705b415a67127a003c3e61eb445bb8df2",
            "status": "0x0",
            "gasUsed": "0x5208"
        }"#;
        let receipt: Receipt = serde_json::from_str(json).expect("parse failed");
        assert!(receipt.reverted());
        assert!(receipt.logs.is_empty());
    }

    #[test]
    fn log_filter_serializes_camel_case_hex() {
        let filter = LogFilter::for_block(0x1234)
            .with_address(address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"))
            .with_topic0(b256!(
                "ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
            ));
        let json = serde_json::to_value(&filter).expect("serialize failed");
        assert_eq!(json["fromBlock"], "0x1234");
        assert_eq!(json["toBlock"], "0x1234");
        assert_eq!(json["address"].as_array().map(Vec::len), Some(1));
        assert_eq!(json["topics"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn log_filter_omits_absent_constraints() {
        let json = serde_json::to_value(LogFilter::new(1, 2)).expect("serialize failed");
        assert!(json.get("address").is_none());
        assert!(json.get("topics").is_none());
    }

    proptest! {
        #[test]
        fn u64_quantity_roundtrips_through_hex(n in any::<u64>()) {
            let json = format!(r#"{{"n": "0x{n:x}", "v": "0"}}"#);
            let parsed: QtyHolder = serde_json::from_str(&json).expect("parse failed");
            prop_assert_eq!(parsed.n, n);
        }

        #[test]
        fn u256_quantity_roundtrips_through_decimal(bytes in any::<[u8; 32]>()) {
            let v = U256::from_be_bytes(bytes);
            let json = format!(r#"{{"n": 0, "v": "{v}"}}"#);
            let parsed: QtyHolder = serde_json::from_str(&json).expect("parse failed");
            prop_assert_eq!(parsed.v, v);
        }
    }
}
