//! Monitored transactions and the filters that select them.

use alloy::primitives::{Address, B256, FixedBytes, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// LIFECYCLE
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifecycle state of a monitored transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    /// Seen but not yet confirmed to the configured depth.
    Pending,
    /// Confirmed to at least the configured depth. Terminal.
    Confirmed,
    /// Expired, reverted, or reorganized out. Terminal.
    Failed,
}

/// Why a transaction reached `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// Stayed pending longer than the configured maximum age.
    Expired,
    /// The receipt reported execution status 0.
    Reverted,
    /// A reorganization removed it from the canonical chain.
    ReorganizedOut,
}

/// A transaction tracked by the monitor.
///
/// `block_number == 0` means the transaction is still in the mempool.
/// A hash lives in at most one of the pending/confirmed tables; failed
/// transactions are in neither once their terminal event is emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredTransaction {
    /// Transaction hash.
    pub tx_hash: B256,
    /// Containing block, 0 while pending.
    pub block_number: u64,
    /// Sender.
    pub from: Address,
    /// Recipient; `None` for contract creation.
    pub to: Option<Address>,
    /// Value in wei.
    #[serde(with = "eth_rpc::types::quantity::u256")]
    pub value: U256,
    /// Gas price in wei, when the endpoint reported one.
    #[serde(with = "eth_rpc::types::quantity::opt_u256")]
    pub gas_price: Option<U256>,
    /// Depth below the current head, 0 until mined.
    pub confirmations: u64,
    /// When the monitor first saw this hash.
    pub first_seen_at: DateTime<Utc>,
    /// Lifecycle state.
    pub status: TxStatus,
    /// Whether a reorganization has touched this transaction.
    pub reorganized: bool,
}

impl MonitoredTransaction {
    /// Build a tracked record from a wire transaction.
    #[must_use]
    pub fn from_rpc(tx: &eth_rpc::Transaction, first_seen_at: DateTime<Utc>) -> Self {
        Self {
            tx_hash: tx.hash,
            block_number: tx.block_number.unwrap_or(0),
            from: tx.from,
            to: tx.to,
            value: tx.value,
            gas_price: tx.gas_price,
            confirmations: 0,
            first_seen_at,
            status: TxStatus::Pending,
            reorganized: false,
        }
    }

    /// Whether the transaction has been included in a block.
    #[must_use]
    pub const fn is_mined(&self) -> bool {
        self.block_number != 0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILTERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Constraints selecting transactions for emission.
///
/// Matching is AND within a filter and OR across filters: a transaction
/// matches the monitor when any installed filter accepts it. A filter with
/// no constraints accepts everything the watch-list admits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFilter {
    /// Match when `from` or `to` is in this list. Empty = unconstrained.
    #[serde(default)]
    pub addresses: Vec<Address>,
    /// Inclusive lower bound on value (wei).
    #[serde(default, with = "eth_rpc::types::quantity::opt_u256")]
    pub min_value: Option<U256>,
    /// Inclusive upper bound on value (wei).
    #[serde(default, with = "eth_rpc::types::quantity::opt_u256")]
    pub max_value: Option<U256>,
    /// Match when `to` is one of these contracts. Empty = unconstrained.
    #[serde(default)]
    pub contracts: Vec<Address>,
    /// Match when calldata starts with one of these selectors.
    /// Empty = unconstrained.
    #[serde(default)]
    pub method_selectors: Vec<FixedBytes<4>>,
}

impl TransactionFilter {
    /// Whether this filter has no constraints at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
            && self.min_value.is_none()
            && self.max_value.is_none()
            && self.contracts.is_empty()
            && self.method_selectors.is_empty()
    }

    /// Whether every specified constraint holds for `tx`.
    ///
    /// Address comparison is on raw bytes, so hex casing never matters.
    #[must_use]
    pub fn matches(&self, tx: &eth_rpc::Transaction) -> bool {
        if !self.addresses.is_empty() {
            let hit = self.addresses.contains(&tx.from)
                || tx.to.is_some_and(|to| self.addresses.contains(&to));
            if !hit {
                return false;
            }
        }

        if let Some(min) = self.min_value {
            if tx.value < min {
                return false;
            }
        }
        if let Some(max) = self.max_value {
            if tx.value > max {
                return false;
            }
        }

        if !self.contracts.is_empty() && !tx.to.is_some_and(|to| self.contracts.contains(&to)) {
            return false;
        }

        if !self.method_selectors.is_empty() {
            if tx.input.len() < 4 {
                return false;
            }
            let selector = FixedBytes::<4>::from_slice(&tx.input[..4]);
            if !self.method_selectors.contains(&selector) {
                return false;
            }
        }

        true
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, b256};

    fn tx(value_wei: u128, to: Option<Address>) -> eth_rpc::Transaction {
        eth_rpc::Transaction {
            hash: b256!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"),
            block_hash: None,
            block_number: Some(1_000),
            transaction_index: Some(0),
            from: address!("a7d9ddbe1f17865597fbd27ec712455208b6b76d"),
            to,
            value: U256::from(value_wei),
            gas_price: None,
            nonce: 1,
            input: alloy::primitives::Bytes::new(),
        }
    }

    #[test]
    fn empty_filter_accepts_everything() {
        let filter = TransactionFilter::default();
        assert!(filter.is_empty());
        assert!(filter.matches(&tx(0, None)));
    }

    #[test]
    fn value_range_is_inclusive() {
        let eth = 1_000_000_000_000_000_000_u128;
        let filter = TransactionFilter {
            min_value: Some(U256::from(eth)),
            ..Default::default()
        };

        // Half an ether: rejected.
        assert!(!filter.matches(&tx(eth / 2, None)));
        // Exactly the bound: accepted (inclusive).
        assert!(filter.matches(&tx(eth, None)));
        // Two ether: accepted.
        assert!(filter.matches(&tx(2 * eth, None)));
    }

    #[test]
    fn address_filter_matches_from_or_to() {
        let watched = address!("a7d9ddbe1f17865597fbd27ec712455208b6b76d");
        let other = address!("f02c1c8e6114b1dbe8937a39260b5b0a374432bb");

        let filter = TransactionFilter {
            addresses: vec![watched],
            ..Default::default()
        };

        // Sender matches.
        assert!(filter.matches(&tx(0, Some(other))));

        // Neither side matches.
        let mut stranger = tx(0, Some(other));
        stranger.from = other;
        assert!(!stranger.to.is_some_and(|t| t == watched));
        assert!(!filter.matches(&stranger));
    }

    #[test]
    fn selector_filter_requires_calldata_prefix() {
        let selector = FixedBytes::<4>::from_slice(&[0xa9, 0x05, 0x9c, 0xbb]);
        let filter = TransactionFilter {
            method_selectors: vec![selector],
            ..Default::default()
        };

        let mut call = tx(0, None);
        call.input = alloy::primitives::Bytes::from(vec![0xa9, 0x05, 0x9c, 0xbb, 0x00, 0x01]);
        assert!(filter.matches(&call));

        let mut wrong = tx(0, None);
        wrong.input = alloy::primitives::Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]);
        assert!(!filter.matches(&wrong));

        // Plain transfer has no calldata to match.
        assert!(!filter.matches(&tx(0, None)));
    }

    #[test]
    fn constraints_combine_with_and() {
        let watched = address!("a7d9ddbe1f17865597fbd27ec712455208b6b76d");
        let filter = TransactionFilter {
            addresses: vec![watched],
            min_value: Some(U256::from(100_u64)),
            ..Default::default()
        };

        // Address matches but value is too small.
        assert!(!filter.matches(&tx(50, None)));
        // Both hold.
        assert!(filter.matches(&tx(100, None)));
    }

    #[test]
    fn from_rpc_maps_pending_to_zero_block() {
        let mut wire = tx(5, None);
        wire.block_number = None;
        let record = MonitoredTransaction::from_rpc(&wire, Utc::now());
        assert_eq!(record.block_number, 0);
        assert!(!record.is_mined());
        assert_eq!(record.status, TxStatus::Pending);
    }
}
