//! Monitored contract events, reorganization records, and user actions.

use alloy::primitives::{Address, B256, Bytes};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::DecodedFields;
use crate::types::primitives::EventId;

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT FILTER
// ═══════════════════════════════════════════════════════════════════════════════

/// A log filter: one contract, one event signature, optional extra topics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    /// Contract address to watch.
    pub contract: Address,
    /// Event signature hash (topic0).
    pub event_signature: B256,
    /// Additional indexed-topic constraints (positions 1..), `None` = wildcard.
    #[serde(default)]
    pub extra_topics: Vec<Option<B256>>,
}

impl EventFilter {
    /// Create a filter on (contract, topic0).
    #[must_use]
    pub const fn new(contract: Address, event_signature: B256) -> Self {
        Self {
            contract,
            event_signature,
            extra_topics: Vec::new(),
        }
    }

    /// Stable identity derived from (contract, signature).
    #[must_use]
    pub fn filter_id(&self) -> String {
        format!(
            "{}:{}",
            eth_rpc::canonical_address(&self.contract),
            eth_rpc::canonical_hash(&self.event_signature)
        )
    }

    /// The topics array for `eth_getLogs`.
    #[must_use]
    pub fn topics(&self) -> Vec<Option<B256>> {
        let mut topics = vec![Some(self.event_signature)];
        topics.extend(self.extra_topics.iter().copied());
        topics
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MONITORED EVENT
// ═══════════════════════════════════════════════════════════════════════════════

/// A contract event tracked through the confirmation lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitoredEvent {
    /// Identity: transaction hash ∥ log index.
    pub event_id: EventId,
    /// Emitting contract.
    pub contract: Address,
    /// Human name from the signature table, when recognized.
    pub event_name: Option<String>,
    /// Containing block.
    pub block_number: u64,
    /// Hash of that block as observed.
    pub block_hash: B256,
    /// Emitting transaction hash.
    pub tx_hash: B256,
    /// Transaction position within the block.
    pub tx_index: u64,
    /// Log position within the block.
    pub log_index: u64,
    /// Raw indexed topics.
    pub topics: Vec<B256>,
    /// Raw non-indexed data.
    pub data: Bytes,
    /// Block timestamp (seconds).
    pub block_timestamp: u64,
    /// Depth below the current head.
    pub confirmations: u64,
    /// Whether the event has reached the confirmation threshold.
    pub confirmed: bool,
    /// Decoded parameters, attached at confirmation when the signature is
    /// in the catalog.
    pub decoded_fields: Option<DecodedFields>,
    /// Protocol the contract belongs to, when classified.
    pub protocol_name: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// REORGANIZATION RECORD
// ═══════════════════════════════════════════════════════════════════════════════

/// A detected chain reorganization at one height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorgRecord {
    /// Height where the hash changed.
    pub block_number: u64,
    /// Hash previously stored for this height.
    pub old_hash: B256,
    /// Replacement canonical hash.
    pub new_hash: B256,
    /// Events whose placement the reorg invalidated.
    pub affected_event_ids: Vec<EventId>,
    /// When the tracker noticed.
    pub detected_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// USER ACTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// High-level intent synthesized from the decoded logs of one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Supplying assets into a protocol.
    Deposit,
    /// Removing supplied assets.
    Withdraw,
    /// Opening or increasing a loan.
    Borrow,
    /// Paying a loan back.
    Repay,
    /// Trading one asset for another.
    Swap,
    /// A position being liquidated.
    Liquidation,
    /// Locking assets for staking.
    Stake,
    /// Unlocking staked assets.
    Unstake,
}

impl ActionKind {
    /// Map an event name onto an action kind by the fixed keyword table.
    ///
    /// `unstake` is checked before `stake` so names like "Unstaked" land on
    /// the right kind.
    #[must_use]
    pub fn from_event_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.contains("unstake") {
            return Some(Self::Unstake);
        }
        if lower.contains("stake") {
            return Some(Self::Stake);
        }
        if lower.contains("liquidat") {
            return Some(Self::Liquidation);
        }
        if lower.contains("deposit") || lower.contains("supply") {
            return Some(Self::Deposit);
        }
        if lower.contains("withdraw") || lower.contains("redeem") {
            return Some(Self::Withdraw);
        }
        if lower.contains("borrow") {
            return Some(Self::Borrow);
        }
        if lower.contains("repay") {
            return Some(Self::Repay);
        }
        if lower.contains("swap") || lower.contains("trade") {
            return Some(Self::Swap);
        }
        None
    }
}

/// One user-level action, coalesced from all confirmed events of a
/// transaction. Emitted at most once per transaction hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserAction {
    /// Transaction sender.
    pub user: Address,
    /// Action type; when events map to several kinds, the first confirmed
    /// event's kind wins.
    pub action: ActionKind,
    /// Protocol the action touched, when classified.
    pub protocol: Option<String>,
    /// The transaction.
    pub tx_hash: B256,
    /// Containing block.
    pub block_number: u64,
    /// Block timestamp (seconds).
    pub block_timestamp: u64,
    /// Decoded fields of the event that determined the action type.
    pub details: Option<DecodedFields>,
    /// Every event of the transaction, in log order.
    pub events: Vec<EventId>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, b256};
    use rstest::rstest;

    #[test]
    fn filter_id_is_stable_and_lowercase() {
        let filter = EventFilter::new(
            address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
            b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"),
        );
        assert_eq!(
            filter.filter_id(),
            "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2:\
             0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn filter_topics_lead_with_signature() {
        let sig = b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");
        let mut filter = EventFilter::new(Address::ZERO, sig);
        filter.extra_topics = vec![None, Some(B256::ZERO)];
        let topics = filter.topics();
        assert_eq!(topics.len(), 3);
        assert_eq!(topics[0], Some(sig));
        assert_eq!(topics[1], None);
    }

    #[rstest]
    #[case("Supply", Some(ActionKind::Deposit))]
    #[case("Deposit", Some(ActionKind::Deposit))]
    #[case("Withdraw", Some(ActionKind::Withdraw))]
    #[case("RedeemUnderlying", Some(ActionKind::Withdraw))]
    #[case("Borrow", Some(ActionKind::Borrow))]
    #[case("Repay", Some(ActionKind::Repay))]
    #[case("Swap", Some(ActionKind::Swap))]
    #[case("LiquidationCall", Some(ActionKind::Liquidation))]
    #[case("Staked", Some(ActionKind::Stake))]
    #[case("Unstaked", Some(ActionKind::Unstake))]
    #[case("Transfer", None)]
    #[case("AnswerUpdated", None)]
    fn keyword_mapping(#[case] name: &str, #[case] expected: Option<ActionKind>) {
        assert_eq!(ActionKind::from_event_name(name), expected);
    }
}
