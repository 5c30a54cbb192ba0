//! Validated primitive types for the observation domain.
//!
//! These newtypes provide:
//! - Type safety (an event id is not just a tuple)
//! - Validation at construction time (API-boundary hash/address parsing)
//! - Domain semantics in function signatures

use std::fmt;

use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT ID
// ═══════════════════════════════════════════════════════════════════════════════

/// Unique identity of a monitored event: transaction hash ∥ log index.
///
/// Two observations with the same `EventId` are the same event, regardless
/// of which block currently carries it - reorg comparison leans on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId {
    /// Emitting transaction hash.
    pub tx_hash: B256,
    /// Log index within the block.
    pub log_index: u64,
}

impl EventId {
    /// Create an event id.
    #[must_use]
    pub const fn new(tx_hash: B256, log_index: u64) -> Self {
        Self { tx_hash, log_index }
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            eth_rpc::canonical_hash(&self.tx_hash),
            self.log_index
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// API-BOUNDARY PARSING
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse a 32-byte hash from 0x-prefixed hex, case-insensitive.
///
/// # Errors
/// Returns [`DomainError::InvalidHash`] on malformed input.
pub fn parse_hash(s: &str) -> Result<B256, DomainError> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    if stripped.len() != 64 {
        return Err(DomainError::InvalidHash(s.to_string()));
    }
    let bytes = hex::decode(stripped).map_err(|_| DomainError::InvalidHash(s.to_string()))?;
    Ok(B256::from_slice(&bytes))
}

/// Parse a 20-byte address from 0x-prefixed hex, case-insensitive.
///
/// Checksum casing is accepted but not required; comparisons downstream are
/// on raw bytes, which makes all address matching case-insensitive.
///
/// # Errors
/// Returns [`DomainError::InvalidAddress`] on malformed input.
pub fn parse_address(s: &str) -> Result<Address, DomainError> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    if stripped.len() != 40 {
        return Err(DomainError::InvalidAddress(s.to_string()));
    }
    let bytes = hex::decode(stripped).map_err(|_| DomainError::InvalidAddress(s.to_string()))?;
    Ok(Address::from_slice(&bytes))
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::b256;

    #[test]
    fn event_id_display_is_canonical() {
        let id = EventId::new(
            b256!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"),
            7,
        );
        assert_eq!(
            id.to_string(),
            "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa:7"
        );
    }

    #[test]
    fn parse_address_is_case_insensitive() {
        let lower = parse_address("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2").unwrap();
        let checksummed = parse_address("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2").unwrap();
        assert_eq!(lower, checksummed);
    }

    #[test]
    fn parse_address_rejects_bad_input() {
        assert!(parse_address("0x1234").is_err());
        assert!(parse_address("not-an-address").is_err());
        assert!(parse_address("0xzz2aaa39b223fe8d0a0e5c4f27ead9083c756cc2").is_err());
    }

    #[test]
    fn parse_hash_round_trips() {
        let hash = parse_hash("0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef")
            .unwrap();
        assert_eq!(
            eth_rpc::canonical_hash(&hash),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn parse_hash_rejects_wrong_length() {
        assert!(parse_hash("0xddf252ad").is_err());
    }
}
