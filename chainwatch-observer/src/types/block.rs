//! Block-level records shared between the tracker and the monitors.

use alloy::primitives::B256;
use eth_rpc::BlockHeader;
use serde::{Deserialize, Serialize};

/// One entry of the block tracker's sliding hash window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    /// Block height.
    pub number: u64,
    /// Canonical hash at this height, as last observed.
    pub hash: B256,
    /// Unix timestamp (seconds).
    pub timestamp: u64,
}

impl From<BlockHeader> for BlockRecord {
    fn from(header: BlockHeader) -> Self {
        Self {
            number: header.number,
            hash: header.hash,
            timestamp: header.timestamp,
        }
    }
}

/// Head notification delivered by the block tracker to the monitors.
///
/// Notices arrive strictly in the order the tracker accepted the headers;
/// `is_reorg` marks a replacement at an already-seen height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadNotice {
    /// Height of the accepted header.
    pub number: u64,
    /// Hash of the accepted header.
    pub hash: B256,
    /// Unix timestamp (seconds) of the accepted header.
    pub timestamp: u64,
    /// True when this header replaced a different hash at the same height.
    pub is_reorg: bool,
    /// The hash this header replaced, set only on reorg notices.
    pub prev_hash: Option<B256>,
    /// Current head of the chain as the tracker sees it.
    pub head: u64,
}
