//! Block tracker: sliding hash window, reorg detection, header reordering.
//!
//! The tracker consumes the `newHeads` stream and is the engine's single
//! source of truth for "what the chain looks like". Per header:
//!
//! 1. A hash change at an already-seen height flags a reorganization rooted
//!    there.
//! 2. Otherwise the (number, hash) pair is stored and entries older than
//!    the window are evicted.
//! 3. Monitors are notified with `(number, hash, timestamp, is_reorg)` in
//!    exactly the order headers were accepted.
//!
//! Providers occasionally deliver headers out of order. Early headers wait
//! in a small parentHash-linked reorder buffer (≤ 8); a header older than
//! the window is dropped with a warning. When the buffer overflows - a gap
//! that will never fill, e.g. after failover - the lowest buffered header
//! is force-accepted so the stream keeps moving.

use std::collections::BTreeMap;

use alloy::primitives::B256;
use eth_rpc::BlockHeader;
use tracing::{debug, info, warn};

use crate::types::{BlockRecord, HeadNotice};

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default sliding-window size (blocks).
pub const DEFAULT_WINDOW_SIZE: u64 = 100;

/// Maximum headers parked in the reorder buffer.
pub const REORDER_CAPACITY: usize = 8;

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCK TRACKER
// ═══════════════════════════════════════════════════════════════════════════════

/// Owner of the block-hash window.
///
/// Purely synchronous state; the engine drives it from the header channel
/// and fans the returned notices out to the monitors.
#[derive(Debug)]
pub struct BlockTracker {
    /// number → record, the most recent `window_size` accepted blocks.
    window: BTreeMap<u64, BlockRecord>,
    window_size: u64,
    /// Highest accepted block number.
    last_head: u64,
    /// Early headers keyed by their parent hash.
    reorder: BTreeMap<B256, BlockHeader>,
}

impl BlockTracker {
    /// Create a tracker with the given window size.
    #[must_use]
    pub fn new(window_size: u64) -> Self {
        Self {
            window: BTreeMap::new(),
            window_size: window_size.max(1),
            last_head: 0,
            reorder: BTreeMap::new(),
        }
    }

    /// Highest accepted block number, 0 before the first header.
    #[must_use]
    pub const fn last_head(&self) -> u64 {
        self.last_head
    }

    /// The canonical hash stored for a height, when still in the window.
    #[must_use]
    pub fn hash_at(&self, number: u64) -> Option<B256> {
        self.window.get(&number).map(|record| record.hash)
    }

    /// Process one header from the stream.
    ///
    /// Returns the notices to deliver, in acceptance order: usually one,
    /// several when the header unblocks buffered successors, none when the
    /// header was buffered, duplicate, or dropped.
    pub fn process_header(&mut self, header: BlockHeader) -> Vec<HeadNotice> {
        let mut notices = Vec::new();

        if self.classify_and_accept(header, &mut notices) {
            self.drain_reorder(&mut notices);
        }
        self.enforce_reorder_bound(&mut notices);

        if let Some(last) = notices.last() {
            metrics::gauge!("chainwatch_head_block").set(last.head as f64);
        }
        notices
    }

    /// Accept, buffer, or drop one header. Returns whether anything was
    /// accepted (and the reorder buffer is worth draining).
    fn classify_and_accept(&mut self, header: BlockHeader, notices: &mut Vec<HeadNotice>) -> bool {
        // First header seeds the window wherever the chain currently is.
        if self.window.is_empty() {
            self.accept(header, notices);
            return true;
        }

        if header.number <= self.last_head {
            return self.handle_seen_height(header, notices);
        }

        if header.number == self.last_head + 1 {
            // Contiguous successor.
            self.accept(header, notices);
            return true;
        }

        // Early header: park it until its parent shows up.
        debug!(
            number = header.number,
            last_head = self.last_head,
            "Buffering out-of-order header"
        );
        self.reorder.insert(header.parent_hash, header);
        false
    }

    /// A header at a height we have already passed: duplicate, reorg, or
    /// stale straggler.
    fn handle_seen_height(&mut self, header: BlockHeader, notices: &mut Vec<HeadNotice>) -> bool {
        let window_start = self.last_head.saturating_sub(self.window_size.saturating_sub(1));
        if header.number < window_start {
            warn!(
                number = header.number,
                window_start, "Dropping header older than the block window"
            );
            return false;
        }

        match self.window.get(&header.number) {
            Some(stored) if stored.hash == header.hash => {
                debug!(number = header.number, "Duplicate header");
                false
            }
            Some(stored) => {
                // Same height, different hash: reorganization rooted here.
                let old_hash = stored.hash;
                info!(
                    number = header.number,
                    old = %eth_rpc::canonical_hash(&old_hash),
                    new = %eth_rpc::canonical_hash(&header.hash),
                    "Chain reorganization detected"
                );
                metrics::counter!("chainwatch_reorgs_detected").increment(1);

                // Descendants of the replaced block are stale; the stream
                // re-delivers them on the new branch.
                self.window.split_off(&header.number);
                self.window.insert(header.number, BlockRecord::from(header));
                self.last_head = header.number;
                notices.push(HeadNotice {
                    number: header.number,
                    hash: header.hash,
                    timestamp: header.timestamp,
                    is_reorg: true,
                    prev_hash: Some(old_hash),
                    head: self.last_head,
                });
                true
            }
            None => {
                // Inside the window but at a height we never stored: a
                // straggler from before the reorder buffer gave up on it.
                warn!(number = header.number, "Dropping unordered stale header");
                false
            }
        }
    }

    /// Store a header and emit its notice.
    fn accept(&mut self, header: BlockHeader, notices: &mut Vec<HeadNotice>) {
        self.window.insert(header.number, BlockRecord::from(header));
        self.last_head = self.last_head.max(header.number);

        // Evict entries older than the window.
        let min_keep = self
            .last_head
            .saturating_sub(self.window_size.saturating_sub(1));
        if min_keep > 0 {
            self.window = self.window.split_off(&min_keep);
        }

        notices.push(HeadNotice {
            number: header.number,
            hash: header.hash,
            timestamp: header.timestamp,
            is_reorg: false,
            prev_hash: None,
            head: self.last_head,
        });
    }

    /// Accept any buffered headers that now link onto the tip.
    fn drain_reorder(&mut self, notices: &mut Vec<HeadNotice>) {
        loop {
            let Some(tip_hash) = self.window.get(&self.last_head).map(|r| r.hash) else {
                return;
            };
            let Some(child) = self.reorder.remove(&tip_hash) else {
                return;
            };
            debug!(number = child.number, "Releasing buffered header");
            self.accept(child, notices);
        }
    }

    /// Keep the reorder buffer bounded: on overflow, force-accept the
    /// lowest buffered header (its gap is considered lost) and retry the
    /// linkage drain.
    fn enforce_reorder_bound(&mut self, notices: &mut Vec<HeadNotice>) {
        while self.reorder.len() > REORDER_CAPACITY {
            let Some(parent_key) = self
                .reorder
                .iter()
                .min_by_key(|(_, header)| header.number)
                .map(|(key, _)| *key)
            else {
                return;
            };
            let Some(header) = self.reorder.remove(&parent_key) else {
                return;
            };

            if header.number <= self.last_head {
                warn!(number = header.number, "Discarding stale buffered header");
                continue;
            }

            warn!(
                number = header.number,
                last_head = self.last_head,
                "Reorder buffer overflow, accepting header past gap"
            );
            self.accept(header, notices);
            self.drain_reorder(notices);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    /// A header whose hash and parent hash are derived from numbers, so
    /// chains are easy to script: `header(n, fork)` has hash `H(n, fork)`
    /// and parent `H(n-1, fork)`.
    fn hash(number: u64, fork: u8) -> B256 {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&number.to_be_bytes());
        bytes[31] = fork;
        B256::from(bytes)
    }

    fn header(number: u64, fork: u8) -> BlockHeader {
        BlockHeader {
            number,
            hash: hash(number, fork),
            parent_hash: hash(number.wrapping_sub(1), fork),
            timestamp: 1_700_000_000 + number,
        }
    }

    #[test]
    fn in_order_headers_notify_in_order() {
        let mut tracker = BlockTracker::new(100);
        for n in 1_000..1_005 {
            let notices = tracker.process_header(header(n, 0));
            assert_eq!(notices.len(), 1);
            assert_eq!(notices[0].number, n);
            assert!(!notices[0].is_reorg);
        }
        assert_eq!(tracker.last_head(), 1_004);
    }

    #[test]
    fn duplicate_header_is_silent() {
        let mut tracker = BlockTracker::new(100);
        assert_eq!(tracker.process_header(header(1_000, 0)).len(), 1);
        assert!(tracker.process_header(header(1_000, 0)).is_empty());
    }

    #[test]
    fn hash_change_at_seen_height_is_a_reorg() {
        let mut tracker = BlockTracker::new(100);
        for n in 1_000..=1_005 {
            tracker.process_header(header(n, 0));
        }

        // Block 1002 comes back with a different hash.
        let notices = tracker.process_header(header(1_002, 1));
        assert_eq!(notices.len(), 1);
        assert!(notices[0].is_reorg);
        assert_eq!(notices[0].number, 1_002);
        assert_eq!(notices[0].head, 1_002);

        // The replacement hash is now canonical, descendants are gone.
        assert_eq!(tracker.hash_at(1_002), Some(hash(1_002, 1)));
        assert_eq!(tracker.hash_at(1_003), None);
    }

    #[test]
    fn out_of_order_header_waits_for_parent() {
        let mut tracker = BlockTracker::new(100);
        tracker.process_header(header(1_000, 0));

        // 1002 arrives before 1001: buffered, no notice.
        assert!(tracker.process_header(header(1_002, 0)).is_empty());

        // 1001 arrives: both are released, in order.
        let notices = tracker.process_header(header(1_001, 0));
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].number, 1_001);
        assert_eq!(notices[1].number, 1_002);
        assert_eq!(tracker.last_head(), 1_002);
    }

    #[test]
    fn chain_of_buffered_headers_releases_together() {
        let mut tracker = BlockTracker::new(100);
        tracker.process_header(header(1_000, 0));

        assert!(tracker.process_header(header(1_003, 0)).is_empty());
        assert!(tracker.process_header(header(1_002, 0)).is_empty());

        let notices = tracker.process_header(header(1_001, 0));
        let numbers: Vec<_> = notices.iter().map(|n| n.number).collect();
        assert_eq!(numbers, [1_001, 1_002, 1_003]);
    }

    #[test]
    fn header_older_than_window_is_dropped() {
        let mut tracker = BlockTracker::new(10);
        for n in 1_000..1_020 {
            tracker.process_header(header(n, 0));
        }

        // 1005 is far below the 10-block window now.
        assert!(tracker.process_header(header(1_005, 1)).is_empty());
        assert_eq!(tracker.last_head(), 1_019);
    }

    #[test]
    fn window_evicts_old_entries() {
        let mut tracker = BlockTracker::new(5);
        for n in 1..=20 {
            tracker.process_header(header(n, 0));
        }
        assert!(tracker.hash_at(15).is_none());
        assert!(tracker.hash_at(16).is_some());
        assert!(tracker.hash_at(20).is_some());
    }

    #[test]
    fn reorder_overflow_skips_the_gap() {
        let mut tracker = BlockTracker::new(100);
        tracker.process_header(header(1_000, 0));

        // 1002..=1010 arrive while 1001 never does: nine early headers,
        // one more than the buffer holds.
        let mut released = Vec::new();
        for n in 1_002..=1_010 {
            released.extend(tracker.process_header(header(n, 0)));
        }

        // The overflow forced the lowest buffered header through, and the
        // linkage drain released everything behind it.
        assert!(!released.is_empty());
        assert_eq!(released.first().map(|n| n.number), Some(1_002));
        assert_eq!(tracker.last_head(), 1_010);
    }

    #[test]
    fn first_header_seeds_anywhere() {
        let mut tracker = BlockTracker::new(100);
        let notices = tracker.process_header(header(19_000_000, 0));
        assert_eq!(notices.len(), 1);
        assert_eq!(tracker.last_head(), 19_000_000);
    }
}
