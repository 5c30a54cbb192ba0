//! ABI bindings for Chainlink aggregator events.
//!
//! Oracle price updates; never mapped to a user action but classified and
//! decoded for downstream consumers.

use alloy::sol;

sol! {
    /// Emitted when an aggregator round settles on a new answer.
    #[derive(Debug, PartialEq, Eq)]
    event AnswerUpdated(
        int256 indexed current,
        uint256 indexed roundId,
        uint256 updatedAt
    );

    /// Emitted when a new aggregation round begins.
    #[derive(Debug, PartialEq, Eq)]
    event NewRound(
        uint256 indexed roundId,
        address indexed startedBy,
        uint256 startedAt
    );
}
