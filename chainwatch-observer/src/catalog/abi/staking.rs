//! ABI bindings for StakingRewards-style staking contracts.
//!
//! The Synthetix `StakingRewards` interface, forked across much of DeFi:
//! stake, withdraw, claim. Its event names drive the stake/unstake action
//! classification.

use alloy::sol;

sol! {
    /// Emitted when a user stakes tokens.
    #[derive(Debug, PartialEq, Eq)]
    event Staked(
        address indexed user,
        uint256 amount
    );

    /// Emitted when a user withdraws staked tokens.
    #[derive(Debug, PartialEq, Eq)]
    event Withdrawn(
        address indexed user,
        uint256 amount
    );

    /// Emitted when accrued rewards are paid out.
    #[derive(Debug, PartialEq, Eq)]
    event RewardPaid(
        address indexed user,
        uint256 reward
    );

    /// Stake tokens.
    function stake(uint256 amount) external;

    /// Withdraw staked tokens.
    function withdraw(uint256 amount) external;

    /// Withdraw everything and claim rewards.
    function exit() external;

    /// Claim accrued rewards.
    function getReward() external;
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::{SolCall, SolEvent};

    #[test]
    fn signatures_are_canonical() {
        assert_eq!(Staked::SIGNATURE, "Staked(address,uint256)");
        assert_eq!(Withdrawn::SIGNATURE, "Withdrawn(address,uint256)");
        assert_eq!(RewardPaid::SIGNATURE, "RewardPaid(address,uint256)");
    }

    #[test]
    fn stake_selector_matches_mainnet() {
        // stake(uint256)
        assert_eq!(stakeCall::SELECTOR, [0xa6, 0x94, 0xfc, 0x3a]);
    }
}
