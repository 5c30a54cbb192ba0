//! ABI bindings for the protocol catalog.
//!
//! Each protocol has its own submodule of `alloy::sol!` event and method
//! definitions. The decoder matches raw logs against these bindings by
//! signature hash (topic0) and calldata by 4-byte selector.
//!
//! # Catalog Coverage
//!
//! | Protocol | Module | Events | Methods |
//! |----------|--------|--------|---------|
//! | ERC-20 tokens | [`erc20`] | Transfer, Approval | transfer, transferFrom, approve |
//! | Uniswap V2 | [`uniswap_v2`] | Swap, Mint, Burn, Sync | swaps, add/removeLiquidity |
//! | Uniswap V3 | [`uniswap_v3`] | Swap, Mint, Burn | - |
//! | Aave V3 | [`aave_v3`] | Supply, Withdraw, Borrow, Repay, LiquidationCall | supply, withdraw, borrow, repay |
//! | Chainlink | [`chainlink`] | AnswerUpdated, NewRound | - |
//! | StakingRewards | [`staking`] | Staked, Withdrawn, RewardPaid | stake, withdraw, exit, getReward |

pub mod aave_v3;
pub mod chainlink;
pub mod erc20;
pub mod staking;
pub mod uniswap_v2;
pub mod uniswap_v3;

#[cfg(test)]
mod tests {
    use alloy::sol_types::SolEvent;

    use super::*;

    /// Verify that all catalog event signature hashes are unique.
    #[test]
    fn event_signatures_are_unique() {
        let signatures = [
            // ERC-20
            erc20::Transfer::SIGNATURE_HASH,
            erc20::Approval::SIGNATURE_HASH,
            // Uniswap V2
            uniswap_v2::Swap::SIGNATURE_HASH,
            uniswap_v2::Mint::SIGNATURE_HASH,
            uniswap_v2::Burn::SIGNATURE_HASH,
            uniswap_v2::Sync::SIGNATURE_HASH,
            // Uniswap V3
            uniswap_v3::Swap::SIGNATURE_HASH,
            uniswap_v3::Mint::SIGNATURE_HASH,
            uniswap_v3::Burn::SIGNATURE_HASH,
            // Aave V3
            aave_v3::Supply::SIGNATURE_HASH,
            aave_v3::Withdraw::SIGNATURE_HASH,
            aave_v3::Borrow::SIGNATURE_HASH,
            aave_v3::Repay::SIGNATURE_HASH,
            aave_v3::LiquidationCall::SIGNATURE_HASH,
            // Chainlink
            chainlink::AnswerUpdated::SIGNATURE_HASH,
            chainlink::NewRound::SIGNATURE_HASH,
            // StakingRewards
            staking::Staked::SIGNATURE_HASH,
            staking::Withdrawn::SIGNATURE_HASH,
            staking::RewardPaid::SIGNATURE_HASH,
        ];

        let mut seen = std::collections::HashSet::new();
        for sig in signatures {
            assert!(
                seen.insert(sig),
                "Duplicate event signature hash detected: {sig:?}"
            );
        }

        assert_eq!(seen.len(), 19, "Expected 19 unique event signatures");
    }
}
