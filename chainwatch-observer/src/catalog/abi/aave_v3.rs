//! ABI bindings for the Aave V3 Pool contract.
//!
//! The lending side of the catalog: supply/withdraw/borrow/repay plus
//! liquidations, and the pool methods user transactions call.

use alloy::sol;

sol! {
    /// Emitted when assets are supplied into a reserve.
    #[derive(Debug, PartialEq, Eq)]
    event Supply(
        address indexed reserve,
        address user,
        address indexed onBehalfOf,
        uint256 amount,
        uint16 indexed referralCode
    );

    /// Emitted when supplied assets are withdrawn.
    #[derive(Debug, PartialEq, Eq)]
    event Withdraw(
        address indexed reserve,
        address indexed user,
        address indexed to,
        uint256 amount
    );

    /// Emitted when a loan is opened or increased.
    #[derive(Debug, PartialEq, Eq)]
    event Borrow(
        address indexed reserve,
        address user,
        address indexed onBehalfOf,
        uint256 amount,
        uint8 interestRateMode,
        uint256 borrowRate,
        uint16 indexed referralCode
    );

    /// Emitted when debt is repaid.
    #[derive(Debug, PartialEq, Eq)]
    event Repay(
        address indexed reserve,
        address indexed user,
        address indexed repayer,
        uint256 amount,
        bool useATokens
    );

    /// Emitted when an undercollateralized position is liquidated.
    #[derive(Debug, PartialEq, Eq)]
    event LiquidationCall(
        address indexed collateralAsset,
        address indexed debtAsset,
        address indexed user,
        uint256 debtToCover,
        uint256 liquidatedCollateralAmount,
        address liquidator,
        bool receiveAToken
    );

    /// Pool: supply assets.
    function supply(
        address asset,
        uint256 amount,
        address onBehalfOf,
        uint16 referralCode
    ) external;

    /// Pool: withdraw supplied assets.
    function withdraw(address asset, uint256 amount, address to) external returns (uint256);

    /// Pool: borrow against collateral.
    function borrow(
        address asset,
        uint256 amount,
        uint256 interestRateMode,
        uint16 referralCode,
        address onBehalfOf
    ) external;

    /// Pool: repay debt.
    function repay(
        address asset,
        uint256 amount,
        uint256 interestRateMode,
        address onBehalfOf
    ) external returns (uint256);
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::{SolCall, SolEvent};

    #[test]
    fn event_signatures_are_canonical() {
        assert_eq!(
            Supply::SIGNATURE,
            "Supply(address,address,address,uint256,uint16)"
        );
        assert_eq!(
            Withdraw::SIGNATURE,
            "Withdraw(address,address,address,uint256)"
        );
        assert_eq!(
            LiquidationCall::SIGNATURE,
            "LiquidationCall(address,address,address,uint256,uint256,address,bool)"
        );
    }

    #[test]
    fn supply_selector_matches_mainnet() {
        // supply(address,uint256,address,uint16)
        assert_eq!(supplyCall::SELECTOR, [0x61, 0x7b, 0xa0, 0x37]);
    }
}
