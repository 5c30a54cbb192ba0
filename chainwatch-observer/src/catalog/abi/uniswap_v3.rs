//! ABI bindings for Uniswap V3 pool events.
//!
//! V3 pools report signed deltas: positive amounts flow into the pool,
//! negative amounts flow out.

use alloy::sol;

sol! {
    /// Emitted by a pool on every swap.
    #[derive(Debug, PartialEq, Eq)]
    event Swap(
        address indexed sender,
        address indexed recipient,
        int256 amount0,
        int256 amount1,
        uint160 sqrtPriceX96,
        uint128 liquidity,
        int24 tick
    );

    /// Emitted when liquidity is minted for a position.
    #[derive(Debug, PartialEq, Eq)]
    event Mint(
        address sender,
        address indexed owner,
        int24 indexed tickLower,
        int24 indexed tickUpper,
        uint128 amount,
        uint256 amount0,
        uint256 amount1
    );

    /// Emitted when a position's liquidity is removed.
    #[derive(Debug, PartialEq, Eq)]
    event Burn(
        address indexed owner,
        int24 indexed tickLower,
        int24 indexed tickUpper,
        uint128 amount,
        uint256 amount0,
        uint256 amount1
    );
}
