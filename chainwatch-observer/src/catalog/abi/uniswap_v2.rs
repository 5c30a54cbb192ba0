//! ABI bindings for Uniswap V2 pair events and router methods.
//!
//! Pair events fire on the pool contracts; the router methods are what user
//! transactions actually call, so their selectors power calldata
//! classification.

use alloy::sol;

sol! {
    /// Emitted by a pair on every swap.
    ///
    /// Exactly one of `amount0In`/`amount1In` and one of
    /// `amount0Out`/`amount1Out` is non-zero for a simple trade.
    #[derive(Debug, PartialEq, Eq)]
    event Swap(
        address indexed sender,
        uint256 amount0In,
        uint256 amount1In,
        uint256 amount0Out,
        uint256 amount1Out,
        address indexed to
    );

    /// Emitted when liquidity is added to a pair.
    #[derive(Debug, PartialEq, Eq)]
    event Mint(
        address indexed sender,
        uint256 amount0,
        uint256 amount1
    );

    /// Emitted when liquidity is removed from a pair.
    #[derive(Debug, PartialEq, Eq)]
    event Burn(
        address indexed sender,
        uint256 amount0,
        uint256 amount1,
        address indexed to
    );

    /// Emitted after every reserve-changing operation.
    #[derive(Debug, PartialEq, Eq)]
    event Sync(
        uint112 reserve0,
        uint112 reserve1
    );

    /// Router: token-to-token swap with exact input.
    function swapExactTokensForTokens(
        uint256 amountIn,
        uint256 amountOutMin,
        address[] path,
        address to,
        uint256 deadline
    ) external returns (uint256[] amounts);

    /// Router: ETH-to-token swap with exact input.
    function swapExactETHForTokens(
        uint256 amountOutMin,
        address[] path,
        address to,
        uint256 deadline
    ) external returns (uint256[] amounts);

    /// Router: token-to-ETH swap with exact input.
    function swapExactTokensForETH(
        uint256 amountIn,
        uint256 amountOutMin,
        address[] path,
        address to,
        uint256 deadline
    ) external returns (uint256[] amounts);

    /// Router: add liquidity to a token pair.
    function addLiquidity(
        address tokenA,
        address tokenB,
        uint256 amountADesired,
        uint256 amountBDesired,
        uint256 amountAMin,
        uint256 amountBMin,
        address to,
        uint256 deadline
    ) external returns (uint256 amountA, uint256 amountB, uint256 liquidity);

    /// Router: remove liquidity from a token pair.
    function removeLiquidity(
        address tokenA,
        address tokenB,
        uint256 liquidity,
        uint256 amountAMin,
        uint256 amountBMin,
        address to,
        uint256 deadline
    ) external returns (uint256 amountA, uint256 amountB);
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::{SolCall, SolEvent};

    #[test]
    fn swap_signature_matches_mainnet() {
        assert_eq!(
            Swap::SIGNATURE,
            "Swap(address,uint256,uint256,uint256,uint256,address)"
        );
        assert_eq!(
            format!("0x{}", hex::encode(Swap::SIGNATURE_HASH)),
            "0xd78ad95fa46c994b6551d0da85fc275fe613ce37657fb8d5e3d130840159d822"
        );
    }

    #[test]
    fn router_selectors_match_mainnet() {
        // swapExactTokensForTokens(uint256,uint256,address[],address,uint256)
        assert_eq!(
            swapExactTokensForTokensCall::SELECTOR,
            [0x38, 0xed, 0x17, 0x39]
        );
        // swapExactETHForTokens(uint256,address[],address,uint256)
        assert_eq!(swapExactETHForTokensCall::SELECTOR, [0x7f, 0xf3, 0x6a, 0xb5]);
    }
}
