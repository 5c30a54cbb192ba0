//! ABI bindings for standard ERC-20 token events.
//!
//! Every tracked token contract (WETH, USDC, DAI) shares this interface.

use alloy::sol;

sol! {
    /// Emitted on every token transfer, including mints (`from` = zero) and
    /// burns (`to` = zero).
    #[derive(Debug, PartialEq, Eq)]
    event Transfer(
        address indexed from,
        address indexed to,
        uint256 value
    );

    /// Emitted when an owner sets a spender allowance.
    #[derive(Debug, PartialEq, Eq)]
    event Approval(
        address indexed owner,
        address indexed spender,
        uint256 value
    );

    /// ERC-20 transfer.
    function transfer(address to, uint256 amount) external returns (bool);

    /// ERC-20 delegated transfer.
    function transferFrom(address from, address to, uint256 amount) external returns (bool);

    /// ERC-20 allowance grant.
    function approve(address spender, uint256 amount) external returns (bool);
}
