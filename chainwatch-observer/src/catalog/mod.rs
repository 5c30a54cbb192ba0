//! Protocol catalog: compiled-in contract addresses, event signatures, and
//! method selectors for a fixed DeFi protocol set.
//!
//! The catalog is static data plus a stateless decoder; it never talks to
//! the chain. Monitors use it to classify contracts, install default event
//! filters, and attach decoded payloads to confirmed events.
//!
//! # Modules
//!
//! - [`abi`] - `alloy::sol!` bindings per protocol
//! - [`decoder`] - signature-hash log decoding and selector calldata decoding

pub mod abi;
pub mod decoder;

pub use decoder::{
    DecodeError, DecodedCall, DecodedFields, DecodedLog, DecodedValue, LogDecoder,
};

use alloy::primitives::{Address, B256, address};
use alloy::sol_types::SolEvent;
use serde::{Deserialize, Serialize};

use crate::types::EventFilter;

// ═══════════════════════════════════════════════════════════════════════════════
// PROTOCOLS & ROLES
// ═══════════════════════════════════════════════════════════════════════════════

/// Protocols the catalog knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Protocol {
    /// Uniswap V2 pairs and router.
    UniswapV2,
    /// Uniswap V3 pools and router.
    UniswapV3,
    /// Aave V3 lending pool.
    AaveV3,
    /// Chainlink price aggregators.
    Chainlink,
    /// Synthetix-style StakingRewards contracts.
    StakingRewards,
    /// Plain ERC-20 tokens.
    Erc20,
}

impl Protocol {
    /// Stable lowercase name used in published events.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::UniswapV2 => "uniswap_v2",
            Self::UniswapV3 => "uniswap_v3",
            Self::AaveV3 => "aave_v3",
            Self::Chainlink => "chainlink",
            Self::StakingRewards => "staking_rewards",
            Self::Erc20 => "erc20",
        }
    }
}

/// What a catalog contract does within its protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractRole {
    /// Liquidity pool / lending pool / staking pool.
    Pool,
    /// Entry-point router users transact against.
    Router,
    /// Price oracle.
    Oracle,
    /// Token contract.
    Token,
}

/// One catalog contract.
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    /// Mainnet address.
    pub address: Address,
    /// Owning protocol.
    pub protocol: Protocol,
    /// Role within the protocol.
    pub role: ContractRole,
    /// Human label for logs.
    pub label: &'static str,
}

/// The compiled-in contract table (Ethereum mainnet).
pub static CONTRACTS: &[CatalogEntry] = &[
    // ─── Uniswap V2 ────────────────────────────────────────────────────────────
    CatalogEntry {
        address: address!("7a250d5630B4cF539739dF2C5dAcb4c659F2488D"),
        protocol: Protocol::UniswapV2,
        role: ContractRole::Router,
        label: "uniswap_v2_router02",
    },
    CatalogEntry {
        address: address!("B4e16d0168e52d35CaCD2c6185b44281Ec28C9Dc"),
        protocol: Protocol::UniswapV2,
        role: ContractRole::Pool,
        label: "uniswap_v2_usdc_weth",
    },
    CatalogEntry {
        address: address!("A478c2975Ab1Ea89e8196811F51A7B7Ade33eB11"),
        protocol: Protocol::UniswapV2,
        role: ContractRole::Pool,
        label: "uniswap_v2_dai_weth",
    },
    // ─── Uniswap V3 ────────────────────────────────────────────────────────────
    CatalogEntry {
        address: address!("E592427A0AEce92De3Edee1F18E0157C05861564"),
        protocol: Protocol::UniswapV3,
        role: ContractRole::Router,
        label: "uniswap_v3_swap_router",
    },
    CatalogEntry {
        address: address!("88e6A0c2dDD26FEEb64F039a2c41296FcB3f5640"),
        protocol: Protocol::UniswapV3,
        role: ContractRole::Pool,
        label: "uniswap_v3_usdc_weth_005",
    },
    // ─── Aave V3 ───────────────────────────────────────────────────────────────
    CatalogEntry {
        address: address!("87870Bca3F3fD6335C3F4ce8392D69350B4fA4E2"),
        protocol: Protocol::AaveV3,
        role: ContractRole::Pool,
        label: "aave_v3_pool",
    },
    // ─── Chainlink ─────────────────────────────────────────────────────────────
    CatalogEntry {
        address: address!("5f4eC3Df9cbd43714FE2740f5E3616155c5b8419"),
        protocol: Protocol::Chainlink,
        role: ContractRole::Oracle,
        label: "chainlink_eth_usd",
    },
    CatalogEntry {
        address: address!("F4030086522a5bEEa4988F8cA5B36dbC97BeE88c"),
        protocol: Protocol::Chainlink,
        role: ContractRole::Oracle,
        label: "chainlink_btc_usd",
    },
    // ─── StakingRewards ────────────────────────────────────────────────────────
    CatalogEntry {
        address: address!("dcb6a51ea3ca5d3fd898fd6564757c7aaec3ca92"),
        protocol: Protocol::StakingRewards,
        role: ContractRole::Pool,
        label: "staking_rewards_susd",
    },
    // ─── Tokens ────────────────────────────────────────────────────────────────
    CatalogEntry {
        address: address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
        protocol: Protocol::Erc20,
        role: ContractRole::Token,
        label: "weth",
    },
    CatalogEntry {
        address: address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
        protocol: Protocol::Erc20,
        role: ContractRole::Token,
        label: "usdc",
    },
    CatalogEntry {
        address: address!("6B175474E89094C44Da98b954EedeAC495271d0F"),
        protocol: Protocol::Erc20,
        role: ContractRole::Token,
        label: "dai",
    },
];

// ═══════════════════════════════════════════════════════════════════════════════
// LOOKUPS
// ═══════════════════════════════════════════════════════════════════════════════

/// Find the catalog entry for a contract address.
#[must_use]
pub fn lookup(address: Address) -> Option<&'static CatalogEntry> {
    CONTRACTS.iter().find(|entry| entry.address == address)
}

/// Classify a contract address into its protocol.
#[must_use]
pub fn classify_contract(address: Address) -> Option<Protocol> {
    lookup(address).map(|entry| entry.protocol)
}

/// The event signatures a catalog contract is expected to emit.
#[must_use]
pub fn event_signatures(protocol: Protocol, role: ContractRole) -> &'static [B256] {
    // Statics so the slices have 'static lifetime without per-call allocation.
    static UNISWAP_V2_POOL: std::sync::LazyLock<Vec<B256>> = std::sync::LazyLock::new(|| {
        vec![
            abi::uniswap_v2::Swap::SIGNATURE_HASH,
            abi::uniswap_v2::Mint::SIGNATURE_HASH,
            abi::uniswap_v2::Burn::SIGNATURE_HASH,
        ]
    });
    static UNISWAP_V3_POOL: std::sync::LazyLock<Vec<B256>> = std::sync::LazyLock::new(|| {
        vec![
            abi::uniswap_v3::Swap::SIGNATURE_HASH,
            abi::uniswap_v3::Mint::SIGNATURE_HASH,
            abi::uniswap_v3::Burn::SIGNATURE_HASH,
        ]
    });
    static AAVE_POOL: std::sync::LazyLock<Vec<B256>> = std::sync::LazyLock::new(|| {
        vec![
            abi::aave_v3::Supply::SIGNATURE_HASH,
            abi::aave_v3::Withdraw::SIGNATURE_HASH,
            abi::aave_v3::Borrow::SIGNATURE_HASH,
            abi::aave_v3::Repay::SIGNATURE_HASH,
            abi::aave_v3::LiquidationCall::SIGNATURE_HASH,
        ]
    });
    static CHAINLINK_ORACLE: std::sync::LazyLock<Vec<B256>> = std::sync::LazyLock::new(|| {
        vec![
            abi::chainlink::AnswerUpdated::SIGNATURE_HASH,
            abi::chainlink::NewRound::SIGNATURE_HASH,
        ]
    });
    static STAKING_POOL: std::sync::LazyLock<Vec<B256>> = std::sync::LazyLock::new(|| {
        vec![
            abi::staking::Staked::SIGNATURE_HASH,
            abi::staking::Withdrawn::SIGNATURE_HASH,
            abi::staking::RewardPaid::SIGNATURE_HASH,
        ]
    });
    static TOKEN: std::sync::LazyLock<Vec<B256>> =
        std::sync::LazyLock::new(|| vec![abi::erc20::Transfer::SIGNATURE_HASH]);
    static NONE: Vec<B256> = Vec::new();

    match (protocol, role) {
        (Protocol::UniswapV2, ContractRole::Pool) => UNISWAP_V2_POOL.as_slice(),
        (Protocol::UniswapV3, ContractRole::Pool) => UNISWAP_V3_POOL.as_slice(),
        (Protocol::AaveV3, ContractRole::Pool) => AAVE_POOL.as_slice(),
        (Protocol::Chainlink, ContractRole::Oracle) => CHAINLINK_ORACLE.as_slice(),
        (Protocol::StakingRewards, ContractRole::Pool) => STAKING_POOL.as_slice(),
        (_, ContractRole::Token) => TOKEN.as_slice(),
        // Routers are reached through calldata, not their own events.
        _ => NONE.as_slice(),
    }
}

/// The default event filters installed at engine startup: one per
/// (contract, signature) pair the catalog expects to see.
#[must_use]
pub fn default_event_filters() -> Vec<EventFilter> {
    CONTRACTS
        .iter()
        .flat_map(|entry| {
            event_signatures(entry.protocol, entry.role)
                .iter()
                .map(|signature| EventFilter::new(entry.address, *signature))
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_addresses_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for entry in CONTRACTS {
            assert!(
                seen.insert(entry.address),
                "duplicate catalog address: {}",
                entry.label
            );
        }
    }

    #[test]
    fn classify_known_and_unknown() {
        let aave = address!("87870Bca3F3fD6335C3F4ce8392D69350B4fA4E2");
        assert_eq!(classify_contract(aave), Some(Protocol::AaveV3));
        assert_eq!(classify_contract(Address::ZERO), None);
    }

    #[test]
    fn default_filters_cover_every_emitting_contract() {
        let filters = default_event_filters();

        // Routers contribute nothing; everything else at least one filter.
        let emitting = CONTRACTS
            .iter()
            .filter(|e| !event_signatures(e.protocol, e.role).is_empty())
            .count();
        assert!(filters.len() >= emitting);

        // Aave pool contributes all five lending signatures.
        let aave = address!("87870Bca3F3fD6335C3F4ce8392D69350B4fA4E2");
        assert_eq!(filters.iter().filter(|f| f.contract == aave).count(), 5);
    }

    #[test]
    fn filter_ids_are_unique() {
        let filters = default_event_filters();
        let mut seen = std::collections::HashSet::new();
        for filter in &filters {
            assert!(seen.insert(filter.filter_id()));
        }
    }

    #[test]
    fn protocol_names_are_stable() {
        assert_eq!(Protocol::UniswapV2.name(), "uniswap_v2");
        assert_eq!(Protocol::AaveV3.name(), "aave_v3");
        assert_eq!(Protocol::StakingRewards.name(), "staking_rewards");
    }
}
