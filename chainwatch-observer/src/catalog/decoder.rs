//! Signature-table log decoding and selector-table calldata decoding.
//!
//! The decoder is a compiled lookup keyed by topic0 (for logs) and by
//! 4-byte selector (for calldata) - no runtime ABI parsing. Unknown
//! signatures degrade gracefully: the caller still emits the event, just
//! without decoded fields, and the miss is logged once per distinct
//! signature.
//!
//! Decoded integers stay arbitrary-precision; addresses re-encode as
//! canonical lowercase hex when serialized.

use std::collections::BTreeMap;

use alloy::primitives::{Address, B256, Bytes, FixedBytes, I256, U256, Uint};
use alloy::sol_types::{SolCall, SolEvent};
use dashmap::DashMap;
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::warn;

use super::abi;
use super::{Protocol, classify_contract};

// ═══════════════════════════════════════════════════════════════════════════════
// DECODED VALUES
// ═══════════════════════════════════════════════════════════════════════════════

/// One decoded parameter value.
///
/// Serialization is canonical: addresses as lowercase hex, unsigned and
/// signed integers as decimal strings (arbitrary precision preserved),
/// bytes as hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedValue {
    /// 20-byte address.
    Address(Address),
    /// Unsigned integer up to 256 bits.
    Uint(U256),
    /// Signed integer up to 256 bits.
    Int(I256),
    /// Boolean flag.
    Bool(bool),
    /// Raw byte payload.
    Bytes(Bytes),
    /// Homogeneous array (e.g. a swap path).
    Array(Vec<DecodedValue>),
}

impl Serialize for DecodedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Address(a) => serializer.serialize_str(&eth_rpc::canonical_address(a)),
            Self::Uint(u) => serializer.serialize_str(&u.to_string()),
            Self::Int(i) => serializer.serialize_str(&i.to_string()),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Bytes(b) => serializer.serialize_str(&format!("0x{}", hex::encode(b))),
            Self::Array(items) => items.serialize(serializer),
        }
    }
}

/// Decoded parameters keyed by their Solidity names.
pub type DecodedFields = BTreeMap<String, DecodedValue>;

/// A successfully decoded log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLog {
    /// Human event name from the signature table.
    pub event_name: &'static str,
    /// Protocol of the emitting contract, when the address is cataloged.
    pub protocol: Option<Protocol>,
    /// Decoded parameters.
    pub fields: DecodedFields,
}

/// A successfully decoded calldata payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCall {
    /// Human method name from the selector table.
    pub method_name: &'static str,
    /// Protocol of the called contract, when cataloged.
    pub protocol: Option<Protocol>,
    /// Decoded arguments.
    pub args: DecodedFields,
}

/// Decoder failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// topic0 is not in the signature table.
    #[error("unknown event signature: {0}")]
    UnknownSignature(B256),

    /// The 4-byte selector is not in the selector table.
    #[error("unknown method selector: {0}")]
    UnknownSelector(FixedBytes<4>),

    /// The log carries no topics at all.
    #[error("log has no topics")]
    MissingTopic0,

    /// Calldata shorter than a selector.
    #[error("calldata shorter than 4 bytes")]
    TruncatedCalldata,

    /// The signature matched but the payload did not decode.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALUE HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

fn addr(a: Address) -> DecodedValue {
    DecodedValue::Address(a)
}

fn uint<T>(u: T) -> DecodedValue
where
    U256: TryFrom<T>,
    <U256 as TryFrom<T>>::Error: std::fmt::Debug,
{
    DecodedValue::Uint(U256::try_from(u).expect("primitive uint always fits in U256"))
}

/// Widen a narrower ruint (uint112, uint160, ...) to 256 bits.
fn widen<const BITS: usize, const LIMBS: usize>(v: Uint<BITS, LIMBS>) -> DecodedValue {
    DecodedValue::Uint(U256::from_limbs_slice(v.as_limbs()))
}

/// Lift a narrower signed value (int24, ...) to 256 bits via its decimal
/// rendering; the parse cannot fail for an in-range source.
fn narrow_int(v: impl std::fmt::Display) -> DecodedValue {
    DecodedValue::Int(v.to_string().parse::<I256>().unwrap_or(I256::ZERO))
}

fn fields<const N: usize>(pairs: [(&str, DecodedValue); N]) -> DecodedFields {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOG DECODER
// ═══════════════════════════════════════════════════════════════════════════════

/// Stateless decoder over the compiled signature and selector tables.
///
/// The only interior state is observability: a per-signature dedup set so
/// each unknown signature is logged exactly once.
#[derive(Debug, Default)]
pub struct LogDecoder {
    seen_unknown_signatures: DashMap<B256, ()>,
    seen_unknown_selectors: DashMap<FixedBytes<4>, ()>,
}

impl LogDecoder {
    /// Create a decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The human name for a signature hash, when known.
    #[must_use]
    pub fn event_name(topic0: &B256) -> Option<&'static str> {
        Some(match *topic0 {
            t if t == abi::erc20::Transfer::SIGNATURE_HASH => "Transfer",
            t if t == abi::erc20::Approval::SIGNATURE_HASH => "Approval",
            t if t == abi::uniswap_v2::Swap::SIGNATURE_HASH => "Swap",
            t if t == abi::uniswap_v2::Mint::SIGNATURE_HASH => "Mint",
            t if t == abi::uniswap_v2::Burn::SIGNATURE_HASH => "Burn",
            t if t == abi::uniswap_v2::Sync::SIGNATURE_HASH => "Sync",
            t if t == abi::uniswap_v3::Swap::SIGNATURE_HASH => "Swap",
            t if t == abi::uniswap_v3::Mint::SIGNATURE_HASH => "Mint",
            t if t == abi::uniswap_v3::Burn::SIGNATURE_HASH => "Burn",
            t if t == abi::aave_v3::Supply::SIGNATURE_HASH => "Supply",
            t if t == abi::aave_v3::Withdraw::SIGNATURE_HASH => "Withdraw",
            t if t == abi::aave_v3::Borrow::SIGNATURE_HASH => "Borrow",
            t if t == abi::aave_v3::Repay::SIGNATURE_HASH => "Repay",
            t if t == abi::aave_v3::LiquidationCall::SIGNATURE_HASH => "LiquidationCall",
            t if t == abi::chainlink::AnswerUpdated::SIGNATURE_HASH => "AnswerUpdated",
            t if t == abi::chainlink::NewRound::SIGNATURE_HASH => "NewRound",
            t if t == abi::staking::Staked::SIGNATURE_HASH => "Staked",
            t if t == abi::staking::Withdrawn::SIGNATURE_HASH => "Withdrawn",
            t if t == abi::staking::RewardPaid::SIGNATURE_HASH => "RewardPaid",
            _ => return None,
        })
    }

    /// Decode a raw log against the signature table.
    ///
    /// # Errors
    ///
    /// [`DecodeError::UnknownSignature`] when topic0 is not in the table
    /// (logged once per distinct signature), [`DecodeError::MissingTopic0`]
    /// for topic-less logs, [`DecodeError::Malformed`] when a known
    /// signature fails to decode.
    #[allow(clippy::too_many_lines)] // One match arm per catalog event.
    pub fn decode_log(&self, log: &eth_rpc::Log) -> Result<DecodedLog, DecodeError> {
        let Some(topic0) = log.topic0().copied() else {
            return Err(DecodeError::MissingTopic0);
        };
        let protocol = classify_contract(log.address);

        let (event_name, decoded_fields) = match topic0 {
            // ─── ERC-20 ────────────────────────────────────────────────────────
            t if t == abi::erc20::Transfer::SIGNATURE_HASH => {
                let e = decode_event::<abi::erc20::Transfer>(log)?;
                (
                    "Transfer",
                    fields([
                        ("from", addr(e.from)),
                        ("to", addr(e.to)),
                        ("value", uint(e.value)),
                    ]),
                )
            }
            t if t == abi::erc20::Approval::SIGNATURE_HASH => {
                let e = decode_event::<abi::erc20::Approval>(log)?;
                (
                    "Approval",
                    fields([
                        ("owner", addr(e.owner)),
                        ("spender", addr(e.spender)),
                        ("value", uint(e.value)),
                    ]),
                )
            }

            // ─── Uniswap V2 ────────────────────────────────────────────────────
            t if t == abi::uniswap_v2::Swap::SIGNATURE_HASH => {
                let e = decode_event::<abi::uniswap_v2::Swap>(log)?;
                (
                    "Swap",
                    fields([
                        ("sender", addr(e.sender)),
                        ("amount0In", uint(e.amount0In)),
                        ("amount1In", uint(e.amount1In)),
                        ("amount0Out", uint(e.amount0Out)),
                        ("amount1Out", uint(e.amount1Out)),
                        ("to", addr(e.to)),
                    ]),
                )
            }
            t if t == abi::uniswap_v2::Mint::SIGNATURE_HASH => {
                let e = decode_event::<abi::uniswap_v2::Mint>(log)?;
                (
                    "Mint",
                    fields([
                        ("sender", addr(e.sender)),
                        ("amount0", uint(e.amount0)),
                        ("amount1", uint(e.amount1)),
                    ]),
                )
            }
            t if t == abi::uniswap_v2::Burn::SIGNATURE_HASH => {
                let e = decode_event::<abi::uniswap_v2::Burn>(log)?;
                (
                    "Burn",
                    fields([
                        ("sender", addr(e.sender)),
                        ("amount0", uint(e.amount0)),
                        ("amount1", uint(e.amount1)),
                        ("to", addr(e.to)),
                    ]),
                )
            }
            t if t == abi::uniswap_v2::Sync::SIGNATURE_HASH => {
                let e = decode_event::<abi::uniswap_v2::Sync>(log)?;
                (
                    "Sync",
                    fields([
                        ("reserve0", widen(e.reserve0)),
                        ("reserve1", widen(e.reserve1)),
                    ]),
                )
            }

            // ─── Uniswap V3 ────────────────────────────────────────────────────
            t if t == abi::uniswap_v3::Swap::SIGNATURE_HASH => {
                let e = decode_event::<abi::uniswap_v3::Swap>(log)?;
                (
                    "Swap",
                    fields([
                        ("sender", addr(e.sender)),
                        ("recipient", addr(e.recipient)),
                        ("amount0", DecodedValue::Int(e.amount0)),
                        ("amount1", DecodedValue::Int(e.amount1)),
                        ("sqrtPriceX96", widen(e.sqrtPriceX96)),
                        ("liquidity", uint(e.liquidity)),
                        ("tick", narrow_int(e.tick)),
                    ]),
                )
            }
            t if t == abi::uniswap_v3::Mint::SIGNATURE_HASH => {
                let e = decode_event::<abi::uniswap_v3::Mint>(log)?;
                (
                    "Mint",
                    fields([
                        ("sender", addr(e.sender)),
                        ("owner", addr(e.owner)),
                        ("tickLower", narrow_int(e.tickLower)),
                        ("tickUpper", narrow_int(e.tickUpper)),
                        ("amount", uint(e.amount)),
                        ("amount0", uint(e.amount0)),
                        ("amount1", uint(e.amount1)),
                    ]),
                )
            }
            t if t == abi::uniswap_v3::Burn::SIGNATURE_HASH => {
                let e = decode_event::<abi::uniswap_v3::Burn>(log)?;
                (
                    "Burn",
                    fields([
                        ("owner", addr(e.owner)),
                        ("tickLower", narrow_int(e.tickLower)),
                        ("tickUpper", narrow_int(e.tickUpper)),
                        ("amount", uint(e.amount)),
                        ("amount0", uint(e.amount0)),
                        ("amount1", uint(e.amount1)),
                    ]),
                )
            }

            // ─── Aave V3 ───────────────────────────────────────────────────────
            t if t == abi::aave_v3::Supply::SIGNATURE_HASH => {
                let e = decode_event::<abi::aave_v3::Supply>(log)?;
                (
                    "Supply",
                    fields([
                        ("reserve", addr(e.reserve)),
                        ("user", addr(e.user)),
                        ("onBehalfOf", addr(e.onBehalfOf)),
                        ("amount", uint(e.amount)),
                        ("referralCode", uint(e.referralCode)),
                    ]),
                )
            }
            t if t == abi::aave_v3::Withdraw::SIGNATURE_HASH => {
                let e = decode_event::<abi::aave_v3::Withdraw>(log)?;
                (
                    "Withdraw",
                    fields([
                        ("reserve", addr(e.reserve)),
                        ("user", addr(e.user)),
                        ("to", addr(e.to)),
                        ("amount", uint(e.amount)),
                    ]),
                )
            }
            t if t == abi::aave_v3::Borrow::SIGNATURE_HASH => {
                let e = decode_event::<abi::aave_v3::Borrow>(log)?;
                (
                    "Borrow",
                    fields([
                        ("reserve", addr(e.reserve)),
                        ("user", addr(e.user)),
                        ("onBehalfOf", addr(e.onBehalfOf)),
                        ("amount", uint(e.amount)),
                        ("interestRateMode", uint(e.interestRateMode)),
                        ("borrowRate", uint(e.borrowRate)),
                        ("referralCode", uint(e.referralCode)),
                    ]),
                )
            }
            t if t == abi::aave_v3::Repay::SIGNATURE_HASH => {
                let e = decode_event::<abi::aave_v3::Repay>(log)?;
                (
                    "Repay",
                    fields([
                        ("reserve", addr(e.reserve)),
                        ("user", addr(e.user)),
                        ("repayer", addr(e.repayer)),
                        ("amount", uint(e.amount)),
                        ("useATokens", DecodedValue::Bool(e.useATokens)),
                    ]),
                )
            }
            t if t == abi::aave_v3::LiquidationCall::SIGNATURE_HASH => {
                let e = decode_event::<abi::aave_v3::LiquidationCall>(log)?;
                (
                    "LiquidationCall",
                    fields([
                        ("collateralAsset", addr(e.collateralAsset)),
                        ("debtAsset", addr(e.debtAsset)),
                        ("user", addr(e.user)),
                        ("debtToCover", uint(e.debtToCover)),
                        (
                            "liquidatedCollateralAmount",
                            uint(e.liquidatedCollateralAmount),
                        ),
                        ("liquidator", addr(e.liquidator)),
                        ("receiveAToken", DecodedValue::Bool(e.receiveAToken)),
                    ]),
                )
            }

            // ─── Chainlink ─────────────────────────────────────────────────────
            t if t == abi::chainlink::AnswerUpdated::SIGNATURE_HASH => {
                let e = decode_event::<abi::chainlink::AnswerUpdated>(log)?;
                (
                    "AnswerUpdated",
                    fields([
                        ("current", DecodedValue::Int(e.current)),
                        ("roundId", uint(e.roundId)),
                        ("updatedAt", uint(e.updatedAt)),
                    ]),
                )
            }
            t if t == abi::chainlink::NewRound::SIGNATURE_HASH => {
                let e = decode_event::<abi::chainlink::NewRound>(log)?;
                (
                    "NewRound",
                    fields([
                        ("roundId", uint(e.roundId)),
                        ("startedBy", addr(e.startedBy)),
                        ("startedAt", uint(e.startedAt)),
                    ]),
                )
            }

            // ─── StakingRewards ────────────────────────────────────────────────
            t if t == abi::staking::Staked::SIGNATURE_HASH => {
                let e = decode_event::<abi::staking::Staked>(log)?;
                (
                    "Staked",
                    fields([("user", addr(e.user)), ("amount", uint(e.amount))]),
                )
            }
            t if t == abi::staking::Withdrawn::SIGNATURE_HASH => {
                let e = decode_event::<abi::staking::Withdrawn>(log)?;
                (
                    "Withdrawn",
                    fields([("user", addr(e.user)), ("amount", uint(e.amount))]),
                )
            }
            t if t == abi::staking::RewardPaid::SIGNATURE_HASH => {
                let e = decode_event::<abi::staking::RewardPaid>(log)?;
                (
                    "RewardPaid",
                    fields([("user", addr(e.user)), ("reward", uint(e.reward))]),
                )
            }

            _ => {
                if self.seen_unknown_signatures.insert(topic0, ()).is_none() {
                    warn!(
                        topic0 = %eth_rpc::canonical_hash(&topic0),
                        contract = %eth_rpc::canonical_address(&log.address),
                        "Unknown event signature"
                    );
                }
                return Err(DecodeError::UnknownSignature(topic0));
            }
        };

        Ok(DecodedLog {
            event_name,
            protocol,
            fields: decoded_fields,
        })
    }

    /// Decode transaction calldata against the selector table.
    ///
    /// # Errors
    ///
    /// [`DecodeError::UnknownSelector`] when the 4-byte prefix is not in
    /// the table (logged once per distinct selector),
    /// [`DecodeError::TruncatedCalldata`] for inputs under 4 bytes,
    /// [`DecodeError::Malformed`] when argument decoding fails.
    #[allow(clippy::too_many_lines)] // One match arm per catalog method.
    pub fn decode_calldata(
        &self,
        input: &[u8],
        contract: Address,
    ) -> Result<DecodedCall, DecodeError> {
        if input.len() < 4 {
            return Err(DecodeError::TruncatedCalldata);
        }
        let selector: [u8; 4] = [input[0], input[1], input[2], input[3]];
        let protocol = classify_contract(contract);

        let (method_name, args) = match selector {
            // ─── ERC-20 ────────────────────────────────────────────────────────
            s if s == abi::erc20::transferCall::SELECTOR => {
                let c = decode_call::<abi::erc20::transferCall>(input)?;
                (
                    "transfer",
                    fields([("to", addr(c.to)), ("amount", uint(c.amount))]),
                )
            }
            s if s == abi::erc20::transferFromCall::SELECTOR => {
                let c = decode_call::<abi::erc20::transferFromCall>(input)?;
                (
                    "transferFrom",
                    fields([
                        ("from", addr(c.from)),
                        ("to", addr(c.to)),
                        ("amount", uint(c.amount)),
                    ]),
                )
            }
            s if s == abi::erc20::approveCall::SELECTOR => {
                let c = decode_call::<abi::erc20::approveCall>(input)?;
                (
                    "approve",
                    fields([("spender", addr(c.spender)), ("amount", uint(c.amount))]),
                )
            }

            // ─── Uniswap V2 router ─────────────────────────────────────────────
            s if s == abi::uniswap_v2::swapExactTokensForTokensCall::SELECTOR => {
                let c = decode_call::<abi::uniswap_v2::swapExactTokensForTokensCall>(input)?;
                (
                    "swapExactTokensForTokens",
                    fields([
                        ("amountIn", uint(c.amountIn)),
                        ("amountOutMin", uint(c.amountOutMin)),
                        ("path", path_value(&c.path)),
                        ("to", addr(c.to)),
                        ("deadline", uint(c.deadline)),
                    ]),
                )
            }
            s if s == abi::uniswap_v2::swapExactETHForTokensCall::SELECTOR => {
                let c = decode_call::<abi::uniswap_v2::swapExactETHForTokensCall>(input)?;
                (
                    "swapExactETHForTokens",
                    fields([
                        ("amountOutMin", uint(c.amountOutMin)),
                        ("path", path_value(&c.path)),
                        ("to", addr(c.to)),
                        ("deadline", uint(c.deadline)),
                    ]),
                )
            }
            s if s == abi::uniswap_v2::swapExactTokensForETHCall::SELECTOR => {
                let c = decode_call::<abi::uniswap_v2::swapExactTokensForETHCall>(input)?;
                (
                    "swapExactTokensForETH",
                    fields([
                        ("amountIn", uint(c.amountIn)),
                        ("amountOutMin", uint(c.amountOutMin)),
                        ("path", path_value(&c.path)),
                        ("to", addr(c.to)),
                        ("deadline", uint(c.deadline)),
                    ]),
                )
            }
            s if s == abi::uniswap_v2::addLiquidityCall::SELECTOR => {
                let c = decode_call::<abi::uniswap_v2::addLiquidityCall>(input)?;
                (
                    "addLiquidity",
                    fields([
                        ("tokenA", addr(c.tokenA)),
                        ("tokenB", addr(c.tokenB)),
                        ("amountADesired", uint(c.amountADesired)),
                        ("amountBDesired", uint(c.amountBDesired)),
                        ("to", addr(c.to)),
                    ]),
                )
            }
            s if s == abi::uniswap_v2::removeLiquidityCall::SELECTOR => {
                let c = decode_call::<abi::uniswap_v2::removeLiquidityCall>(input)?;
                (
                    "removeLiquidity",
                    fields([
                        ("tokenA", addr(c.tokenA)),
                        ("tokenB", addr(c.tokenB)),
                        ("liquidity", uint(c.liquidity)),
                        ("to", addr(c.to)),
                    ]),
                )
            }

            // ─── Aave V3 pool ──────────────────────────────────────────────────
            s if s == abi::aave_v3::supplyCall::SELECTOR => {
                let c = decode_call::<abi::aave_v3::supplyCall>(input)?;
                (
                    "supply",
                    fields([
                        ("asset", addr(c.asset)),
                        ("amount", uint(c.amount)),
                        ("onBehalfOf", addr(c.onBehalfOf)),
                        ("referralCode", uint(c.referralCode)),
                    ]),
                )
            }
            s if s == abi::aave_v3::withdrawCall::SELECTOR => {
                let c = decode_call::<abi::aave_v3::withdrawCall>(input)?;
                (
                    "withdraw",
                    fields([
                        ("asset", addr(c.asset)),
                        ("amount", uint(c.amount)),
                        ("to", addr(c.to)),
                    ]),
                )
            }
            s if s == abi::aave_v3::borrowCall::SELECTOR => {
                let c = decode_call::<abi::aave_v3::borrowCall>(input)?;
                (
                    "borrow",
                    fields([
                        ("asset", addr(c.asset)),
                        ("amount", uint(c.amount)),
                        ("interestRateMode", uint(c.interestRateMode)),
                        ("referralCode", uint(c.referralCode)),
                        ("onBehalfOf", addr(c.onBehalfOf)),
                    ]),
                )
            }
            s if s == abi::aave_v3::repayCall::SELECTOR => {
                let c = decode_call::<abi::aave_v3::repayCall>(input)?;
                (
                    "repay",
                    fields([
                        ("asset", addr(c.asset)),
                        ("amount", uint(c.amount)),
                        ("interestRateMode", uint(c.interestRateMode)),
                        ("onBehalfOf", addr(c.onBehalfOf)),
                    ]),
                )
            }

            // ─── StakingRewards ────────────────────────────────────────────────
            s if s == abi::staking::stakeCall::SELECTOR => {
                let c = decode_call::<abi::staking::stakeCall>(input)?;
                ("stake", fields([("amount", uint(c.amount))]))
            }
            s if s == abi::staking::withdrawCall::SELECTOR => {
                let c = decode_call::<abi::staking::withdrawCall>(input)?;
                ("withdraw", fields([("amount", uint(c.amount))]))
            }
            s if s == abi::staking::exitCall::SELECTOR => ("exit", DecodedFields::new()),
            s if s == abi::staking::getRewardCall::SELECTOR => ("getReward", DecodedFields::new()),

            _ => {
                let selector = FixedBytes::<4>::from(selector);
                if self.seen_unknown_selectors.insert(selector, ()).is_none() {
                    warn!(
                        selector = %selector,
                        contract = %eth_rpc::canonical_address(&contract),
                        "Unknown method selector"
                    );
                }
                return Err(DecodeError::UnknownSelector(selector));
            }
        };

        Ok(DecodedCall {
            method_name,
            protocol,
            args,
        })
    }
}

/// Decode one event type from a raw log.
fn decode_event<E: SolEvent>(log: &eth_rpc::Log) -> Result<E, DecodeError> {
    E::decode_raw_log(log.topics.iter().copied(), &log.data)
        .map_err(|e| DecodeError::Malformed(e.to_string()))
}

/// Decode one call type from calldata (selector included).
fn decode_call<C: SolCall>(input: &[u8]) -> Result<C, DecodeError> {
    C::abi_decode(input).map_err(|e| DecodeError::Malformed(e.to_string()))
}

fn path_value(path: &[Address]) -> DecodedValue {
    DecodedValue::Array(path.iter().copied().map(DecodedValue::Address).collect())
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, b256};
    use alloy::sol_types::SolValue;

    /// Build a raw log carrying an ERC-20 Transfer.
    fn transfer_log(contract: Address, from: Address, to: Address, value: U256) -> eth_rpc::Log {
        eth_rpc::Log {
            address: contract,
            topics: vec![
                abi::erc20::Transfer::SIGNATURE_HASH,
                B256::left_padding_from(from.as_slice()),
                B256::left_padding_from(to.as_slice()),
            ],
            data: Bytes::from(value.abi_encode()),
            block_number: Some(1_000),
            block_hash: Some(b256!(
                "00000000000000000000000000000000000000000000000000000000000000aa"
            )),
            transaction_hash: Some(b256!(
                "00000000000000000000000000000000000000000000000000000000000000bb"
            )),
            transaction_index: Some(0),
            log_index: Some(0),
            removed: false,
        }
    }

    #[test]
    fn decodes_transfer_with_canonical_fields() {
        let weth = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
        let from = address!("a7d9ddbe1f17865597fbd27ec712455208b6b76d");
        let to = address!("f02c1c8e6114b1dbe8937a39260b5b0a374432bb");
        let value = U256::from(1_000_000_000_000_000_000_u64);

        let decoder = LogDecoder::new();
        let decoded = decoder
            .decode_log(&transfer_log(weth, from, to, value))
            .expect("decode");

        assert_eq!(decoded.event_name, "Transfer");
        assert_eq!(decoded.protocol, Some(Protocol::Erc20));
        assert_eq!(decoded.fields["from"], DecodedValue::Address(from));
        assert_eq!(decoded.fields["value"], DecodedValue::Uint(value));

        // Canonical serialization: lowercase hex addresses, decimal uints.
        let json = serde_json::to_value(&decoded.fields).expect("serialize");
        assert_eq!(json["from"], "0xa7d9ddbe1f17865597fbd27ec712455208b6b76d");
        assert_eq!(json["value"], "1000000000000000000");
    }

    #[test]
    fn unknown_signature_is_an_error() {
        let mut log = transfer_log(Address::ZERO, Address::ZERO, Address::ZERO, U256::ZERO);
        log.topics[0] =
            b256!("1111111111111111111111111111111111111111111111111111111111111111");

        let decoder = LogDecoder::new();
        assert!(matches!(
            decoder.decode_log(&log),
            Err(DecodeError::UnknownSignature(_))
        ));
        // The miss set records it exactly once.
        assert_eq!(decoder.seen_unknown_signatures.len(), 1);
        let _ = decoder.decode_log(&log);
        assert_eq!(decoder.seen_unknown_signatures.len(), 1);
    }

    #[test]
    fn topicless_log_is_rejected() {
        let mut log = transfer_log(Address::ZERO, Address::ZERO, Address::ZERO, U256::ZERO);
        log.topics.clear();

        let decoder = LogDecoder::new();
        assert!(matches!(
            decoder.decode_log(&log),
            Err(DecodeError::MissingTopic0)
        ));
    }

    #[test]
    fn event_name_lookup_matches_decoder() {
        assert_eq!(
            LogDecoder::event_name(&abi::aave_v3::Supply::SIGNATURE_HASH),
            Some("Supply")
        );
        assert_eq!(LogDecoder::event_name(&B256::ZERO), None);
    }

    #[test]
    fn decodes_erc20_transfer_calldata() {
        let to = address!("f02c1c8e6114b1dbe8937a39260b5b0a374432bb");
        let call = abi::erc20::transferCall {
            to,
            amount: U256::from(5u64),
        };
        let input = call.abi_encode();

        let decoder = LogDecoder::new();
        let decoded = decoder
            .decode_calldata(&input, address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"))
            .expect("decode");

        assert_eq!(decoded.method_name, "transfer");
        assert_eq!(decoded.protocol, Some(Protocol::Erc20));
        assert_eq!(decoded.args["to"], DecodedValue::Address(to));
    }

    #[test]
    fn decodes_swap_path_as_array() {
        let weth = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
        let usdc = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
        let call = abi::uniswap_v2::swapExactTokensForTokensCall {
            amountIn: U256::from(1_000u64),
            amountOutMin: U256::from(990u64),
            path: vec![weth, usdc],
            to: Address::ZERO,
            deadline: U256::from(1_700_000_000u64),
        };
        let input = call.abi_encode();

        let decoder = LogDecoder::new();
        let decoded = decoder
            .decode_calldata(
                &input,
                address!("7a250d5630B4cF539739dF2C5dAcb4c659F2488D"),
            )
            .expect("decode");

        assert_eq!(decoded.method_name, "swapExactTokensForTokens");
        assert_eq!(decoded.protocol, Some(Protocol::UniswapV2));
        let DecodedValue::Array(path) = &decoded.args["path"] else {
            panic!("path should decode as an array");
        };
        assert_eq!(path.len(), 2);
    }

    #[test]
    fn unknown_selector_is_an_error() {
        let decoder = LogDecoder::new();
        let err = decoder
            .decode_calldata(&[0xde, 0xad, 0xbe, 0xef, 0x00], Address::ZERO)
            .expect_err("should fail");
        assert!(matches!(err, DecodeError::UnknownSelector(_)));
    }

    #[test]
    fn truncated_calldata_is_an_error() {
        let decoder = LogDecoder::new();
        assert!(matches!(
            decoder.decode_calldata(&[0xde, 0xad], Address::ZERO),
            Err(DecodeError::TruncatedCalldata)
        ));
    }

    #[test]
    fn decodes_aave_supply_log() {
        let pool = address!("87870Bca3F3fD6335C3F4ce8392D69350B4fA4E2");
        let reserve = address!("6B175474E89094C44Da98b954EedeAC495271d0F");
        let user = address!("a7d9ddbe1f17865597fbd27ec712455208b6b76d");

        // Supply(address indexed reserve, address user, address indexed onBehalfOf,
        //        uint256 amount, uint16 indexed referralCode)
        let log = eth_rpc::Log {
            address: pool,
            topics: vec![
                abi::aave_v3::Supply::SIGNATURE_HASH,
                B256::left_padding_from(reserve.as_slice()),
                B256::left_padding_from(user.as_slice()),
                B256::from(U256::from(0u64)),
            ],
            data: Bytes::from((user, U256::from(42u64)).abi_encode()),
            block_number: Some(1_000),
            block_hash: None,
            transaction_hash: None,
            transaction_index: None,
            log_index: Some(1),
            removed: false,
        };

        let decoder = LogDecoder::new();
        let decoded = decoder.decode_log(&log).expect("decode");
        assert_eq!(decoded.event_name, "Supply");
        assert_eq!(decoded.protocol, Some(Protocol::AaveV3));
        assert_eq!(decoded.fields["amount"], DecodedValue::Uint(U256::from(42u64)));
    }
}
