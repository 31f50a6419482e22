//! Domain model for the swap aggregation gateway.
//!
//! The key objects are `SwapRequest` (legacy single-chain EVM form),
//! `UniversalSwapRequest` (the gateway entry point carrying explicit
//! source/destination legs), `SwapQuote` (an executable transaction payload
//! from an on-chain aggregator), and `RouteQuote` (a multi-step cross-chain
//! route). Big-integer values cross the wire as base-10 decimal strings and
//! are held internally as `U256`.

use alloy::dyn_abi::TypedData;
use alloy::primitives::{Address, Bytes, U256};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::de::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::Display;
use std::str::FromStr;
use std::time::{SystemTime, SystemTimeError};

use crate::network::{ApprovalStrategy, Ecosystem, SwapType, TokenStandard};

/// A token amount in base units, carried as a base-10 decimal string on the
/// wire and as an unbounded-width `U256` internally.
///
/// Sell amounts routinely exceed 64 bits (a whole-token trade of an
/// 18-decimals asset is already 10^18), so the JSON representation is always
/// a string and parsing never round-trips through floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct TokenAmount(pub U256);

impl TokenAmount {
    pub const ZERO: TokenAmount = TokenAmount(U256::ZERO);

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        TokenAmount::from_str(&s).map_err(Error::custom)
    }
}

impl FromStr for TokenAmount {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("amount must be a base-10 unsigned integer, got {s:?}"));
        }
        U256::from_str_radix(trimmed, 10)
            .map(TokenAmount)
            .map_err(|e| format!("amount out of range: {e}"))
    }
}

impl From<U256> for TokenAmount {
    fn from(value: U256) -> Self {
        TokenAmount(value)
    }
}

impl From<u64> for TokenAmount {
    fn from(value: u64) -> Self {
        TokenAmount(U256::from(value))
    }
}

impl From<TokenAmount> for U256 {
    fn from(value: TokenAmount) -> Self {
        value.0
    }
}

impl Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Slippage tolerance, stored in basis points.
///
/// The wire format is a percentage number (`0.5` means 0.5% = 50 bps) for
/// compatibility with aggregator APIs; all internal math is integer
/// basis-points so minimum-output calculations never touch floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slippage(pub u32);

impl Slippage {
    /// Default tolerance used when a request leaves slippage unset: 1%.
    pub const DEFAULT: Slippage = Slippage(100);

    pub fn bps(&self) -> u32 {
        self.0
    }

    /// `amount · (10_000 − bps) / 10_000`, the minimum acceptable output.
    pub fn min_out(&self, amount: U256) -> U256 {
        let keep = U256::from(10_000u64.saturating_sub(u64::from(self.0)));
        amount * keep / U256::from(10_000u64)
    }

    fn as_percent(&self) -> Decimal {
        Decimal::new(i64::from(self.0), 2)
    }
}

impl Serialize for Slippage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // 50 bps serializes back as 0.5
        serializer.serialize_str(&self.as_percent().normalize().to_string())
    }
}

impl<'de> Deserialize<'de> for Slippage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = serde_json::Value::deserialize(deserializer)?;
        let percent = match &raw {
            serde_json::Value::Number(n) => Decimal::from_str(&n.to_string()),
            serde_json::Value::String(s) => Decimal::from_str(s),
            _ => return Err(Error::custom("slippage must be a number")),
        }
        .map_err(|e| Error::custom(format!("invalid slippage: {e}")))?;
        if percent.is_sign_negative() {
            return Err(Error::custom("slippage must not be negative"));
        }
        let bps = (percent * Decimal::from(100)).round();
        let bps = u32::try_from(bps.mantissa() / 10i128.pow(bps.scale()))
            .map_err(|_| Error::custom("slippage out of range"))?;
        if bps > 10_000 {
            return Err(Error::custom("slippage must not exceed 100%"));
        }
        Ok(Slippage(bps))
    }
}

/// A Unix timestamp in seconds, serialized as a JSON number.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Ord, Eq, Serialize, Deserialize)]
pub struct UnixTimestamp(pub u64);

impl UnixTimestamp {
    pub fn try_now() -> Result<Self, SystemTimeError> {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)?
            .as_secs();
        Ok(Self(now))
    }

    /// Current time, falling back to the epoch when the clock is unreadable.
    pub fn now_or_epoch() -> Self {
        Self::try_now().unwrap_or(Self(0))
    }
}

impl Display for UnixTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The conventional all-zeroes sentinel for an ecosystem's gas token.
pub const NATIVE_TOKEN_ZERO: &str = "0x0000000000000000000000000000000000000000";

/// The `0xEeee…eeEe` sentinel many aggregators use for the gas token.
pub const NATIVE_TOKEN_EEEE: &str = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee";

/// True when `token` names the ecosystem's native gas asset, recognising both
/// sentinel spellings case-insensitively.
pub fn is_native_token(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    lower == NATIVE_TOKEN_ZERO || lower == NATIVE_TOKEN_EEEE
}

/// True when an EVM address is a native-token sentinel.
pub fn is_native_address(token: &Address) -> bool {
    is_native_token(&format!("{token:#x}"))
}

/// One leg of a universal swap: the chain it runs on, the ecosystem that
/// chain belongs to, and the token standard of the asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainRef {
    /// Chain identifier in ecosystem-native form: a decimal chain id for EVM
    /// chains, a cluster name for Solana, an asset-chain symbol for native
    /// routers.
    pub chain: String,
    pub ecosystem: Ecosystem,
    pub standard: TokenStandard,
}

impl ChainRef {
    /// Numeric chain id, when the leg is EVM-like.
    pub fn evm_chain_id(&self) -> Option<u64> {
        if self.ecosystem.is_evm_like() {
            self.chain.parse().ok()
        } else {
            None
        }
    }
}

/// Legacy single-chain EVM swap request, the form on-chain aggregator
/// adapters consume directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
    pub chain_id: u64,
    pub sell_token: Address,
    pub buy_token: Address,
    pub sell_amount: TokenAmount,
    pub taker: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<Address>,
    #[serde(
        rename = "slippagePercentage",
        skip_serializing_if = "Option::is_none"
    )]
    pub slippage: Option<Slippage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_strategy: Option<ApprovalStrategy>,
}

impl SwapRequest {
    /// Funds land at `recipient` when given, otherwise back at the taker.
    pub fn effective_recipient(&self) -> Address {
        self.recipient.unwrap_or(self.taker)
    }

    pub fn slippage(&self) -> Slippage {
        self.slippage.unwrap_or(Slippage::DEFAULT)
    }

    /// Structural validation: distinct tokens, non-zero amount.
    pub fn validate(&self) -> Result<(), String> {
        if self.sell_token == self.buy_token {
            return Err("sellToken and buyToken must differ".to_string());
        }
        if self.sell_amount.is_zero() {
            return Err("sellAmount must be positive".to_string());
        }
        Ok(())
    }
}

/// The gateway entry form: explicit source/destination legs plus an optional
/// swap-type override that the classifier re-derives when inconsistent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniversalSwapRequest {
    pub sell_token: String,
    pub buy_token: String,
    pub sell_amount: TokenAmount,
    pub taker: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(
        rename = "slippagePercentage",
        skip_serializing_if = "Option::is_none"
    )]
    pub slippage: Option<Slippage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<u64>,
    pub source: ChainRef,
    pub destination: ChainRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_type: Option<SwapType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_strategy: Option<ApprovalStrategy>,
}

impl UniversalSwapRequest {
    /// Collapse to the legacy form when both legs sit on the same EVM chain.
    pub fn to_legacy(&self) -> Option<SwapRequest> {
        let source_chain = self.source.evm_chain_id()?;
        let destination_chain = self.destination.evm_chain_id()?;
        if source_chain != destination_chain {
            return None;
        }
        let sell_token = Address::from_str(&self.sell_token).ok()?;
        let buy_token = Address::from_str(&self.buy_token).ok()?;
        let taker = Address::from_str(&self.taker).ok()?;
        let recipient = match &self.recipient {
            Some(r) => Some(Address::from_str(r).ok()?),
            None => None,
        };
        Some(SwapRequest {
            chain_id: source_chain,
            sell_token,
            buy_token,
            sell_amount: self.sell_amount,
            taker,
            recipient,
            slippage: self.slippage,
            deadline: self.deadline,
            aggregator: self.aggregator.clone(),
            approval_strategy: self.approval_strategy,
        })
    }
}

/// A 32-byte hash as 0x-prefixed hex, validated on the way in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexHash(pub String);

static HASH_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{64}$").expect("valid hash regex"));

impl FromStr for HexHash {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if HASH_REGEX.is_match(s) {
            Ok(HexHash(s.to_string()))
        } else {
            Err(format!("not a 0x-prefixed 32-byte hash: {s:?}"))
        }
    }
}

impl Display for HexHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for HexHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for HexHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        HexHash::from_str(&s).map_err(Error::custom)
    }
}

/// EIP-712 typed-data bundle attached by Permit2-capable aggregators.
///
/// `eip712` carries the full `(types, domain, primaryType, message)` tuple;
/// the message structure is free-form and announced by `primaryType`, so it
/// is kept opaque and handed to the signer unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permit2Data {
    #[serde(rename = "type")]
    pub kind: String,
    pub hash: HexHash,
    pub eip712: TypedData,
}

/// An executable quote from an on-chain aggregator. `data`/`value` form the
/// transaction payload the aggregator expects to be broadcast from `taker`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapQuote {
    pub sell_token: Address,
    pub buy_token: Address,
    pub sell_amount: TokenAmount,
    pub buy_amount: TokenAmount,
    pub min_buy_amount: TokenAmount,
    pub to: Address,
    pub data: Bytes,
    pub value: TokenAmount,
    pub gas: Option<TokenAmount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<TokenAmount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<TokenAmount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<TokenAmount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowance_target: Option<Address>,
    pub aggregator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_impact: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_gas: Option<TokenAmount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permit2: Option<Permit2Data>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_strategy: Option<ApprovalStrategy>,
}

impl SwapQuote {
    /// Quote-shape invariant: the guaranteed minimum never exceeds the
    /// expected output.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_buy_amount > self.buy_amount {
            return Err(format!(
                "minBuyAmount {} exceeds buyAmount {}",
                self.min_buy_amount, self.buy_amount
            ));
        }
        Ok(())
    }
}

/// A step of a cross-chain route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStep {
    pub kind: StepKind,
    /// Chain identifier in ecosystem-native form.
    pub chain_id: String,
    /// Provider-specific step payload, kept opaque.
    pub details: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Swap,
    Bridge,
    Native,
}

/// Fee breakdown of a route, all in base units of the relevant assets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteFees {
    pub gas: TokenAmount,
    pub provider: TokenAmount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge: Option<TokenAmount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<TokenAmount>,
}

/// A ranked multi-step route from a meta-aggregator, Solana router, or
/// native-L1 router.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteQuote {
    pub steps: Vec<RouteStep>,
    pub total_estimated_out: TokenAmount,
    pub fees: RouteFees,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_impact: Option<f64>,
    /// Provider-reported confidence, clamped into [0.1, 1.0].
    pub confidence: f64,
}

impl RouteQuote {
    pub fn clamp_confidence(mut self) -> Self {
        self.confidence = self.confidence.clamp(0.1, 1.0);
        self
    }
}

/// Either shape a provider can answer with.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum QuoteResult {
    Legacy(SwapQuote),
    Route(RouteQuote),
}

/// Liveness summary for one provider adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    pub last_check: UnixTimestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_rate: Option<f64>,
}

impl ProviderHealth {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }

    /// The record a failed probe yields.
    pub fn failed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Unhealthy,
            latency_ms: None,
            last_check: UnixTimestamp::now_or_epoch(),
            error_rate: Some(1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Transaction payload as assembled by an aggregator's build step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxPayload {
    pub to: Address,
    pub data: Bytes,
    pub value: TokenAmount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<TokenAmount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<TokenAmount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<TokenAmount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<TokenAmount>,
}

/// Outcome of an executed (or attempted) swap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub execution_id: String,
    pub status: crate::network::ExecutionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_tx_hash: Option<String>,
    /// Amount actually received by the recipient, from receipt Transfer
    /// events; falls back to the quoted amount when no event matched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received_amount: Option<TokenAmount>,
    pub aggregator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A per-request signing secret. Held only for the duration of one call and
/// redacted from every Debug/Display rendering.
#[derive(Clone)]
pub struct SignerSecret(String);

impl SignerSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Expose the raw secret to the signing layer. Callers must not log it.
    pub fn reveal(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SignerSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignerSecret(<redacted>)")
    }
}

impl<'de> Deserialize<'de> for SignerSecret {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(SignerSecret(String::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_amount_parses_past_u64() {
        let amount = TokenAmount::from_str("340282366920938463463374607431768211456")
            .expect("parses 2^128");
        assert_eq!(amount.0, U256::from(1u8) << 128);
        assert_eq!(
            serde_json::to_string(&amount).expect("serialize"),
            "\"340282366920938463463374607431768211456\""
        );
    }

    #[test]
    fn token_amount_rejects_non_decimal() {
        assert!(TokenAmount::from_str("0x10").is_err());
        assert!(TokenAmount::from_str("-5").is_err());
        assert!(TokenAmount::from_str("1.5").is_err());
        assert!(TokenAmount::from_str("").is_err());
    }

    #[test]
    fn slippage_percent_to_bps() {
        let slippage: Slippage = serde_json::from_str("0.5").expect("deserialize");
        assert_eq!(slippage.bps(), 50);
        let slippage: Slippage = serde_json::from_str("\"1\"").expect("deserialize");
        assert_eq!(slippage.bps(), 100);
        assert!(serde_json::from_str::<Slippage>("101").is_err());
    }

    #[test]
    fn slippage_min_out_is_integer_math() {
        let out = Slippage(50).min_out(U256::from(1_000_000u64));
        assert_eq!(out, U256::from(995_000u64));
        // 0 bps keeps the full amount
        assert_eq!(
            Slippage(0).min_out(U256::from(7u64)),
            U256::from(7u64)
        );
    }

    #[test]
    fn native_sentinels_case_insensitive() {
        assert!(is_native_token("0x0000000000000000000000000000000000000000"));
        assert!(is_native_token("0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE"));
        assert!(!is_native_token("0x6B175474E89094C44Da98b954EedeAC495271d0F"));
    }

    #[test]
    fn universal_collapses_to_legacy_only_on_same_evm_chain() {
        let req = UniversalSwapRequest {
            sell_token: "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2".to_string(),
            buy_token: "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".to_string(),
            sell_amount: TokenAmount::from(100_000_000_000_000u64),
            taker: "0x70997970C51812dc3A010C7d01b50e0d17dc79C8".to_string(),
            recipient: None,
            slippage: None,
            deadline: None,
            source: ChainRef {
                chain: "1".to_string(),
                ecosystem: Ecosystem::Evm,
                standard: TokenStandard::Erc20,
            },
            destination: ChainRef {
                chain: "1".to_string(),
                ecosystem: Ecosystem::Evm,
                standard: TokenStandard::Erc20,
            },
            swap_type: None,
            aggregator: None,
            approval_strategy: None,
        };
        let legacy = req.to_legacy().expect("same chain collapses");
        assert_eq!(legacy.chain_id, 1);
        assert_eq!(legacy.effective_recipient(), legacy.taker);

        let mut cross = req;
        cross.destination.chain = "137".to_string();
        assert!(cross.to_legacy().is_none());
    }

    #[test]
    fn quote_invariant_rejects_inverted_min() {
        let quote = SwapQuote {
            sell_token: Address::ZERO,
            buy_token: Address::repeat_byte(1),
            sell_amount: TokenAmount::from(10u64),
            buy_amount: TokenAmount::from(90u64),
            min_buy_amount: TokenAmount::from(100u64),
            to: Address::ZERO,
            data: Bytes::new(),
            value: TokenAmount::ZERO,
            gas: None,
            gas_price: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            allowance_target: None,
            aggregator: "0x".to_string(),
            price_impact: None,
            estimated_gas: None,
            permit2: None,
            approval_strategy: None,
        };
        assert!(quote.validate().is_err());
    }

    #[test]
    fn hex_hash_is_validated() {
        assert!(HexHash::from_str(&format!("0x{}", "ab".repeat(32))).is_ok());
        assert!(HexHash::from_str("0x1234").is_err());
        assert!(HexHash::from_str(&"ab".repeat(32)).is_err());
    }

    #[test]
    fn signer_secret_redacts_debug() {
        let secret = SignerSecret::new("0xdeadbeef");
        assert_eq!(format!("{secret:?}"), "SignerSecret(<redacted>)");
    }
}
