//! Ecosystem and swap taxonomy.
//!
//! This module defines the closed enumerations the routing layer dispatches
//! on: blockchain ecosystems, swap kinds, token standards, approval
//! strategies, provider categories, and execution states. It also carries the
//! EVM chain-tier tables used by swap-type inference and the Permit2
//! deployment set.

use alloy::primitives::{Address, address};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Display;

/// A blockchain ecosystem a swap leg can live on.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Evm,
    Solana,
    Cosmos,
    Bitcoin,
    Substrate,
    Near,
    Terra,
    Avalanche,
    Thorchain,
    Maya,
}

impl Ecosystem {
    /// Return all known [`Ecosystem`] variants.
    pub fn variants() -> &'static [Ecosystem] {
        &[
            Ecosystem::Evm,
            Ecosystem::Solana,
            Ecosystem::Cosmos,
            Ecosystem::Bitcoin,
            Ecosystem::Substrate,
            Ecosystem::Near,
            Ecosystem::Terra,
            Ecosystem::Avalanche,
            Ecosystem::Thorchain,
            Ecosystem::Maya,
        ]
    }

    /// True for ecosystems whose addresses and transactions follow EVM rules.
    pub fn is_evm_like(&self) -> bool {
        matches!(self, Ecosystem::Evm | Ecosystem::Avalanche)
    }

    /// Ecosystems that settle through native-asset routers (THORChain-style
    /// memo deposits) rather than contract calls.
    pub fn is_native_settled(&self) -> bool {
        matches!(
            self,
            Ecosystem::Bitcoin | Ecosystem::Thorchain | Ecosystem::Maya | Ecosystem::Cosmos
        )
    }
}

impl Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Ecosystem::Evm => "evm",
            Ecosystem::Solana => "solana",
            Ecosystem::Cosmos => "cosmos",
            Ecosystem::Bitcoin => "bitcoin",
            Ecosystem::Substrate => "substrate",
            Ecosystem::Near => "near",
            Ecosystem::Terra => "terra",
            Ecosystem::Avalanche => "avalanche",
            Ecosystem::Thorchain => "thorchain",
            Ecosystem::Maya => "maya",
        };
        write!(f, "{}", s)
    }
}

/// The kind of swap a request resolves to, inferred from its two legs.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapType {
    #[serde(rename = "on-chain")]
    OnChain,
    #[serde(rename = "cross-chain")]
    CrossChain,
    #[serde(rename = "l1-to-l2")]
    L1ToL2,
    #[serde(rename = "l2-to-l1")]
    L2ToL1,
    #[serde(rename = "l2-to-l2")]
    L2ToL2,
    #[serde(rename = "native-swap")]
    NativeSwap,
}

impl Display for SwapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SwapType::OnChain => "on-chain",
            SwapType::CrossChain => "cross-chain",
            SwapType::L1ToL2 => "l1-to-l2",
            SwapType::L2ToL1 => "l2-to-l1",
            SwapType::L2ToL2 => "l2-to-l2",
            SwapType::NativeSwap => "native-swap",
        };
        write!(f, "{}", s)
    }
}

/// Token representation standard on a given leg.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStandard {
    #[serde(rename = "native")]
    Native,
    #[serde(rename = "erc20")]
    Erc20,
    #[serde(rename = "spl")]
    Spl,
    #[serde(rename = "bep20")]
    Bep20,
    #[serde(rename = "cosmos-native")]
    CosmosNative,
    #[serde(rename = "rune")]
    Rune,
    #[serde(rename = "cacao")]
    Cacao,
}

/// How ERC-20 spending rights are granted ahead of an EVM swap.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalStrategy {
    /// Traditional on-chain `approve` towards a holder contract.
    #[serde(rename = "allowance-holder")]
    AllowanceHolder,
    /// Gas-less scoped allowance granted through an EIP-712 signature.
    #[serde(rename = "permit2")]
    Permit2,
}

impl Display for ApprovalStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ApprovalStrategy::AllowanceHolder => "allowance-holder",
            ApprovalStrategy::Permit2 => "permit2",
        };
        write!(f, "{}", s)
    }
}

/// The category of provider adapter able to service a swap type.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderCategory {
    #[serde(rename = "evm-aggregator")]
    EvmAggregator,
    #[serde(rename = "meta-aggregator")]
    MetaAggregator,
    #[serde(rename = "solana-router")]
    SolanaRouter,
    #[serde(rename = "native-router")]
    NativeRouter,
}

impl Display for ProviderCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderCategory::EvmAggregator => "evm-aggregator",
            ProviderCategory::MetaAggregator => "meta-aggregator",
            ProviderCategory::SolanaRouter => "solana-router",
            ProviderCategory::NativeRouter => "native-router",
        };
        write!(f, "{}", s)
    }
}

/// State of a submitted execution, as reported by `/universal-swap/status`.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionStatus {
    Pending,
    Success,
    Failed,
    Partial,
}

impl Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStatus::Pending => "PENDING",
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::Partial => "PARTIAL",
        };
        write!(f, "{}", s)
    }
}

/// Legacy aggregator identifiers kept for callers that predate named
/// registration. Only the two original adapters are mirrored.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregatorType {
    Zerox,
    Odos,
}

impl AggregatorType {
    /// Map a registered adapter name onto the legacy identifier, if one
    /// exists for it.
    pub fn from_provider_name(name: &str) -> Option<Self> {
        match name {
            "0x" => Some(AggregatorType::Zerox),
            "odos" => Some(AggregatorType::Odos),
            _ => None,
        }
    }

    /// Legacy mapping for response shapes that predate named providers.
    /// Unknown names fall back to ZEROX and are logged, since a silent
    /// default would hide a mis-registered adapter.
    pub fn from_provider_name_lossy(name: &str) -> Self {
        Self::from_provider_name(name).unwrap_or_else(|| {
            tracing::warn!(provider = name, "no legacy aggregator mapping, defaulting to ZEROX");
            AggregatorType::Zerox
        })
    }

    /// Parse a legacy identifier spelled out by a caller ("ZEROX", "ODOS").
    pub fn parse_legacy(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "ZEROX" => Some(AggregatorType::Zerox),
            "ODOS" => Some(AggregatorType::Odos),
            _ => None,
        }
    }
}

impl Display for AggregatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggregatorType::Zerox => "ZEROX",
            AggregatorType::Odos => "ODOS",
        };
        write!(f, "{}", s)
    }
}

/// EVM chains treated as L1 for swap-type inference.
pub const EVM_L1_CHAINS: &[u64] = &[1, 56, 137];

/// EVM chains treated as L2 for swap-type inference.
pub const EVM_L2_CHAINS: &[u64] = &[10, 42161, 8453, 324];

/// Chains with a canonical Permit2 deployment.
pub const PERMIT2_CHAINS: &[u64] = &[1, 10, 56, 137, 42161, 8453, 43114];

/// The Permit2 contract address, identical on every supported chain.
pub const PERMIT2_ADDRESS: Address = address!("0x000000000022D473030F116dDEE9F6B43aC78BA3");

/// True when the chain is in the L1 tier.
pub fn is_l1_chain(chain_id: u64) -> bool {
    EVM_L1_CHAINS.contains(&chain_id)
}

/// True when the chain is in the L2 tier.
pub fn is_l2_chain(chain_id: u64) -> bool {
    EVM_L2_CHAINS.contains(&chain_id)
}

/// True when the chain carries a Permit2 deployment.
pub fn supports_permit2(chain_id: u64) -> bool {
    PERMIT2_CHAINS.contains(&chain_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecosystem_serde_round_trip() {
        for eco in Ecosystem::variants() {
            let json = serde_json::to_string(eco).expect("serialize");
            let back: Ecosystem = serde_json::from_str(&json).expect("deserialize");
            assert_eq!(*eco, back);
        }
    }

    #[test]
    fn swap_type_wire_names_are_kebab_case() {
        assert_eq!(
            serde_json::to_string(&SwapType::L1ToL2).expect("serialize"),
            "\"l1-to-l2\""
        );
        assert_eq!(
            serde_json::to_string(&SwapType::NativeSwap).expect("serialize"),
            "\"native-swap\""
        );
    }

    #[test]
    fn chain_tiers_do_not_overlap() {
        for chain in EVM_L1_CHAINS {
            assert!(!is_l2_chain(*chain));
        }
        for chain in EVM_L2_CHAINS {
            assert!(!is_l1_chain(*chain));
        }
    }

    #[test]
    fn legacy_names_map_only_original_adapters() {
        assert_eq!(
            AggregatorType::from_provider_name("0x"),
            Some(AggregatorType::Zerox)
        );
        assert_eq!(
            AggregatorType::from_provider_name("odos"),
            Some(AggregatorType::Odos)
        );
        assert_eq!(AggregatorType::from_provider_name("lifi"), None);
    }
}
