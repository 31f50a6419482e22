//! Statically known chain metadata.
//!
//! Fallback source for supported-chain enrichment when the ChainList fetch is
//! unavailable, and the authority for each chain's hardfork family (which
//! selects the AllowanceHolder fallback address in the approval workflow).

use crate::network::{Ecosystem, supports_permit2};

/// EVM hardfork families that share an AllowanceHolder deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardforkFamily {
    Cancun,
    Shanghai,
    London,
}

/// A known chain definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainInfo {
    pub chain_id: u64,
    /// Human-readable chain name (e.g. "ethereum", "arbitrum-one")
    pub name: &'static str,
    /// Gas-token ticker
    pub native_symbol: &'static str,
    pub ecosystem: Ecosystem,
    /// Hardfork family, for EVM chains with a known AllowanceHolder.
    pub hardfork: Option<HardforkFamily>,
}

static KNOWN_CHAINS: &[ChainInfo] = &[
    ChainInfo {
        chain_id: 1,
        name: "ethereum",
        native_symbol: "ETH",
        ecosystem: Ecosystem::Evm,
        hardfork: Some(HardforkFamily::Cancun),
    },
    ChainInfo {
        chain_id: 10,
        name: "optimism",
        native_symbol: "ETH",
        ecosystem: Ecosystem::Evm,
        hardfork: Some(HardforkFamily::Cancun),
    },
    ChainInfo {
        chain_id: 56,
        name: "bnb-smart-chain",
        native_symbol: "BNB",
        ecosystem: Ecosystem::Evm,
        hardfork: Some(HardforkFamily::Shanghai),
    },
    ChainInfo {
        chain_id: 137,
        name: "polygon",
        native_symbol: "POL",
        ecosystem: Ecosystem::Evm,
        hardfork: Some(HardforkFamily::Cancun),
    },
    ChainInfo {
        chain_id: 324,
        name: "zksync-era",
        native_symbol: "ETH",
        ecosystem: Ecosystem::Evm,
        hardfork: None,
    },
    ChainInfo {
        chain_id: 8453,
        name: "base",
        native_symbol: "ETH",
        ecosystem: Ecosystem::Evm,
        hardfork: Some(HardforkFamily::Cancun),
    },
    ChainInfo {
        chain_id: 42161,
        name: "arbitrum-one",
        native_symbol: "ETH",
        ecosystem: Ecosystem::Evm,
        hardfork: Some(HardforkFamily::Cancun),
    },
    ChainInfo {
        chain_id: 43114,
        name: "avalanche",
        native_symbol: "AVAX",
        ecosystem: Ecosystem::Avalanche,
        hardfork: Some(HardforkFamily::London),
    },
];

/// Look up a known chain by id.
pub fn by_chain_id(chain_id: u64) -> Option<&'static ChainInfo> {
    KNOWN_CHAINS.iter().find(|c| c.chain_id == chain_id)
}

/// All known chains.
pub fn all() -> &'static [ChainInfo] {
    KNOWN_CHAINS
}

impl ChainInfo {
    pub fn supports_permit2(&self) -> bool {
        supports_permit2(self.chain_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permit2_chains_are_all_known() {
        for chain_id in crate::network::PERMIT2_CHAINS {
            assert!(
                by_chain_id(*chain_id).is_some(),
                "permit2 chain {chain_id} missing from table"
            );
        }
    }

    #[test]
    fn avalanche_is_its_own_ecosystem() {
        let info = by_chain_id(43114).expect("avalanche known");
        assert_eq!(info.ecosystem, Ecosystem::Avalanche);
        assert_eq!(info.hardfork, Some(HardforkFamily::London));
    }
}
