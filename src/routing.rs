//! Routing classifier.
//!
//! Decides, from a request's source/destination legs, what kind of swap it
//! is and which provider category must service it. Classification is
//! deterministic and idempotent: deriving with the result as an override
//! yields the result again. A caller-supplied `swapType` is honored only
//! when it matches the derivation; otherwise the derived value wins and a
//! warning is logged.

use serde::Serialize;
use std::sync::Arc;

use crate::error::GatewayError;
use crate::network::{Ecosystem, ProviderCategory, SwapType, is_l1_chain, is_l2_chain};
use crate::quote_cache::SupportedQuoteCache;
use crate::registry::ProviderRegistry;
use crate::types::UniversalSwapRequest;

/// Result of classifying one request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub swap_type: SwapType,
    pub category: ProviderCategory,
    /// Adapters registered in the selected category, by name.
    pub providers: Vec<String>,
    /// Set when a caller override was rejected by re-derivation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_rejected: Option<SwapType>,
}

/// Derive the swap type from the two legs, ignoring any caller override.
pub fn derive_swap_type(req: &UniversalSwapRequest) -> Result<SwapType, GatewayError> {
    let source = &req.source;
    let destination = &req.destination;
    let same_ecosystem = source.ecosystem == destination.ecosystem;
    let same_chain = source.chain == destination.chain;

    if same_ecosystem && same_chain {
        return Ok(SwapType::OnChain);
    }

    if !same_ecosystem {
        if source.ecosystem.is_native_settled() || destination.ecosystem.is_native_settled() {
            return Ok(SwapType::NativeSwap);
        }
        return Ok(SwapType::CrossChain);
    }

    // Same ecosystem, different chains.
    if source.ecosystem == Ecosystem::Evm {
        let from = source.evm_chain_id().ok_or_else(|| {
            GatewayError::validation(format!("source chain {:?} is not numeric", source.chain))
        })?;
        let to = destination.evm_chain_id().ok_or_else(|| {
            GatewayError::validation(format!(
                "destination chain {:?} is not numeric",
                destination.chain
            ))
        })?;
        return Ok(match (is_l1_chain(from), is_l2_chain(from), is_l1_chain(to), is_l2_chain(to)) {
            (true, _, _, true) => SwapType::L1ToL2,
            (_, true, true, _) => SwapType::L2ToL1,
            (_, true, _, true) => SwapType::L2ToL2,
            _ => SwapType::CrossChain,
        });
    }

    Ok(SwapType::CrossChain)
}

/// Resolve the swap type, applying the caller's override only when it agrees
/// with the derivation.
pub fn determine_swap_type(
    req: &UniversalSwapRequest,
) -> Result<(SwapType, Option<SwapType>), GatewayError> {
    let derived = derive_swap_type(req)?;
    match req.swap_type {
        Some(requested) if requested == derived => Ok((derived, None)),
        Some(requested) => {
            tracing::warn!(
                requested = %requested,
                derived = %derived,
                "swapType override inconsistent with request legs, re-derived"
            );
            Ok((derived, Some(requested)))
        }
        None => Ok((derived, None)),
    }
}

/// Map a swap type onto the provider category that services it.
pub fn provider_category(
    swap_type: SwapType,
    source_ecosystem: Ecosystem,
) -> Result<ProviderCategory, GatewayError> {
    match swap_type {
        SwapType::OnChain => {
            if source_ecosystem.is_evm_like() {
                Ok(ProviderCategory::EvmAggregator)
            } else if source_ecosystem == Ecosystem::Solana {
                Ok(ProviderCategory::SolanaRouter)
            } else {
                Err(GatewayError::Unroutable(format!(
                    "no on-chain provider category for ecosystem {source_ecosystem}"
                )))
            }
        }
        SwapType::CrossChain | SwapType::L1ToL2 | SwapType::L2ToL1 | SwapType::L2ToL2 => {
            Ok(ProviderCategory::MetaAggregator)
        }
        SwapType::NativeSwap => Ok(ProviderCategory::NativeRouter),
    }
}

/// Classifier facade over the registry and the supported-quote cache.
pub struct SwapClassifier {
    registry: Arc<ProviderRegistry>,
    quote_cache: Arc<SupportedQuoteCache>,
}

impl SwapClassifier {
    pub fn new(registry: Arc<ProviderRegistry>, quote_cache: Arc<SupportedQuoteCache>) -> Self {
        Self {
            registry,
            quote_cache,
        }
    }

    /// Full classification of one request.
    pub fn classify(&self, req: &UniversalSwapRequest) -> Result<Classification, GatewayError> {
        let (swap_type, override_rejected) = determine_swap_type(req)?;
        let category = provider_category(swap_type, req.source.ecosystem)?;
        Ok(Classification {
            swap_type,
            category,
            providers: self.registry.names(category),
            override_rejected,
        })
    }

    /// Chain compatibility: both ecosystems must be recognised, and the
    /// chain must either be claimed by a registered adapter or have quoted
    /// successfully before. An empty registry passes the check so the first
    /// quote can populate the cache (bootstrap).
    pub fn is_chain_supported(&self, req: &UniversalSwapRequest) -> bool {
        if self.registry.is_empty() {
            tracing::debug!("empty registry, chain support check passes for bootstrap");
            return true;
        }
        let supported = |chain: &crate::types::ChainRef| match chain.evm_chain_id() {
            Some(chain_id) => {
                self.registry.any_adapter_supports_chain(chain_id)
                    || self.quote_cache.has_chain(chain_id)
            }
            // Non-EVM legs are vouched for by their category having at
            // least one registered adapter.
            None => match chain.ecosystem {
                Ecosystem::Solana => !self.registry.solana_routers().is_empty(),
                eco if eco.is_native_settled() => !self.registry.native_routers().is_empty(),
                _ => !self.registry.meta_aggregators().is_empty(),
            },
        };
        supported(&req.source) && supported(&req.destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::TokenStandard;
    use crate::types::{ChainRef, TokenAmount};

    fn leg(chain: &str, ecosystem: Ecosystem) -> ChainRef {
        ChainRef {
            chain: chain.to_string(),
            ecosystem,
            standard: TokenStandard::Erc20,
        }
    }

    fn request(source: ChainRef, destination: ChainRef) -> UniversalSwapRequest {
        UniversalSwapRequest {
            sell_token: "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2".to_string(),
            buy_token: "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".to_string(),
            sell_amount: TokenAmount::from(1_000_000u64),
            taker: "0x70997970C51812dc3A010C7d01b50e0d17dc79C8".to_string(),
            recipient: None,
            slippage: None,
            deadline: None,
            source,
            destination,
            swap_type: None,
            aggregator: None,
            approval_strategy: None,
        }
    }

    #[test]
    fn same_chain_same_ecosystem_is_on_chain() {
        let req = request(leg("1", Ecosystem::Evm), leg("1", Ecosystem::Evm));
        assert_eq!(derive_swap_type(&req).expect("derives"), SwapType::OnChain);
    }

    #[test]
    fn native_settled_ecosystem_forces_native_swap() {
        let req = request(leg("1", Ecosystem::Evm), leg("BTC", Ecosystem::Bitcoin));
        assert_eq!(derive_swap_type(&req).expect("derives"), SwapType::NativeSwap);
        let req = request(leg("cosmoshub-4", Ecosystem::Cosmos), leg("1", Ecosystem::Evm));
        assert_eq!(derive_swap_type(&req).expect("derives"), SwapType::NativeSwap);
    }

    #[test]
    fn different_non_native_ecosystems_are_cross_chain() {
        let req = request(leg("1", Ecosystem::Evm), leg("mainnet-beta", Ecosystem::Solana));
        assert_eq!(derive_swap_type(&req).expect("derives"), SwapType::CrossChain);
    }

    #[test]
    fn evm_tier_table() {
        let cases = [
            ("1", "42161", SwapType::L1ToL2),
            ("10", "56", SwapType::L2ToL1),
            ("10", "8453", SwapType::L2ToL2),
            ("1", "137", SwapType::CrossChain), // L1→L1 falls through
            ("1", "59144", SwapType::CrossChain), // unknown tier
        ];
        for (from, to, expected) in cases {
            let req = request(leg(from, Ecosystem::Evm), leg(to, Ecosystem::Evm));
            assert_eq!(
                derive_swap_type(&req).expect("derives"),
                expected,
                "{from} -> {to}"
            );
        }
    }

    #[test]
    fn classification_is_idempotent_under_round_trip() {
        let mut req = request(leg("1", Ecosystem::Evm), leg("42161", Ecosystem::Evm));
        let (first, _) = determine_swap_type(&req).expect("derives");
        req.swap_type = Some(first);
        let (second, rejected) = determine_swap_type(&req).expect("derives");
        assert_eq!(first, second);
        assert!(rejected.is_none());
    }

    #[test]
    fn inconsistent_override_is_rederived() {
        let mut req = request(leg("1", Ecosystem::Evm), leg("137", Ecosystem::Evm));
        req.swap_type = Some(SwapType::OnChain);
        let (resolved, rejected) = determine_swap_type(&req).expect("derives");
        assert_eq!(resolved, SwapType::CrossChain);
        assert_eq!(rejected, Some(SwapType::OnChain));
    }

    #[test]
    fn category_mapping() {
        assert_eq!(
            provider_category(SwapType::OnChain, Ecosystem::Evm).expect("maps"),
            ProviderCategory::EvmAggregator
        );
        assert_eq!(
            provider_category(SwapType::OnChain, Ecosystem::Avalanche).expect("maps"),
            ProviderCategory::EvmAggregator
        );
        assert_eq!(
            provider_category(SwapType::OnChain, Ecosystem::Solana).expect("maps"),
            ProviderCategory::SolanaRouter
        );
        assert!(provider_category(SwapType::OnChain, Ecosystem::Near).is_err());
        assert_eq!(
            provider_category(SwapType::L2ToL2, Ecosystem::Evm).expect("maps"),
            ProviderCategory::MetaAggregator
        );
        assert_eq!(
            provider_category(SwapType::NativeSwap, Ecosystem::Bitcoin).expect("maps"),
            ProviderCategory::NativeRouter
        );
    }

    #[test]
    fn empty_registry_bootstraps_chain_support() {
        let classifier = SwapClassifier::new(
            Arc::new(ProviderRegistry::new()),
            Arc::new(SupportedQuoteCache::new()),
        );
        let req = request(leg("1", Ecosystem::Evm), leg("1", Ecosystem::Evm));
        assert!(classifier.is_chain_supported(&req));
    }
}
