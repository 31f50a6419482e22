//! End-to-end engine scenarios over mock provider adapters: ranked
//! comparisons, fan-out partial failure, unhealthy fallback, registry
//! idempotency, and classification with an inconsistent override.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use alloy::primitives::{Address, Bytes};

use omniswap_rs::error::ProviderError;
use omniswap_rs::health::HealthMonitor;
use omniswap_rs::network::{Ecosystem, SwapType, TokenStandard};
use omniswap_rs::orchestrator::QuoteOrchestrator;
use omniswap_rs::providers::{
    OnChainAggregator, ProviderConfig, SwapProvider, http_client,
};
use omniswap_rs::quote_cache::SupportedQuoteCache;
use omniswap_rs::registry::ProviderRegistry;
use omniswap_rs::routing::SwapClassifier;
use omniswap_rs::types::{
    ChainRef, HealthStatus, ProviderHealth, SwapQuote, SwapRequest, TokenAmount, TxPayload,
    UniversalSwapRequest, UnixTimestamp,
};

struct MockAggregator {
    name: &'static str,
    config: ProviderConfig,
    chains: Vec<u64>,
    healthy: bool,
    /// `None` makes every quote call fail.
    buy_amount: Option<u64>,
    calls: AtomicUsize,
}

impl MockAggregator {
    fn new(name: &'static str, chains: Vec<u64>, healthy: bool, buy_amount: Option<u64>) -> Self {
        Self {
            name,
            config: ProviderConfig::new(name, "http://mock.invalid", None, http_client()),
            chains,
            healthy,
            buy_amount,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SwapProvider for MockAggregator {
    fn name(&self) -> &'static str {
        self.name
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn health(&self) -> ProviderHealth {
        ProviderHealth {
            name: self.name.to_string(),
            status: if self.healthy {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy
            },
            latency_ms: Some(40),
            last_check: UnixTimestamp::now_or_epoch(),
            error_rate: Some(if self.healthy { 0.0 } else { 1.0 }),
        }
    }
}

#[async_trait]
impl OnChainAggregator for MockAggregator {
    async fn get_quote(&self, req: &SwapRequest, _strict: bool) -> Result<SwapQuote, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let buy_amount = self.buy_amount.ok_or(ProviderError::Upstream {
            provider: self.name,
            status: 503,
            message: format!("{} simulated outage", self.name),
        })?;
        Ok(SwapQuote {
            sell_token: req.sell_token,
            buy_token: req.buy_token,
            sell_amount: req.sell_amount,
            buy_amount: TokenAmount::from(buy_amount),
            min_buy_amount: TokenAmount::from(buy_amount),
            to: Address::repeat_byte(0x42),
            data: Bytes::from(vec![0xab, 0xcd]),
            value: TokenAmount::ZERO,
            gas: Some(TokenAmount::from(200_000u64)),
            gas_price: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            allowance_target: None,
            aggregator: self.name.to_string(),
            price_impact: None,
            estimated_gas: None,
            permit2: None,
            approval_strategy: None,
        })
    }

    async fn build_tx(&self, req: &SwapRequest) -> Result<TxPayload, ProviderError> {
        let quote = self.get_quote(req, false).await?;
        Ok(TxPayload {
            to: quote.to,
            data: quote.data,
            value: quote.value,
            gas_limit: quote.gas,
            gas_price: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
        })
    }

    fn supports_chain(&self, chain_id: u64) -> bool {
        self.chains.contains(&chain_id)
    }

    fn supported_chains(&self) -> Vec<u64> {
        self.chains.clone()
    }
}

fn request(chain_id: u64) -> SwapRequest {
    SwapRequest {
        chain_id,
        // WETH -> USDC shaped request
        sell_token: "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"
            .parse()
            .expect("address"),
        buy_token: "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"
            .parse()
            .expect("address"),
        sell_amount: TokenAmount::from(100_000_000_000_000u64),
        taker: Address::repeat_byte(0x77),
        recipient: None,
        slippage: None,
        deadline: None,
        aggregator: None,
        approval_strategy: None,
    }
}

fn engine(registry: Arc<ProviderRegistry>) -> QuoteOrchestrator {
    QuoteOrchestrator::new(
        registry,
        Arc::new(HealthMonitor::new()),
        Arc::new(SupportedQuoteCache::new()),
    )
}

#[tokio::test]
async fn ranked_comparison_prefers_zero_x_on_mainnet() {
    let registry = Arc::new(ProviderRegistry::new());
    registry.register_evm_aggregator(Arc::new(MockAggregator::new(
        "0x",
        vec![1, 137],
        true,
        Some(1_000_000),
    )));
    registry.register_evm_aggregator(Arc::new(MockAggregator::new(
        "odos",
        vec![1, 137],
        true,
        Some(1_001_000),
    )));
    let orchestrator = engine(Arc::clone(&registry));

    let comparison = orchestrator
        .get_multiple_quotes(&request(1))
        .await
        .expect("both adapters quote");

    assert_eq!(comparison.quotes.len(), 2);
    // Equal health, equal latency: the chain-1 nudge ranks 0x first.
    assert_eq!(comparison.quotes[0].provider, "0x");
    // Best price is still odos's marginally larger output.
    assert_eq!(comparison.best_aggregator, "odos");
    assert_eq!(comparison.price_difference, "0.10");
}

#[tokio::test]
async fn fan_out_tolerates_partial_failure() {
    let registry = Arc::new(ProviderRegistry::new());
    registry.register_evm_aggregator(Arc::new(MockAggregator::new(
        "0x",
        vec![1],
        true,
        Some(900_000),
    )));
    registry.register_evm_aggregator(Arc::new(MockAggregator::new(
        "odos",
        vec![1],
        true,
        None,
    )));
    let orchestrator = engine(registry);

    let comparison = orchestrator
        .get_multiple_quotes(&request(1))
        .await
        .expect("one survivor is enough");
    assert_eq!(comparison.quotes.len(), 1);
    assert_eq!(comparison.quotes[0].provider, "0x");
    assert_eq!(comparison.price_difference, "0");
}

#[tokio::test]
async fn all_unhealthy_enters_fallback_and_still_succeeds() {
    let registry = Arc::new(ProviderRegistry::new());
    registry.register_evm_aggregator(Arc::new(MockAggregator::new(
        "0x",
        vec![1],
        false,
        Some(500_000),
    )));
    registry.register_evm_aggregator(Arc::new(MockAggregator::new(
        "odos",
        vec![1],
        false,
        Some(400_000),
    )));
    let orchestrator = engine(registry);

    let quote = orchestrator
        .get_quote(&request(1), None, false)
        .await
        .expect("fallback mode attempts unhealthy adapters");
    assert!(!quote.buy_amount.is_zero());
}

#[tokio::test]
async fn all_failing_reports_last_upstream_message() {
    let registry = Arc::new(ProviderRegistry::new());
    registry.register_evm_aggregator(Arc::new(MockAggregator::new("0x", vec![1], false, None)));
    registry.register_evm_aggregator(Arc::new(MockAggregator::new("odos", vec![1], false, None)));
    let orchestrator = engine(registry);

    let err = orchestrator
        .get_quote(&request(1), None, false)
        .await
        .expect_err("every adapter fails");
    let rendered = err.to_string();
    assert!(rendered.contains("simulated outage"), "got: {rendered}");
}

#[tokio::test]
async fn no_provider_for_chain_lists_supported_chains() {
    let registry = Arc::new(ProviderRegistry::new());
    registry.register_evm_aggregator(Arc::new(MockAggregator::new(
        "0x",
        vec![1, 137],
        true,
        Some(1),
    )));
    let orchestrator = engine(registry);

    let err = orchestrator
        .get_quote(&request(59_144), None, false)
        .await
        .expect_err("nobody serves this chain");
    let rendered = err.to_string();
    assert!(rendered.contains("59144"));
    assert!(rendered.contains('1') && rendered.contains("137"));
}

#[tokio::test]
async fn preferred_adapter_failure_falls_through_to_dynamic_selection() {
    let registry = Arc::new(ProviderRegistry::new());
    let broken = Arc::new(MockAggregator::new("0x", vec![1], true, None));
    let working = Arc::new(MockAggregator::new("odos", vec![1], true, Some(777)));
    registry.register_evm_aggregator(Arc::clone(&broken) as Arc<dyn OnChainAggregator>);
    registry.register_evm_aggregator(Arc::clone(&working) as Arc<dyn OnChainAggregator>);
    let orchestrator = engine(registry);

    let quote = orchestrator
        .get_quote(&request(1), Some("0x"), false)
        .await
        .expect("dynamic selection rescues the request");
    assert_eq!(quote.aggregator, "odos");
    // Preferred attempt plus the dynamic-selection retry of the same broken
    // adapter come before odos succeeds.
    assert!(broken.calls.load(Ordering::SeqCst) >= 1);
    assert_eq!(working.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn duplicate_registration_is_ignored() {
    let registry = ProviderRegistry::new();
    registry.register_evm_aggregator(Arc::new(MockAggregator::new("0x", vec![1], true, Some(1))));
    registry.register_evm_aggregator(Arc::new(MockAggregator::new(
        "0x",
        vec![42161],
        true,
        Some(2),
    )));
    assert_eq!(registry.evm_aggregators().len(), 1);
    // The first registration won; its chain table is still in force.
    assert!(!registry.evm_supported_chains().contains(&42_161));
}

#[test]
fn late_registration_remains_valid() {
    let registry = ProviderRegistry::new();
    registry.registration_complete();
    registry.register_evm_aggregator(Arc::new(MockAggregator::new("0x", vec![1], true, Some(1))));
    assert!(registry.is_complete());
    assert!(registry.evm_aggregator("0x").is_some());
    assert_eq!(registry.evm_aggregators_for_chain(1).len(), 1);
}

#[test]
fn chain_supported_providers_all_claim_the_chain() {
    let registry = ProviderRegistry::new();
    registry.register_evm_aggregator(Arc::new(MockAggregator::new("0x", vec![1, 137], true, None)));
    registry.register_evm_aggregator(Arc::new(MockAggregator::new("odos", vec![137], true, None)));
    for provider in registry.evm_aggregators_for_chain(137) {
        assert!(provider.supports_chain(137));
    }
    assert_eq!(registry.evm_aggregators_for_chain(1).len(), 1);
}

#[test]
fn inconsistent_override_classifies_as_cross_chain() {
    let registry = Arc::new(ProviderRegistry::new());
    registry.register_evm_aggregator(Arc::new(MockAggregator::new("0x", vec![1, 137], true, None)));
    let classifier = SwapClassifier::new(registry, Arc::new(SupportedQuoteCache::new()));

    let req = UniversalSwapRequest {
        sell_token: "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2".to_string(),
        buy_token: "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".to_string(),
        sell_amount: TokenAmount::from(1_000u64),
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
            chain: "137".to_string(),
            ecosystem: Ecosystem::Evm,
            standard: TokenStandard::Erc20,
        },
        swap_type: Some(SwapType::OnChain),
        aggregator: None,
        approval_strategy: None,
    };
    let classification = classifier.classify(&req).expect("classifies");
    assert_eq!(classification.swap_type, SwapType::CrossChain);
    assert_eq!(classification.override_rejected, Some(SwapType::OnChain));
}
