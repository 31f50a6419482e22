//! Quote orchestrator.
//!
//! Discovers the adapters that can serve a request, filters them by health,
//! scores the survivors, and either walks them in score order until one
//! quote succeeds (`get_quote`) or fans out to all of them in parallel for a
//! ranked comparison (`get_multiple_quotes`). When every supported adapter is
//! unhealthy the orchestrator enters fallback mode and attempts them anyway.

use alloy::primitives::U256;
use futures_util::future::join_all;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

use crate::error::GatewayError;
use crate::health::HealthMonitor;
use crate::network::ApprovalStrategy;
use crate::quote_cache::SupportedQuoteCache;
use crate::registry::ProviderRegistry;
use crate::types::{ProviderHealth, RouteQuote, SwapQuote, SwapRequest, UniversalSwapRequest};

/// Sell amounts above this threshold count as large trades for scoring.
fn large_trade_threshold() -> U256 {
    U256::from(10u64).pow(U256::from(21u64))
}

/// One adapter's entry in a ranked comparison.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedQuote {
    pub provider: String,
    pub score: f64,
    pub quote: SwapQuote,
}

/// Result of a parallel multi-adapter comparison.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteComparison {
    /// Per-adapter results, highest score first.
    pub quotes: Vec<RankedQuote>,
    /// Adapter whose quote maximises `buyAmount`.
    pub best_aggregator: String,
    /// `(best − worst) / worst · 100`, two decimals; `"0"` for a single quote.
    pub price_difference: String,
}

/// A cross-chain route labelled with the meta-aggregator that produced it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRoute {
    pub provider: String,
    pub route: RouteQuote,
}

pub struct QuoteOrchestrator {
    registry: Arc<ProviderRegistry>,
    health: Arc<HealthMonitor>,
    quote_cache: Arc<SupportedQuoteCache>,
}

impl QuoteOrchestrator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        health: Arc<HealthMonitor>,
        quote_cache: Arc<SupportedQuoteCache>,
    ) -> Self {
        Self {
            registry,
            health,
            quote_cache,
        }
    }

    /// Obtain one executable quote for an EVM swap.
    ///
    /// When `preferred` names a registered adapter it is attempted once
    /// before dynamic selection; its failure falls through rather than
    /// failing the request.
    #[tracing::instrument(skip_all, fields(chain_id = req.chain_id, preferred))]
    pub async fn get_quote(
        &self,
        req: &SwapRequest,
        preferred: Option<&str>,
        strict: bool,
    ) -> Result<SwapQuote, GatewayError> {
        if let Some(name) = preferred {
            if let Some(adapter) = self.resolve_preferred(name) {
                match adapter.get_quote(req, strict).await {
                    Ok(quote) => {
                        self.accept_quote(req, &quote)?;
                        return Ok(quote);
                    }
                    Err(e) => {
                        tracing::warn!(provider = name, error = %e,
                            "preferred adapter failed, falling back to dynamic selection");
                    }
                }
            } else {
                tracing::warn!(provider = name, "preferred adapter not registered");
            }
        }

        let candidates = self.ranked_candidates(req).await?;
        let mut last_error: Option<String> = None;
        for (adapter, score) in candidates {
            tracing::debug!(provider = adapter.name(), score, "attempting quote");
            match adapter.get_quote(req, strict).await {
                Ok(quote) => {
                    self.accept_quote(req, &quote)?;
                    return Ok(quote);
                }
                Err(e) => {
                    tracing::warn!(provider = adapter.name(), error = %e, "quote attempt failed");
                    last_error = Some(e.to_string());
                }
            }
        }
        Err(GatewayError::AllProvidersFailed {
            last_error: last_error.unwrap_or_else(|| "no adapter was attempted".to_string()),
        })
    }

    /// Parallel comparison across every adapter supporting the chain,
    /// regardless of health. Partial failure is tolerated; the call errors
    /// only when every adapter fails.
    #[tracing::instrument(skip_all, fields(chain_id = req.chain_id))]
    pub async fn get_multiple_quotes(
        &self,
        req: &SwapRequest,
    ) -> Result<QuoteComparison, GatewayError> {
        let supported = self.supported_adapters(req.chain_id)?;

        let attempts = supported.iter().map(|adapter| {
            let adapter = Arc::clone(adapter);
            async move {
                let health = self.health.health_of(adapter.as_ref()).await;
                let score = score_provider(adapter.name(), &health, req);
                let result = adapter.get_quote(req, false).await;
                (adapter.name().to_string(), score, result)
            }
        });

        let mut quotes = Vec::new();
        let mut last_error: Option<String> = None;
        for (provider, score, result) in join_all(attempts).await {
            match result {
                Ok(quote) => {
                    if let Err(e) = quote.validate() {
                        tracing::warn!(%provider, error = %e, "discarding malformed quote");
                        last_error = Some(e);
                        continue;
                    }
                    quotes.push(RankedQuote {
                        provider,
                        score,
                        quote,
                    });
                }
                Err(e) => {
                    tracing::warn!(%provider, error = %e, "quote failed in fan-out");
                    last_error = Some(e.to_string());
                }
            }
        }

        if quotes.is_empty() {
            return Err(GatewayError::AllProvidersFailed {
                last_error: last_error.unwrap_or_else(|| "no quotes returned".to_string()),
            });
        }

        self.record_success(req);

        quotes.sort_by(|a, b| b.score.total_cmp(&a.score));
        let best_aggregator = best_by_buy_amount(&quotes);
        let price_difference = price_difference(&quotes);
        Ok(QuoteComparison {
            quotes,
            best_aggregator,
            price_difference,
        })
    }

    /// Fan cross-chain route requests out to every registered
    /// meta-aggregator, tolerating partial failure.
    #[tracing::instrument(skip_all)]
    pub async fn get_cross_chain_routes(
        &self,
        req: &UniversalSwapRequest,
    ) -> Result<Vec<ProviderRoute>, GatewayError> {
        let adapters = self.registry.meta_aggregators();
        if adapters.is_empty() {
            return Err(GatewayError::unsupported(
                "no meta-aggregator registered for cross-chain swaps",
            ));
        }
        let attempts = adapters.iter().map(|adapter| {
            let adapter = Arc::clone(adapter);
            async move {
                let result = adapter.get_routes(req).await;
                (adapter.name().to_string(), result)
            }
        });
        let mut routes = Vec::new();
        let mut last_error: Option<String> = None;
        for (provider, result) in join_all(attempts).await {
            match result {
                Ok(found) => routes.extend(found.into_iter().map(|route| ProviderRoute {
                    provider: provider.clone(),
                    route: route.clamp_confidence(),
                })),
                Err(e) => {
                    tracing::warn!(%provider, error = %e, "route fan-out failed");
                    last_error = Some(e.to_string());
                }
            }
        }
        if routes.is_empty() {
            return Err(GatewayError::AllProvidersFailed {
                last_error: last_error.unwrap_or_else(|| "no routes returned".to_string()),
            });
        }
        // Highest expected output first.
        routes.sort_by(|a, b| b.route.total_estimated_out.cmp(&a.route.total_estimated_out));
        Ok(routes)
    }

    /// Fan a Solana quote out to registered routers; first-come ranking by
    /// estimated output.
    pub async fn get_solana_routes(
        &self,
        req: &UniversalSwapRequest,
    ) -> Result<Vec<ProviderRoute>, GatewayError> {
        let routers = self.registry.solana_routers();
        if routers.is_empty() {
            return Err(GatewayError::unsupported(
                "no solana router registered",
            ));
        }
        let attempts = routers.iter().map(|router| {
            let router = Arc::clone(router);
            async move { (router.name().to_string(), router.quote(req).await) }
        });
        collect_routes(join_all(attempts).await)
    }

    /// Quote a native-asset swap through registered native routers.
    pub async fn get_native_routes(
        &self,
        req: &UniversalSwapRequest,
    ) -> Result<Vec<ProviderRoute>, GatewayError> {
        let routers = self.registry.native_routers();
        if routers.is_empty() {
            return Err(GatewayError::unsupported(
                "no native router registered",
            ));
        }
        let attempts = routers.iter().map(|router| {
            let router = Arc::clone(router);
            async move { (router.name().to_string(), router.quote_btc(req).await) }
        });
        collect_routes(join_all(attempts).await)
    }

    /// A preferred adapter by registered name, or by its legacy identifier
    /// for callers that still send "ZEROX"/"ODOS".
    fn resolve_preferred(
        &self,
        name: &str,
    ) -> Option<Arc<dyn crate::providers::OnChainAggregator>> {
        self.registry.evm_aggregator(name).or_else(|| {
            let legacy = crate::network::AggregatorType::parse_legacy(name)?;
            self.registry.legacy_aggregator(legacy)
        })
    }

    fn supported_adapters(
        &self,
        chain_id: u64,
    ) -> Result<Vec<Arc<dyn crate::providers::OnChainAggregator>>, GatewayError> {
        let supported = self.registry.evm_aggregators_for_chain(chain_id);
        if supported.is_empty() {
            return Err(GatewayError::NoProviderForChain {
                chain_id,
                supported: self.registry.evm_supported_chains(),
            });
        }
        Ok(supported)
    }

    /// Supported adapters, health-filtered and sorted by descending score.
    /// Falls back to the unfiltered set when nothing is healthy.
    async fn ranked_candidates(
        &self,
        req: &SwapRequest,
    ) -> Result<Vec<(Arc<dyn crate::providers::OnChainAggregator>, f64)>, GatewayError> {
        let supported = self.supported_adapters(req.chain_id)?;

        let mut with_health = Vec::with_capacity(supported.len());
        for adapter in supported {
            let health = self.health.health_of(adapter.as_ref()).await;
            with_health.push((adapter, health));
        }

        let healthy: Vec<_> = with_health
            .iter()
            .filter(|(_, health)| health.is_healthy())
            .cloned()
            .collect();
        let pool = if healthy.is_empty() {
            tracing::warn!(
                chain_id = req.chain_id,
                "no healthy provider, entering fallback mode over the full set"
            );
            with_health
        } else {
            healthy
        };

        let mut scored: Vec<_> = pool
            .into_iter()
            .map(|(adapter, health)| {
                let score = score_provider(adapter.name(), &health, req);
                (adapter, score)
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(scored)
    }

    fn accept_quote(&self, req: &SwapRequest, quote: &SwapQuote) -> Result<(), GatewayError> {
        quote
            .validate()
            .map_err(GatewayError::validation)?;
        self.record_success(req);
        Ok(())
    }

    fn record_success(&self, req: &SwapRequest) {
        self.quote_cache.record(
            req.chain_id,
            &format!("{:#x}", req.sell_token),
            &format!("{:#x}", req.buy_token),
        );
    }
}

fn collect_routes(
    results: Vec<(String, Result<RouteQuote, crate::error::ProviderError>)>,
) -> Result<Vec<ProviderRoute>, GatewayError> {
    let mut routes = Vec::new();
    let mut last_error: Option<String> = None;
    for (provider, result) in results {
        match result {
            Ok(route) => routes.push(ProviderRoute {
                provider,
                route: route.clamp_confidence(),
            }),
            Err(e) => {
                tracing::warn!(%provider, error = %e, "route quote failed");
                last_error = Some(e.to_string());
            }
        }
    }
    if routes.is_empty() {
        return Err(GatewayError::AllProvidersFailed {
            last_error: last_error.unwrap_or_else(|| "no routes returned".to_string()),
        });
    }
    routes.sort_by(|a, b| b.route.total_estimated_out.cmp(&a.route.total_estimated_out));
    Ok(routes)
}

/// Score one adapter for a request. All provider-name bonuses live here and
/// nowhere else, so nudges are never double-counted.
pub fn score_provider(name: &str, health: &ProviderHealth, req: &SwapRequest) -> f64 {
    let mut score = 100.0;

    match health.status {
        crate::types::HealthStatus::Healthy => score += 50.0,
        crate::types::HealthStatus::Degraded => {}
        crate::types::HealthStatus::Unhealthy => score -= 100.0,
    }
    if let Some(latency) = health.latency_ms {
        score += (100.0 - latency as f64).max(0.0);
    }
    if let Some(error_rate) = health.error_rate {
        score -= 100.0 * error_rate;
    }

    // Empirical per-chain nudges.
    if req.chain_id == 1 && name == "0x" {
        score += 20.0;
    }
    if req.chain_id == 137 && name == "odos" {
        score += 15.0;
    }
    if req.sell_amount.0 > large_trade_threshold() && name == "0x" {
        score += 10.0;
    }
    if req.approval_strategy == Some(ApprovalStrategy::Permit2) && name == "0x" {
        score += 25.0;
    }

    score.max(0.0)
}

/// The adapter whose quote maximises `buyAmount`, compared in U256.
fn best_by_buy_amount(quotes: &[RankedQuote]) -> String {
    quotes
        .iter()
        .max_by(|a, b| a.quote.buy_amount.cmp(&b.quote.buy_amount))
        .map(|q| q.provider.clone())
        .unwrap_or_default()
}

/// `(best − worst) / worst · 100` with two decimals, computed in integer
/// basis points so amounts past 2^53 stay exact.
fn price_difference(quotes: &[RankedQuote]) -> String {
    if quotes.len() < 2 {
        return "0".to_string();
    }
    let best = quotes
        .iter()
        .map(|q| q.quote.buy_amount.0)
        .max()
        .unwrap_or_default();
    let worst = quotes
        .iter()
        .map(|q| q.quote.buy_amount.0)
        .min()
        .unwrap_or_default();
    if worst.is_zero() {
        return "0".to_string();
    }
    let hundredths = (best - worst) * U256::from(10_000u64) / worst;
    match i128::try_from(hundredths) {
        Ok(value) => Decimal::from_i128_with_scale(value, 2).to_string(),
        Err(_) => "inf".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HealthStatus, TokenAmount, UnixTimestamp};
    use alloy::primitives::Address;

    fn health(status: HealthStatus, latency_ms: Option<u64>, error_rate: Option<f64>) -> ProviderHealth {
        ProviderHealth {
            name: "test".to_string(),
            status,
            latency_ms,
            last_check: UnixTimestamp(0),
            error_rate,
        }
    }

    fn request(chain_id: u64) -> SwapRequest {
        SwapRequest {
            chain_id,
            sell_token: Address::repeat_byte(1),
            buy_token: Address::repeat_byte(2),
            sell_amount: TokenAmount::from(1_000u64),
            taker: Address::repeat_byte(3),
            recipient: None,
            slippage: None,
            deadline: None,
            aggregator: None,
            approval_strategy: None,
        }
    }

    fn quote(provider: &str, buy_amount: u64) -> RankedQuote {
        RankedQuote {
            provider: provider.to_string(),
            score: 0.0,
            quote: SwapQuote {
                sell_token: Address::repeat_byte(1),
                buy_token: Address::repeat_byte(2),
                sell_amount: TokenAmount::from(1_000u64),
                buy_amount: TokenAmount::from(buy_amount),
                min_buy_amount: TokenAmount::from(buy_amount),
                to: Address::repeat_byte(4),
                data: Default::default(),
                value: TokenAmount::ZERO,
                gas: None,
                gas_price: None,
                max_fee_per_gas: None,
                max_priority_fee_per_gas: None,
                allowance_target: None,
                aggregator: provider.to_string(),
                price_impact: None,
                estimated_gas: None,
                permit2: None,
                approval_strategy: None,
            },
        }
    }

    #[test]
    fn healthy_low_latency_scores_highest() {
        let req = request(10);
        let fast = score_provider("lifi", &health(HealthStatus::Healthy, Some(20), Some(0.0)), &req);
        let slow = score_provider("lifi", &health(HealthStatus::Healthy, Some(90), Some(0.0)), &req);
        let sick = score_provider("lifi", &health(HealthStatus::Unhealthy, None, Some(1.0)), &req);
        assert!(fast > slow);
        assert!(slow > sick);
        // base 100 + 50 + (100-20) = 230
        assert_eq!(fast, 230.0);
        // base 100 - 100 - 100 → clamped to 0
        assert_eq!(sick, 0.0);
    }

    #[test]
    fn chain_one_prefers_zero_x() {
        let req = request(1);
        let h = health(HealthStatus::Healthy, Some(50), Some(0.0));
        let zero_x = score_provider("0x", &h, &req);
        let odos = score_provider("odos", &h, &req);
        assert_eq!(zero_x - odos, 20.0);
    }

    #[test]
    fn polygon_prefers_odos() {
        let req = request(137);
        let h = health(HealthStatus::Healthy, Some(50), Some(0.0));
        assert_eq!(
            score_provider("odos", &h, &req) - score_provider("0x", &h, &req),
            15.0
        );
    }

    #[test]
    fn large_trades_and_permit2_nudge_zero_x() {
        let mut req = request(10);
        req.sell_amount = TokenAmount(U256::from(10u64).pow(U256::from(22u64)));
        let h = health(HealthStatus::Healthy, Some(50), Some(0.0));
        let base = score_provider("odos", &h, &req);
        assert_eq!(score_provider("0x", &h, &req) - base, 10.0);

        req.approval_strategy = Some(ApprovalStrategy::Permit2);
        assert_eq!(score_provider("0x", &h, &req) - base, 35.0);
    }

    #[test]
    fn best_and_difference() {
        let quotes = vec![quote("0x", 1_050_000), quote("odos", 1_000_000)];
        assert_eq!(best_by_buy_amount(&quotes), "0x");
        assert_eq!(price_difference(&quotes), "5.00");
    }

    #[test]
    fn single_quote_has_zero_difference() {
        let quotes = vec![quote("0x", 42)];
        assert_eq!(price_difference(&quotes), "0");
    }

    #[test]
    fn difference_survives_amounts_past_f64() {
        // 2^100-scale amounts with an exact 1% spread.
        let base = U256::from(1u8) << 100;
        let mut a = quote("0x", 0);
        a.quote.buy_amount = TokenAmount(base + base / U256::from(100u64));
        let mut b = quote("odos", 0);
        b.quote.buy_amount = TokenAmount(base);
        assert_eq!(price_difference(&[a, b]), "1.00");
    }
}
