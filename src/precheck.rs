//! Universal pre-flight checker.
//!
//! Runs five independent probes (parameters, liquidity, approval, balance,
//! provider health) and reports every outcome. No probe short-circuits the
//! others: a caller sees the full picture in one round trip. The approval
//! probe is tri-state; when the spender cannot be determined it records
//! *skipped* instead of guessing.

use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::approval::ApprovalWorkflow;
use crate::health::HealthMonitor;
use crate::network::ApprovalStrategy;
use crate::orchestrator::QuoteOrchestrator;
use crate::registry::ProviderRegistry;
use crate::routing::SwapClassifier;
use crate::types::{SwapRequest, UniversalSwapRequest, is_native_address};

/// Composite pre-check outcome. `approval_required` is `None` when the probe
/// was skipped.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreCheckReport {
    pub parameters_valid: bool,
    pub liquidity_available: bool,
    pub approval_required: Option<bool>,
    pub sufficient_balance: bool,
    pub provider_healthy: bool,
    pub warnings: Vec<String>,
    pub details: serde_json::Value,
}

impl PreCheckReport {
    /// True when nothing blocks execution. A skipped approval probe does not
    /// block; it only warns.
    pub fn is_ready(&self) -> bool {
        self.parameters_valid
            && self.liquidity_available
            && self.sufficient_balance
            && self.provider_healthy
    }
}

pub struct PreCheck {
    classifier: Arc<SwapClassifier>,
    orchestrator: Arc<QuoteOrchestrator>,
    approval: Arc<ApprovalWorkflow>,
    registry: Arc<ProviderRegistry>,
    health: Arc<HealthMonitor>,
}

impl PreCheck {
    pub fn new(
        classifier: Arc<SwapClassifier>,
        orchestrator: Arc<QuoteOrchestrator>,
        approval: Arc<ApprovalWorkflow>,
        registry: Arc<ProviderRegistry>,
        health: Arc<HealthMonitor>,
    ) -> Self {
        Self {
            classifier,
            orchestrator,
            approval,
            registry,
            health,
        }
    }

    #[tracing::instrument(skip_all)]
    pub async fn run(&self, req: &UniversalSwapRequest) -> PreCheckReport {
        let mut warnings = Vec::new();
        let mut details = serde_json::Map::new();

        let parameters_valid = self.classifier.is_chain_supported(req);
        if !parameters_valid {
            warnings.push("chain pair is not supported by any registered provider".to_string());
        }

        let legacy = req.to_legacy();

        let liquidity_available = self
            .check_liquidity(legacy.as_ref(), &mut warnings, &mut details)
            .await;
        let approval_required = self
            .check_approval(req, legacy.as_ref(), &mut warnings, &mut details)
            .await;
        let sufficient_balance = self
            .check_balance(legacy.as_ref(), &mut warnings, &mut details)
            .await;
        let provider_healthy = self.check_provider_health(&mut warnings, &mut details).await;

        PreCheckReport {
            parameters_valid,
            liquidity_available,
            approval_required,
            sufficient_balance,
            provider_healthy,
            warnings,
            details: serde_json::Value::Object(details),
        }
    }

    /// Liquidity probe: for EVM requests, a best-effort multi-quote fan-out;
    /// liquid iff at least one quote pays out. Non-EVM ecosystems are
    /// stubbed liquid until their routers expose a probe.
    async fn check_liquidity(
        &self,
        legacy: Option<&SwapRequest>,
        warnings: &mut Vec<String>,
        details: &mut serde_json::Map<String, serde_json::Value>,
    ) -> bool {
        let Some(legacy) = legacy else {
            details.insert("liquidity".to_string(), json!({"probe": "skipped-non-evm"}));
            return true;
        };
        match self.orchestrator.get_multiple_quotes(legacy).await {
            Ok(comparison) => {
                let liquid = comparison
                    .quotes
                    .iter()
                    .any(|ranked| !ranked.quote.buy_amount.is_zero());
                details.insert(
                    "liquidity".to_string(),
                    json!({
                        "quotes": comparison.quotes.len(),
                        "bestAggregator": comparison.best_aggregator,
                    }),
                );
                if !liquid {
                    warnings.push("all quotes returned zero output".to_string());
                }
                liquid
            }
            Err(e) => {
                warnings.push(format!("liquidity probe failed: {e}"));
                false
            }
        }
    }

    /// Approval probe. Tri-state: `None` when no spender could be resolved.
    async fn check_approval(
        &self,
        req: &UniversalSwapRequest,
        legacy: Option<&SwapRequest>,
        warnings: &mut Vec<String>,
        details: &mut serde_json::Map<String, serde_json::Value>,
    ) -> Option<bool> {
        let legacy = legacy?;
        if is_native_address(&legacy.sell_token) {
            return Some(false);
        }
        let strategy = req
            .approval_strategy
            .unwrap_or(ApprovalStrategy::AllowanceHolder);
        let spender = match self
            .approval
            .resolve_spender(legacy.chain_id, strategy, Some(legacy))
            .await
        {
            Ok(spender) => spender,
            Err(e) => {
                warnings.push(format!("could not determine approval spender: {e}"));
                return None;
            }
        };
        details.insert("spender".to_string(), json!(format!("{spender:#x}")));
        match self
            .approval
            .is_approval_needed(
                legacy.chain_id,
                legacy.sell_token,
                legacy.taker,
                spender,
                legacy.sell_amount.0,
            )
            .await
        {
            Ok(required) => Some(required),
            Err(e) => {
                warnings.push(format!("allowance query failed: {e}"));
                None
            }
        }
    }

    async fn check_balance(
        &self,
        legacy: Option<&SwapRequest>,
        warnings: &mut Vec<String>,
        details: &mut serde_json::Map<String, serde_json::Value>,
    ) -> bool {
        let Some(legacy) = legacy else {
            return true;
        };
        match self
            .approval
            .token_balance(legacy.chain_id, legacy.sell_token, legacy.taker)
            .await
        {
            Ok(balance) => {
                details.insert("balance".to_string(), json!(balance.to_string()));
                let sufficient = balance >= legacy.sell_amount.0;
                if !sufficient {
                    warnings.push(format!(
                        "balance {balance} is below sell amount {}",
                        legacy.sell_amount
                    ));
                }
                sufficient
            }
            Err(e) => {
                warnings.push(format!("balance query failed: {e}"));
                false
            }
        }
    }

    /// Every registered EVM adapter must currently report healthy.
    async fn check_provider_health(
        &self,
        warnings: &mut Vec<String>,
        details: &mut serde_json::Map<String, serde_json::Value>,
    ) -> bool {
        let adapters = self.registry.evm_aggregators();
        if adapters.is_empty() {
            warnings.push("no EVM aggregator registered".to_string());
            return false;
        }
        let mut statuses = serde_json::Map::new();
        let mut all_healthy = true;
        for adapter in adapters {
            let health = self.health.health_of(adapter.as_ref()).await;
            statuses.insert(
                adapter.name().to_string(),
                serde_json::to_value(&health.status).unwrap_or(json!("unknown")),
            );
            if !health.is_healthy() {
                all_healthy = false;
                warnings.push(format!("provider {} is {:?}", adapter.name(), health.status));
            }
        }
        details.insert("providers".to_string(), serde_json::Value::Object(statuses));
        all_healthy
    }
}
