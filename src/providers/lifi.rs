//! LiFi adapter.
//!
//! Cross-chain meta-aggregator: `/v1/advanced/routes` composes swaps and
//! bridges across chains into ranked routes. Route execution is client-side
//! in LiFi's model (each step's transaction is signed by the taker), so
//! `execute` stays stubbed at this seam while quoting and status tracking
//! are live.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

use crate::config::AggregatorKeys;
use crate::error::ProviderError;
use crate::network::ExecutionStatus;
use crate::registry::ProviderRegistry;
use crate::types::{
    RouteFees, RouteQuote, RouteStep, StepKind, TokenAmount, UniversalSwapRequest,
};

use super::{
    MetaAggregator, MetaExecution, ProviderConfig, SignerContext, SupportedChainsPair,
    SwapProvider,
};

const NAME: &str = "lifi";
const BASE_URL: &str = "https://li.quest";

pub fn register(registry: &ProviderRegistry, keys: &AggregatorKeys, client: &reqwest::Client) {
    let adapter = LifiAdapter::new(keys.lifi.clone(), client.clone());
    registry.register_meta_aggregator(Arc::new(adapter));
}

pub struct LifiAdapter {
    config: ProviderConfig,
}

impl LifiAdapter {
    pub fn new(api_key: Option<String>, client: reqwest::Client) -> Self {
        Self {
            config: ProviderConfig::new(NAME, BASE_URL, api_key, client)
                .with_health_path("/v1/chains"),
        }
    }

    fn request_builder(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.header("x-lifi-api-key", key),
            None => builder,
        }
    }
}

#[async_trait]
impl SwapProvider for LifiAdapter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

#[async_trait]
impl MetaAggregator for LifiAdapter {
    async fn get_routes(
        &self,
        req: &UniversalSwapRequest,
    ) -> Result<Vec<RouteQuote>, ProviderError> {
        let from_chain = req.source.evm_chain_id().ok_or(ProviderError::Decode {
            provider: NAME,
            message: "lifi routes need numeric source chain".to_string(),
        })?;
        let to_chain = req.destination.evm_chain_id().ok_or(ProviderError::Decode {
            provider: NAME,
            message: "lifi routes need numeric destination chain".to_string(),
        })?;
        let body = LifiRoutesRequest {
            from_chain_id: from_chain,
            to_chain_id: to_chain,
            from_token_address: req.sell_token.clone(),
            to_token_address: req.buy_token.clone(),
            from_amount: req.sell_amount.to_string(),
            from_address: req.taker.clone(),
            options: LifiOptions {
                slippage: f64::from(req.slippage.unwrap_or(crate::types::Slippage::DEFAULT).bps())
                    / 10_000.0,
            },
        };
        let request = self
            .request_builder(
                self.config
                    .client
                    .post(self.config.url("/v1/advanced/routes")),
            )
            .json(&body);
        let response = super::send_with_backoff(request, NAME).await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(NAME, status.as_u16(), text));
        }
        let parsed: LifiRoutesResponse =
            response.json().await.map_err(|e| ProviderError::Decode {
                provider: NAME,
                message: e.to_string(),
            })?;
        Ok(parsed.routes.into_iter().map(into_route).collect())
    }

    /// Route execution is driven by the taker's wallet in LiFi's model; the
    /// gateway does not proxy it.
    async fn execute(
        &self,
        _route_id: &str,
        _signer: &SignerContext,
    ) -> Result<MetaExecution, ProviderError> {
        Err(ProviderError::UnsupportedOperation {
            provider: NAME,
            operation: "server-side route execution",
        })
    }

    async fn status(&self, route_id: &str) -> Result<ExecutionStatus, ProviderError> {
        let request = self
            .request_builder(self.config.client.get(self.config.url("/v1/status")))
            .query(&[("txHash", route_id)]);
        let response = super::send_with_backoff(request, NAME).await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(NAME, status.as_u16(), text));
        }
        let parsed: LifiStatusResponse =
            response.json().await.map_err(|e| ProviderError::Decode {
                provider: NAME,
                message: e.to_string(),
            })?;
        Ok(match parsed.status.as_str() {
            "DONE" => ExecutionStatus::Success,
            "FAILED" => ExecutionStatus::Failed,
            "PARTIAL" => ExecutionStatus::Partial,
            _ => ExecutionStatus::Pending,
        })
    }

    async fn supported_chains(&self) -> Result<SupportedChainsPair, ProviderError> {
        let request = self.request_builder(self.config.client.get(self.config.url("/v1/chains")));
        let response = super::send_with_backoff(request, NAME).await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(NAME, status.as_u16(), text));
        }
        let parsed: LifiChainsResponse =
            response.json().await.map_err(|e| ProviderError::Decode {
                provider: NAME,
                message: e.to_string(),
            })?;
        let chains: Vec<u64> = parsed.chains.into_iter().map(|chain| chain.id).collect();
        Ok(SupportedChainsPair {
            from: chains.clone(),
            to: chains,
        })
    }
}

fn into_route(route: LifiRoute) -> RouteQuote {
    let eta: u64 = route
        .steps
        .iter()
        .filter_map(|step| step.estimate.as_ref().and_then(|e| e.execution_duration))
        .map(|duration| duration as u64)
        .sum();
    let steps = route
        .steps
        .into_iter()
        .map(|step| {
            let kind = match step.kind.as_deref() {
                Some("swap") => StepKind::Swap,
                Some("cross") | Some("lifi") => StepKind::Bridge,
                _ => StepKind::Swap,
            };
            let chain_id = step
                .action
                .as_ref()
                .map(|action| action.from_chain_id.to_string())
                .unwrap_or_default();
            RouteStep {
                kind,
                chain_id,
                details: step.raw,
                protocol: step.tool,
                estimated_time: step
                    .estimate
                    .as_ref()
                    .and_then(|e| e.execution_duration)
                    .map(|duration| duration as u64),
            }
        })
        .collect();
    let total_estimated_out =
        TokenAmount::from_str(&route.to_amount).unwrap_or(TokenAmount::ZERO);
    // Recommended routes carry full confidence; the rest are discounted.
    let confidence = if route.tags.iter().any(|tag| tag == "RECOMMENDED") {
        1.0
    } else {
        0.8
    };
    RouteQuote {
        steps,
        total_estimated_out,
        fees: RouteFees::default(),
        eta_seconds: (eta > 0).then_some(eta),
        route_id: Some(route.id),
        price_impact: None,
        confidence,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LifiRoutesRequest {
    from_chain_id: u64,
    to_chain_id: u64,
    from_token_address: String,
    to_token_address: String,
    from_amount: String,
    from_address: String,
    options: LifiOptions,
}

#[derive(Debug, Serialize)]
struct LifiOptions {
    slippage: f64,
}

#[derive(Debug, Deserialize)]
struct LifiRoutesResponse {
    #[serde(default)]
    routes: Vec<LifiRoute>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LifiRoute {
    id: String,
    to_amount: String,
    #[serde(default)]
    steps: Vec<LifiStep>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LifiStep {
    #[serde(rename = "type")]
    kind: Option<String>,
    tool: Option<String>,
    action: Option<LifiAction>,
    estimate: Option<LifiEstimate>,
    #[serde(flatten)]
    raw: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LifiAction {
    from_chain_id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LifiEstimate {
    #[serde(default)]
    execution_duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct LifiChainsResponse {
    #[serde(default)]
    chains: Vec<LifiChain>,
}

#[derive(Debug, Deserialize)]
struct LifiChain {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct LifiStatusResponse {
    status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn route_mapping_extracts_steps_and_eta() {
        let route: LifiRoute = serde_json::from_value(json!({
            "id": "route-1",
            "toAmount": "990000",
            "tags": ["RECOMMENDED"],
            "steps": [
                {
                    "type": "swap",
                    "tool": "uniswap",
                    "action": {"fromChainId": 1},
                    "estimate": {"executionDuration": 30.0}
                },
                {
                    "type": "cross",
                    "tool": "stargate",
                    "action": {"fromChainId": 1},
                    "estimate": {"executionDuration": 180.0}
                }
            ]
        }))
        .expect("route parses");
        let quote = into_route(route);
        assert_eq!(quote.steps.len(), 2);
        assert_eq!(quote.steps[0].kind, StepKind::Swap);
        assert_eq!(quote.steps[1].kind, StepKind::Bridge);
        assert_eq!(quote.eta_seconds, Some(210));
        assert_eq!(quote.total_estimated_out, TokenAmount::from(990_000u64));
        assert_eq!(quote.confidence, 1.0);
        assert_eq!(quote.route_id.as_deref(), Some("route-1"));
    }

    #[test]
    fn unrecommended_route_is_discounted() {
        let route: LifiRoute = serde_json::from_value(json!({
            "id": "route-2",
            "toAmount": "1",
            "steps": []
        }))
        .expect("route parses");
        assert_eq!(into_route(route).confidence, 0.8);
    }
}
