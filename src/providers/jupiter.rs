//! Jupiter adapter (Solana router).
//!
//! Quoting goes through Jupiter's v6 quote API. Transaction building and
//! signing stay stubbed at this seam: the gateway does not hold Solana
//! signing machinery, so `build_and_sign` reports the capability as
//! unimplemented rather than pretending.

use async_trait::async_trait;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::AggregatorKeys;
use crate::error::ProviderError;
use crate::registry::ProviderRegistry;
use crate::types::{
    RouteFees, RouteQuote, RouteStep, SignerSecret, StepKind, TokenAmount, UniversalSwapRequest,
};

use super::{ProviderConfig, SolanaRouter, SolanaSwapTx, SwapProvider};

const NAME: &str = "jupiter";
const BASE_URL: &str = "https://quote-api.jup.ag";

pub fn register(registry: &ProviderRegistry, keys: &AggregatorKeys, client: &reqwest::Client) {
    let adapter = JupiterAdapter::new(keys.jupiter.clone(), client.clone());
    registry.register_solana_router(Arc::new(adapter));
}

pub struct JupiterAdapter {
    config: ProviderConfig,
}

impl JupiterAdapter {
    pub fn new(api_key: Option<String>, client: reqwest::Client) -> Self {
        Self {
            config: ProviderConfig::new(NAME, BASE_URL, api_key, client)
                .with_health_path("/v6/program-id-to-label"),
        }
    }
}

/// A plausible SPL mint: base58, 32 bytes decoded.
fn is_valid_mint(address: &str) -> bool {
    bs58::decode(address)
        .into_vec()
        .map(|bytes| bytes.len() == 32)
        .unwrap_or(false)
}

#[async_trait]
impl SwapProvider for JupiterAdapter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

#[async_trait]
impl SolanaRouter for JupiterAdapter {
    async fn quote(&self, req: &UniversalSwapRequest) -> Result<RouteQuote, ProviderError> {
        if !is_valid_mint(&req.sell_token) || !is_valid_mint(&req.buy_token) {
            return Err(ProviderError::Decode {
                provider: NAME,
                message: "token mints must be base58 32-byte addresses".to_string(),
            });
        }
        let slippage_bps = req
            .slippage
            .unwrap_or(crate::types::Slippage::DEFAULT)
            .bps();
        let mut request = self
            .config
            .client
            .get(self.config.url("/v6/quote"))
            .query(&[
                ("inputMint", req.sell_token.as_str()),
                ("outputMint", req.buy_token.as_str()),
                ("amount", &req.sell_amount.to_string()),
                ("slippageBps", &slippage_bps.to_string()),
            ]);
        if let Some(key) = &self.config.api_key {
            request = request.header("x-api-key", key);
        }
        let response = super::send_with_backoff(request, NAME).await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(NAME, status.as_u16(), text));
        }
        let parsed: JupiterQuoteResponse =
            response.json().await.map_err(|e| ProviderError::Decode {
                provider: NAME,
                message: e.to_string(),
            })?;
        let out_amount =
            TokenAmount::from_str(&parsed.out_amount).map_err(|e| ProviderError::Decode {
                provider: NAME,
                message: e,
            })?;
        let price_impact = parsed
            .price_impact_pct
            .as_deref()
            .and_then(|pct| pct.parse::<f64>().ok());
        let steps = parsed
            .route_plan
            .into_iter()
            .map(|leg| RouteStep {
                kind: StepKind::Swap,
                chain_id: "solana".to_string(),
                protocol: leg
                    .swap_info
                    .as_ref()
                    .and_then(|info| info.label.clone()),
                details: leg.raw,
                estimated_time: None,
            })
            .collect();
        Ok(RouteQuote {
            steps,
            total_estimated_out: out_amount,
            fees: RouteFees::default(),
            eta_seconds: Some(5),
            route_id: None,
            price_impact,
            confidence: 0.9,
        })
    }

    /// Stub: Solana transaction assembly and Ed25519 signing are future
    /// adapter work; callers get a typed "unimplemented" error.
    async fn build_and_sign(
        &self,
        _quote: &RouteQuote,
        _keypair: Option<&SignerSecret>,
    ) -> Result<SolanaSwapTx, ProviderError> {
        Err(ProviderError::UnsupportedOperation {
            provider: NAME,
            operation: "solana transaction signing",
        })
    }

    async fn supports_token_pair(&self, sell: &str, buy: &str) -> Result<bool, ProviderError> {
        Ok(is_valid_mint(sell) && is_valid_mint(buy) && sell != buy)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JupiterQuoteResponse {
    out_amount: String,
    #[serde(default)]
    price_impact_pct: Option<String>,
    #[serde(default)]
    route_plan: Vec<JupiterRouteLeg>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JupiterRouteLeg {
    #[serde(default)]
    swap_info: Option<JupiterSwapInfo>,
    #[serde(flatten)]
    raw: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct JupiterSwapInfo {
    #[serde(default)]
    label: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
    const SOL_MINT: &str = "So11111111111111111111111111111111111111112";

    #[test]
    fn mint_validation() {
        assert!(is_valid_mint(USDC_MINT));
        assert!(is_valid_mint(SOL_MINT));
        assert!(!is_valid_mint("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"));
        assert!(!is_valid_mint("short"));
    }

    #[tokio::test]
    async fn token_pair_support_requires_distinct_mints() {
        let adapter = JupiterAdapter::new(None, super::super::http_client());
        assert!(
            adapter
                .supports_token_pair(USDC_MINT, SOL_MINT)
                .await
                .expect("check runs")
        );
        assert!(
            !adapter
                .supports_token_pair(USDC_MINT, USDC_MINT)
                .await
                .expect("check runs")
        );
    }

    #[test]
    fn quote_response_parses() {
        let parsed: JupiterQuoteResponse = serde_json::from_str(
            r#"{"outAmount":"1234500","priceImpactPct":"0.002","routePlan":[{"swapInfo":{"label":"Orca"}}]}"#,
        )
        .expect("parses");
        assert_eq!(parsed.out_amount, "1234500");
        assert_eq!(parsed.route_plan.len(), 1);
    }
}
