//! THORChain adapter (native-asset router).
//!
//! Quotes native-L1 swaps (BTC↔ETH↔…) through a THORNode swap-quote
//! endpoint. Settlement on THORChain means depositing to an inbound vault
//! address with a memo; actually constructing and broadcasting that deposit
//! needs per-chain (Bitcoin, Cosmos, …) signing the gateway does not carry,
//! so tracking starts out stubbed as pending.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::AggregatorKeys;
use crate::error::ProviderError;
use crate::network::ExecutionStatus;
use crate::registry::ProviderRegistry;
use crate::types::{
    RouteFees, RouteQuote, RouteStep, StepKind, TokenAmount, UniversalSwapRequest,
};

use super::{NativeRouter, ProviderConfig, SwapProvider};

const NAME: &str = "thorchain";
const BASE_URL: &str = "https://thornode.ninerealms.com";

pub fn register(registry: &ProviderRegistry, _keys: &AggregatorKeys, client: &reqwest::Client) {
    let adapter = ThorchainAdapter::new(client.clone());
    registry.register_native_router(Arc::new(adapter));
}

pub struct ThorchainAdapter {
    config: ProviderConfig,
}

impl ThorchainAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            config: ProviderConfig::new(NAME, BASE_URL, None, client)
                .with_health_path("/thorchain/ping"),
        }
    }

    /// THORChain asset notation, e.g. `BTC.BTC` or `ETH.ETH`.
    fn asset_for(leg: &crate::types::ChainRef, token: &str) -> String {
        if token.contains('.') {
            token.to_string()
        } else {
            let chain = leg.chain.to_ascii_uppercase();
            format!("{chain}.{chain}")
        }
    }
}

#[async_trait]
impl SwapProvider for ThorchainAdapter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

#[async_trait]
impl NativeRouter for ThorchainAdapter {
    async fn quote_btc(&self, req: &UniversalSwapRequest) -> Result<RouteQuote, ProviderError> {
        let from_asset = Self::asset_for(&req.source, &req.sell_token);
        let to_asset = Self::asset_for(&req.destination, &req.buy_token);
        let destination = req.recipient.clone().unwrap_or_else(|| req.taker.clone());
        let request = self
            .config
            .client
            .get(self.config.url("/thorchain/quote/swap"))
            .query(&[
                ("from_asset", from_asset.as_str()),
                ("to_asset", to_asset.as_str()),
                ("amount", &req.sell_amount.to_string()),
                ("destination", &destination),
            ]);
        let response = super::send_with_backoff(request, NAME).await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(NAME, status.as_u16(), text));
        }
        let parsed: ThorQuoteResponse =
            response.json().await.map_err(|e| ProviderError::Decode {
                provider: NAME,
                message: e.to_string(),
            })?;
        let out = TokenAmount::from_str(&parsed.expected_amount_out).map_err(|e| {
            ProviderError::Decode {
                provider: NAME,
                message: e,
            }
        })?;
        let step = RouteStep {
            kind: StepKind::Native,
            chain_id: req.source.chain.clone(),
            details: json!({
                "inboundAddress": parsed.inbound_address,
                "memo": parsed.memo,
                "fromAsset": from_asset,
                "toAsset": to_asset,
            }),
            protocol: Some(NAME.to_string()),
            estimated_time: parsed.total_swap_seconds,
        };
        Ok(RouteQuote {
            steps: vec![step],
            total_estimated_out: out,
            fees: RouteFees {
                gas: TokenAmount::ZERO,
                provider: parsed
                    .fees
                    .as_ref()
                    .and_then(|fees| TokenAmount::from_str(&fees.total).ok())
                    .unwrap_or(TokenAmount::ZERO),
                bridge: None,
                app: None,
            },
            eta_seconds: parsed.total_swap_seconds,
            route_id: None,
            price_impact: None,
            confidence: 0.8,
        })
    }

    /// Stub: deposit broadcasting needs native-chain signing this gateway
    /// does not hold. The memo is acknowledged and tracking starts pending.
    async fn deposit_and_track(
        &self,
        tx: &str,
        memo: &str,
    ) -> Result<ExecutionStatus, ProviderError> {
        tracing::info!(provider = NAME, tx, memo, "deposit tracking requested (stubbed)");
        Ok(ExecutionStatus::Pending)
    }

    async fn supported_destinations(&self) -> Result<Vec<String>, ProviderError> {
        let request = self.config.client.get(self.config.url("/thorchain/pools"));
        let response = super::send_with_backoff(request, NAME).await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(NAME, status.as_u16(), text));
        }
        let pools: Vec<ThorPool> = response.json().await.map_err(|e| ProviderError::Decode {
            provider: NAME,
            message: e.to_string(),
        })?;
        let mut chains: Vec<String> = pools
            .into_iter()
            .filter_map(|pool| {
                pool.asset
                    .split_once('.')
                    .map(|(chain, _)| chain.to_string())
            })
            .collect();
        chains.sort();
        chains.dedup();
        Ok(chains)
    }
}

#[derive(Debug, Deserialize)]
struct ThorQuoteResponse {
    expected_amount_out: String,
    #[serde(default)]
    inbound_address: Option<String>,
    #[serde(default)]
    memo: Option<String>,
    #[serde(default)]
    fees: Option<ThorFees>,
    #[serde(default)]
    total_swap_seconds: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ThorFees {
    total: String,
}

#[derive(Debug, Deserialize)]
struct ThorPool {
    asset: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Ecosystem, TokenStandard};
    use crate::types::ChainRef;

    #[test]
    fn asset_notation() {
        let btc_leg = ChainRef {
            chain: "btc".to_string(),
            ecosystem: Ecosystem::Bitcoin,
            standard: TokenStandard::Native,
        };
        assert_eq!(ThorchainAdapter::asset_for(&btc_leg, "btc"), "BTC.BTC");
        // Full THORChain notation passes through untouched.
        assert_eq!(
            ThorchainAdapter::asset_for(&btc_leg, "ETH.USDC-0XA0B8"),
            "ETH.USDC-0XA0B8"
        );
    }

    #[test]
    fn quote_response_parses() {
        let parsed: ThorQuoteResponse = serde_json::from_str(
            r#"{
                "expected_amount_out": "9850000",
                "inbound_address": "bc1qabc",
                "memo": "=:ETH.ETH:0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
                "fees": {"total": "150000"},
                "total_swap_seconds": 600
            }"#,
        )
        .expect("parses");
        assert_eq!(parsed.expected_amount_out, "9850000");
        assert_eq!(parsed.total_swap_seconds, Some(600));
    }
}
