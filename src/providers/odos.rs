//! Odos adapter.
//!
//! Odos quotes in two phases: `/sor/quote/v2` prices the path and returns an
//! opaque `pathId`, `/sor/assemble` turns that pathId into calldata. The
//! upstream documents a 60-second pathId lifetime; this adapter treats a
//! pathId older than [`PATH_ID_MAX_AGE`] as expired (the 5-second margin
//! absorbs assemble-call latency) and re-quotes exactly once when assembly
//! reports expiry.

use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::AggregatorKeys;
use crate::error::ProviderError;
use crate::network::ApprovalStrategy;
use crate::registry::ProviderRegistry;
use crate::types::{SwapQuote, SwapRequest, TokenAmount, TxPayload};

use super::{OnChainAggregator, ProviderConfig, SwapProvider};

const NAME: &str = "odos";
const BASE_URL: &str = "https://api.odos.xyz";
const SUPPORTED_CHAINS: &[u64] = &[1, 10, 56, 137, 324, 8453, 42161, 43114];

/// A pathId older than this is not worth sending to `/sor/assemble`.
/// Upstream lifetime is 60 s; the margin covers the assemble round trip.
const PATH_ID_MAX_AGE: Duration = Duration::from_secs(55);

/// Register the adapter. Odos needs no API key; the referral code is
/// optional and forwarded when present.
pub fn register(registry: &ProviderRegistry, keys: &AggregatorKeys, client: &reqwest::Client) {
    let adapter = OdosAdapter::new(keys.odos_referral_code.clone(), client.clone());
    registry.register_evm_aggregator(Arc::new(adapter));
}

pub struct OdosAdapter {
    config: ProviderConfig,
    referral_code: Option<u64>,
}

struct PricedPath {
    path_id: String,
    out_amount: TokenAmount,
    price_impact: Option<f64>,
    gas_estimate: Option<u64>,
    obtained: Instant,
}

impl OdosAdapter {
    pub fn new(referral_code: Option<String>, client: reqwest::Client) -> Self {
        let referral_code = referral_code.and_then(|code| code.parse().ok());
        Self {
            config: ProviderConfig::new(NAME, BASE_URL, None, client)
                .with_health_path("/info/chains"),
            referral_code,
        }
    }

    async fn price_path(&self, req: &SwapRequest) -> Result<PricedPath, ProviderError> {
        let body = OdosQuoteRequest {
            chain_id: req.chain_id,
            input_tokens: vec![OdosInputToken {
                token_address: format!("{:#x}", req.sell_token),
                amount: req.sell_amount.to_string(),
            }],
            output_tokens: vec![OdosOutputToken {
                token_address: format!("{:#x}", req.buy_token),
                proportion: 1,
            }],
            user_addr: format!("{:#x}", req.taker),
            slippage_limit_percent: f64::from(req.slippage().bps()) / 100.0,
            referral_code: self.referral_code,
            compact: true,
        };
        let request = self
            .config
            .client
            .post(self.config.url("/sor/quote/v2"))
            .json(&body);
        let response = super::send_with_backoff(request, NAME).await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(NAME, status.as_u16(), text));
        }
        let parsed: OdosQuoteResponse =
            response.json().await.map_err(|e| ProviderError::Decode {
                provider: NAME,
                message: e.to_string(),
            })?;
        let out_amount = parsed
            .out_amounts
            .first()
            .ok_or(ProviderError::Decode {
                provider: NAME,
                message: "quote without outAmounts".to_string(),
            })?
            .clone();
        let out_amount = TokenAmount::from_str(&out_amount).map_err(|e| ProviderError::Decode {
            provider: NAME,
            message: e,
        })?;
        Ok(PricedPath {
            path_id: parsed.path_id,
            out_amount,
            price_impact: parsed.price_impact,
            gas_estimate: parsed.gas_estimate.map(|gas| gas as u64),
            obtained: Instant::now(),
        })
    }

    async fn assemble(
        &self,
        req: &SwapRequest,
        path: &PricedPath,
    ) -> Result<OdosAssembleResponse, ProviderError> {
        if path.obtained.elapsed() > PATH_ID_MAX_AGE {
            return Err(ProviderError::QuoteExpired {
                provider: NAME,
                message: format!("pathId older than {}s", PATH_ID_MAX_AGE.as_secs()),
            });
        }
        let body = OdosAssembleRequest {
            user_addr: format!("{:#x}", req.taker),
            path_id: path.path_id.clone(),
            simulate: false,
            receiver: req
                .recipient
                .map(|recipient| format!("{recipient:#x}")),
        };
        let request = self
            .config
            .client
            .post(self.config.url("/sor/assemble"))
            .json(&body);
        let response = super::send_with_backoff(request, NAME).await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            // Odos reports an aged-out pathId as a client error mentioning
            // the path; normalize it so the retry layer can react.
            if text.contains("pathId") || status.as_u16() == 410 {
                return Err(ProviderError::QuoteExpired {
                    provider: NAME,
                    message: text,
                });
            }
            return Err(ProviderError::from_status(NAME, status.as_u16(), text));
        }
        response.json().await.map_err(|e| ProviderError::Decode {
            provider: NAME,
            message: e.to_string(),
        })
    }

    /// Price and assemble, transparently refreshing an expired pathId once.
    async fn quote_and_assemble(
        &self,
        req: &SwapRequest,
    ) -> Result<(PricedPath, OdosAssembleResponse), ProviderError> {
        let path = self.price_path(req).await?;
        match self.assemble(req, &path).await {
            Ok(assembled) => Ok((path, assembled)),
            Err(ProviderError::QuoteExpired { .. }) => {
                tracing::info!("odos pathId expired, refreshing once");
                let fresh = self.price_path(req).await?;
                let assembled = self.assemble(req, &fresh).await?;
                Ok((fresh, assembled))
            }
            Err(other) => Err(other),
        }
    }
}

#[async_trait]
impl SwapProvider for OdosAdapter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

#[async_trait]
impl OnChainAggregator for OdosAdapter {
    async fn get_quote(&self, req: &SwapRequest, _strict: bool) -> Result<SwapQuote, ProviderError> {
        if !self.supports_chain(req.chain_id) {
            return Err(ProviderError::UnsupportedChain {
                provider: NAME,
                chain_id: req.chain_id,
            });
        }
        let (path, assembled) = self.quote_and_assemble(req).await?;
        let transaction = assembled.transaction.ok_or(ProviderError::Decode {
            provider: NAME,
            message: "assemble without transaction".to_string(),
        })?;
        let to = Address::from_str(&transaction.to).map_err(|e| ProviderError::Decode {
            provider: NAME,
            message: format!("bad transaction.to: {e}"),
        })?;
        let data = Bytes::from_str(&transaction.data).map_err(|e| ProviderError::Decode {
            provider: NAME,
            message: format!("bad transaction.data: {e}"),
        })?;
        let min_buy_amount = TokenAmount(req.slippage().min_out(path.out_amount.0));
        Ok(SwapQuote {
            sell_token: req.sell_token,
            buy_token: req.buy_token,
            sell_amount: req.sell_amount,
            buy_amount: path.out_amount,
            min_buy_amount,
            to,
            data,
            value: transaction.value.unwrap_or_default(),
            gas: transaction.gas.or(path.gas_estimate.map(TokenAmount::from)),
            gas_price: transaction.gas_price,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            // Odos approvals go to its per-chain router, the tx target.
            allowance_target: Some(to),
            aggregator: NAME.to_string(),
            price_impact: path.price_impact,
            estimated_gas: path.gas_estimate.map(TokenAmount::from),
            permit2: None,
            approval_strategy: Some(ApprovalStrategy::AllowanceHolder),
        })
    }

    async fn build_tx(&self, req: &SwapRequest) -> Result<TxPayload, ProviderError> {
        let quote = self.get_quote(req, true).await?;
        Ok(TxPayload {
            to: quote.to,
            data: quote.data,
            value: quote.value,
            gas_limit: quote.gas,
            gas_price: quote.gas_price,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
        })
    }

    fn supports_chain(&self, chain_id: u64) -> bool {
        SUPPORTED_CHAINS.contains(&chain_id)
    }

    fn supported_chains(&self) -> Vec<u64> {
        SUPPORTED_CHAINS.to_vec()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OdosQuoteRequest {
    chain_id: u64,
    input_tokens: Vec<OdosInputToken>,
    output_tokens: Vec<OdosOutputToken>,
    user_addr: String,
    slippage_limit_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    referral_code: Option<u64>,
    compact: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OdosInputToken {
    token_address: String,
    amount: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OdosOutputToken {
    token_address: String,
    proportion: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OdosQuoteResponse {
    path_id: String,
    out_amounts: Vec<String>,
    #[serde(default)]
    price_impact: Option<f64>,
    #[serde(default)]
    gas_estimate: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OdosAssembleRequest {
    user_addr: String,
    path_id: String,
    simulate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    receiver: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OdosAssembleResponse {
    #[serde(default)]
    transaction: Option<OdosTransaction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OdosTransaction {
    to: String,
    data: String,
    #[serde(default)]
    value: Option<TokenAmount>,
    #[serde(default)]
    gas: Option<TokenAmount>,
    #[serde(default)]
    gas_price: Option<TokenAmount>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_age_threshold_leaves_assemble_margin() {
        // 60 s upstream lifetime minus the assemble round trip.
        assert_eq!(PATH_ID_MAX_AGE, Duration::from_secs(55));
        let Some(obtained) = Instant::now().checked_sub(Duration::from_secs(56)) else {
            return;
        };
        assert!(obtained.elapsed() > PATH_ID_MAX_AGE);
    }

    #[test]
    fn quote_response_parses() {
        let parsed: OdosQuoteResponse = serde_json::from_str(
            r#"{"pathId":"deadbeef","outAmounts":["123450000"],"priceImpact":-0.01,"gasEstimate":231000.0}"#,
        )
        .expect("parses");
        assert_eq!(parsed.path_id, "deadbeef");
        assert_eq!(parsed.out_amounts[0], "123450000");
    }

    #[test]
    fn referral_code_must_be_numeric() {
        let adapter = OdosAdapter::new(Some("12345".to_string()), super::super::http_client());
        assert_eq!(adapter.referral_code, Some(12345));
        let adapter = OdosAdapter::new(Some("not-a-code".to_string()), super::super::http_client());
        assert_eq!(adapter.referral_code, None);
    }
}
