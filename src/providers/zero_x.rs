//! 0x adapter.
//!
//! Talks to the 0x Swap API v2, which splits quoting by approval strategy:
//! `/swap/allowance-holder/quote` for traditional approvals and
//! `/swap/permit2/quote` (plus `/price`) for gas-less Permit2 flows. The
//! permit2 endpoints attach the EIP-712 bundle this gateway signs and
//! splices.

use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::AggregatorKeys;
use crate::error::ProviderError;
use crate::network::{ApprovalStrategy, PERMIT2_ADDRESS};
use crate::registry::ProviderRegistry;
use crate::types::{Permit2Data, SwapQuote, SwapRequest, TokenAmount, TxPayload};

use super::{EvmSpenderProvider, OnChainAggregator, ProviderConfig, SwapProvider};

const NAME: &str = "0x";
const BASE_URL: &str = "https://api.0x.org";
const SUPPORTED_CHAINS: &[u64] = &[1, 10, 56, 137, 324, 8453, 42161, 43114];

/// Register the adapter when its API key is configured.
pub fn register(registry: &ProviderRegistry, keys: &AggregatorKeys, client: &reqwest::Client) {
    match &keys.zerox {
        Some(api_key) => {
            let adapter = ZeroXAdapter::new(api_key.clone(), client.clone());
            registry.register_evm_aggregator(Arc::new(adapter));
        }
        None => tracing::warn!("ZEROX_API_KEY not set, 0x adapter not registered"),
    }
}

pub struct ZeroXAdapter {
    config: ProviderConfig,
    /// Spenders observed in quote responses, per chain.
    seen_spenders: DashMap<u64, Address>,
}

impl ZeroXAdapter {
    pub fn new(api_key: String, client: reqwest::Client) -> Self {
        Self {
            config: ProviderConfig::new(NAME, BASE_URL, Some(api_key), client)
                .with_health_path("/swap/permit2/price"),
            seen_spenders: DashMap::new(),
        }
    }

    async fn fetch_quote(
        &self,
        path: &str,
        req: &SwapRequest,
        strategy: ApprovalStrategy,
        strict: bool,
    ) -> Result<SwapQuote, ProviderError> {
        let api_key = self.config.api_key.as_deref().ok_or(
            ProviderError::MissingApiKey {
                provider: NAME,
                env_var: "ZEROX_API_KEY",
            },
        )?;
        let request = self
            .config
            .client
            .get(self.config.url(path))
            .header("0x-api-key", api_key)
            .header("0x-version", "v2")
            .query(&[
                ("chainId", req.chain_id.to_string()),
                ("sellToken", format!("{:#x}", req.sell_token)),
                ("buyToken", format!("{:#x}", req.buy_token)),
                ("sellAmount", req.sell_amount.to_string()),
                ("taker", format!("{:#x}", req.taker)),
                ("slippageBps", req.slippage().bps().to_string()),
            ]);
        let response = super::send_with_backoff(request, NAME).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(NAME, status.as_u16(), body));
        }
        let body: ZeroXQuoteResponse =
            response.json().await.map_err(|e| ProviderError::Decode {
                provider: NAME,
                message: e.to_string(),
            })?;
        self.into_quote(req, body, strategy, strict)
    }

    fn into_quote(
        &self,
        req: &SwapRequest,
        body: ZeroXQuoteResponse,
        strategy: ApprovalStrategy,
        strict: bool,
    ) -> Result<SwapQuote, ProviderError> {
        if !body.liquidity_available.unwrap_or(true) {
            return Err(ProviderError::Upstream {
                provider: NAME,
                status: 200,
                message: "no liquidity for this pair".to_string(),
            });
        }
        if strict {
            if let Some(issues) = &body.issues {
                if let Some(balance) = &issues.balance {
                    return Err(ProviderError::Upstream {
                        provider: NAME,
                        status: 200,
                        message: format!(
                            "taker balance too low: has {}, needs {}",
                            balance.actual, balance.expected
                        ),
                    });
                }
            }
        }
        let transaction = body.transaction.ok_or(ProviderError::Decode {
            provider: NAME,
            message: "quote without transaction payload".to_string(),
        })?;
        let allowance_target = match strategy {
            ApprovalStrategy::Permit2 => Some(PERMIT2_ADDRESS),
            ApprovalStrategy::AllowanceHolder => body
                .issues
                .as_ref()
                .and_then(|issues| issues.allowance.as_ref())
                .map(|allowance| allowance.spender),
        };
        if let Some(spender) = allowance_target {
            self.seen_spenders.insert(req.chain_id, spender);
        }
        let to = Address::from_str(&transaction.to).map_err(|e| ProviderError::Decode {
            provider: NAME,
            message: format!("bad transaction.to: {e}"),
        })?;
        let data = parse_hex_data(&transaction.data)?;
        Ok(SwapQuote {
            sell_token: req.sell_token,
            buy_token: req.buy_token,
            sell_amount: body
                .sell_amount
                .unwrap_or(req.sell_amount),
            buy_amount: body.buy_amount,
            min_buy_amount: body.min_buy_amount.unwrap_or(body.buy_amount),
            to,
            data,
            value: transaction.value.unwrap_or_default(),
            gas: transaction.gas,
            gas_price: transaction.gas_price,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            allowance_target,
            aggregator: NAME.to_string(),
            price_impact: None,
            estimated_gas: transaction.gas,
            permit2: body.permit2,
            approval_strategy: Some(strategy),
        })
    }
}

#[async_trait]
impl SwapProvider for ZeroXAdapter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

#[async_trait]
impl OnChainAggregator for ZeroXAdapter {
    async fn get_quote(&self, req: &SwapRequest, strict: bool) -> Result<SwapQuote, ProviderError> {
        if !self.supports_chain(req.chain_id) {
            return Err(ProviderError::UnsupportedChain {
                provider: NAME,
                chain_id: req.chain_id,
            });
        }
        match req.approval_strategy {
            Some(ApprovalStrategy::Permit2) => {
                self.fetch_quote("/swap/permit2/quote", req, ApprovalStrategy::Permit2, strict)
                    .await
            }
            _ => {
                self.fetch_quote(
                    "/swap/allowance-holder/quote",
                    req,
                    ApprovalStrategy::AllowanceHolder,
                    strict,
                )
                .await
            }
        }
    }

    async fn build_tx(&self, req: &SwapRequest) -> Result<TxPayload, ProviderError> {
        let quote = self.get_quote(req, true).await?;
        Ok(TxPayload {
            to: quote.to,
            data: quote.data,
            value: quote.value,
            gas_limit: quote.gas,
            gas_price: quote.gas_price,
            max_fee_per_gas: quote.max_fee_per_gas,
            max_priority_fee_per_gas: quote.max_priority_fee_per_gas,
        })
    }

    fn supports_chain(&self, chain_id: u64) -> bool {
        SUPPORTED_CHAINS.contains(&chain_id)
    }

    fn supported_chains(&self) -> Vec<u64> {
        SUPPORTED_CHAINS.to_vec()
    }

    fn spender_provider(&self) -> Option<&dyn EvmSpenderProvider> {
        Some(self)
    }

    async fn allowance_holder_quote(&self, req: &SwapRequest) -> Result<SwapQuote, ProviderError> {
        self.fetch_quote(
            "/swap/allowance-holder/quote",
            req,
            ApprovalStrategy::AllowanceHolder,
            true,
        )
        .await
    }

    async fn permit2_quote(&self, req: &SwapRequest) -> Result<SwapQuote, ProviderError> {
        self.fetch_quote("/swap/permit2/quote", req, ApprovalStrategy::Permit2, true)
            .await
    }

    async fn permit2_price(&self, req: &SwapRequest) -> Result<SwapQuote, ProviderError> {
        self.fetch_quote("/swap/permit2/price", req, ApprovalStrategy::Permit2, false)
            .await
    }
}

#[async_trait]
impl EvmSpenderProvider for ZeroXAdapter {
    /// Permit2 is a constant; the allowance holder is whatever the last
    /// quote on this chain reported. Unknown chains defer to the caller's
    /// probe-and-fallback path.
    async fn spender_address(
        &self,
        chain_id: u64,
        strategy: ApprovalStrategy,
    ) -> Result<Address, ProviderError> {
        match strategy {
            ApprovalStrategy::Permit2 => Ok(PERMIT2_ADDRESS),
            ApprovalStrategy::AllowanceHolder => self
                .seen_spenders
                .get(&chain_id)
                .map(|entry| *entry.value())
                .ok_or(ProviderError::UnsupportedOperation {
                    provider: NAME,
                    operation: "spender_address before first quote",
                }),
        }
    }
}

fn parse_hex_data(data: &str) -> Result<Bytes, ProviderError> {
    Bytes::from_str(data).map_err(|e| ProviderError::Decode {
        provider: NAME,
        message: format!("bad transaction.data: {e}"),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZeroXQuoteResponse {
    buy_amount: TokenAmount,
    #[serde(default)]
    min_buy_amount: Option<TokenAmount>,
    #[serde(default)]
    sell_amount: Option<TokenAmount>,
    #[serde(default)]
    liquidity_available: Option<bool>,
    #[serde(default)]
    transaction: Option<ZeroXTransaction>,
    #[serde(default)]
    issues: Option<ZeroXIssues>,
    #[serde(default)]
    permit2: Option<Permit2Data>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZeroXTransaction {
    to: String,
    data: String,
    #[serde(default)]
    gas: Option<TokenAmount>,
    #[serde(default)]
    gas_price: Option<TokenAmount>,
    #[serde(default)]
    value: Option<TokenAmount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZeroXIssues {
    #[serde(default)]
    allowance: Option<ZeroXAllowanceIssue>,
    #[serde(default)]
    balance: Option<ZeroXBalanceIssue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZeroXAllowanceIssue {
    spender: Address,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZeroXBalanceIssue {
    expected: String,
    actual: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn adapter() -> ZeroXAdapter {
        ZeroXAdapter::new("test-key".to_string(), super::super::http_client())
    }

    fn request() -> SwapRequest {
        SwapRequest {
            chain_id: 1,
            sell_token: Address::repeat_byte(1),
            buy_token: Address::repeat_byte(2),
            sell_amount: TokenAmount::from(100_000_000_000_000u64),
            taker: Address::repeat_byte(3),
            recipient: None,
            slippage: None,
            deadline: None,
            aggregator: None,
            approval_strategy: None,
        }
    }

    #[test]
    fn quote_response_maps_onto_domain_quote() {
        let body: ZeroXQuoteResponse = serde_json::from_value(json!({
            "buyAmount": "250000000",
            "minBuyAmount": "247500000",
            "liquidityAvailable": true,
            "transaction": {
                "to": "0x0000000000001ff3684f28c67538d4d072c22734",
                "data": "0xabcdef",
                "gas": "185000",
                "value": "0"
            },
            "issues": {
                "allowance": {"spender": "0x0000000000001ff3684f28c67538d4d072c22734"}
            }
        }))
        .expect("response parses");

        let adapter = adapter();
        let quote = adapter
            .into_quote(&request(), body, ApprovalStrategy::AllowanceHolder, true)
            .expect("maps");
        assert_eq!(quote.aggregator, "0x");
        assert_eq!(quote.buy_amount, TokenAmount::from(250_000_000u64));
        assert_eq!(quote.min_buy_amount, TokenAmount::from(247_500_000u64));
        assert!(quote.validate().is_ok());
        assert_eq!(
            quote.allowance_target,
            Some(Address::from_str("0x0000000000001ff3684f28c67538d4d072c22734").expect("addr"))
        );
        // The observed spender now backs the narrow capability.
        assert!(adapter.seen_spenders.contains_key(&1));
    }

    #[test]
    fn strict_mode_rejects_balance_issues() {
        let body: ZeroXQuoteResponse = serde_json::from_value(json!({
            "buyAmount": "1",
            "transaction": {"to": "0x0000000000001ff3684f28c67538d4d072c22734", "data": "0x"},
            "issues": {"balance": {"expected": "100", "actual": "1"}}
        }))
        .expect("response parses");
        let err = adapter()
            .into_quote(&request(), body, ApprovalStrategy::AllowanceHolder, true)
            .expect_err("balance issue rejected");
        assert!(matches!(err, ProviderError::Upstream { .. }));
    }

    #[test]
    fn missing_liquidity_is_an_upstream_error() {
        let body: ZeroXQuoteResponse = serde_json::from_value(json!({
            "buyAmount": "0",
            "liquidityAvailable": false
        }))
        .expect("response parses");
        assert!(
            adapter()
                .into_quote(&request(), body, ApprovalStrategy::Permit2, false)
                .is_err()
        );
    }

    #[test]
    fn chain_table() {
        let adapter = adapter();
        assert!(adapter.supports_chain(1));
        assert!(adapter.supports_chain(8453));
        assert!(!adapter.supports_chain(59144));
    }
}
