//! Provider adapter capability traits.
//!
//! Every adapter exposes the universal [`SwapProvider`] capability (name,
//! health, config). On top of that, one capability set per provider category:
//! [`OnChainAggregator`] for same-chain EVM aggregators, [`MetaAggregator`]
//! for cross-chain meta-aggregators, [`SolanaRouter`], and [`NativeRouter`]
//! for memo-based native-asset routers.
//!
//! Optional EVM-only extensions (dynamic spender resolution) live on the
//! narrower [`EvmSpenderProvider`] trait; call sites probe for it through
//! [`OnChainAggregator::spender_provider`] instead of downcasting.

use alloy::primitives::Address;
use async_trait::async_trait;
use std::time::{Duration, Instant};

use crate::error::ProviderError;
use crate::network::{ApprovalStrategy, ExecutionStatus};
use crate::types::{
    HealthStatus, ProviderHealth, RouteQuote, SignerSecret, SwapQuote, SwapRequest, TxPayload,
    UniversalSwapRequest, UnixTimestamp,
};

pub mod jupiter;
pub mod lifi;
pub mod odos;
pub mod thorchain;
pub mod zero_x;

/// Timeout for quote and route calls to upstream aggregators.
pub const QUOTE_TIMEOUT: Duration = Duration::from_secs(15);

/// Timeout for health probes.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Probe latency past which an otherwise reachable provider is reported
/// degraded rather than healthy.
const DEGRADED_LATENCY: Duration = Duration::from_millis(2_500);

/// Static wiring of one adapter: identity, endpoint, credential, and the
/// HTTP client it talks through.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: &'static str,
    pub base_url: String,
    pub api_key: Option<String>,
    /// Relative path probed by the default health check.
    pub health_path: &'static str,
    pub client: reqwest::Client,
}

impl ProviderConfig {
    pub fn new(
        name: &'static str,
        base_url: impl Into<String>,
        api_key: Option<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name,
            base_url: base_url.into(),
            api_key,
            health_path: "/",
            client,
        }
    }

    pub fn with_health_path(mut self, path: &'static str) -> Self {
        self.health_path = path;
        self
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Shared outbound HTTP client for adapters. Per-call timeout, rustls TLS.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(QUOTE_TIMEOUT)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("reqwest client construction cannot fail with static options")
}

/// Send a request, retrying upstream 429s and transport errors with a short
/// exponential backoff. Other statuses are returned as-is for the caller's
/// status mapping.
pub async fn send_with_backoff(
    request: reqwest::RequestBuilder,
    provider: &'static str,
) -> Result<reqwest::Response, ProviderError> {
    const ATTEMPTS: u32 = 3;
    let mut delay = Duration::from_millis(500);
    let mut last_message = String::new();
    for attempt in 1..=ATTEMPTS {
        let current = request.try_clone().ok_or(ProviderError::Network {
            provider,
            message: "request is not retryable".to_string(),
        })?;
        match current.send().await {
            Ok(response) if response.status().as_u16() == 429 && attempt < ATTEMPTS => {
                tracing::warn!(provider, attempt, "rate limited upstream, backing off");
                last_message = "rate limited".to_string();
            }
            Ok(response) => return Ok(response),
            Err(e) => {
                if attempt == ATTEMPTS {
                    return Err(ProviderError::Network {
                        provider,
                        message: e.to_string(),
                    });
                }
                tracing::warn!(provider, attempt, error = %e, "transport error, backing off");
                last_message = e.to_string();
            }
        }
        tokio::time::sleep(delay).await;
        delay *= 2;
    }
    Err(ProviderError::Network {
        provider,
        message: last_message,
    })
}

/// Universal capability implemented by every adapter.
#[async_trait]
pub trait SwapProvider: Send + Sync {
    /// Stable adapter identifier, also the registry key.
    fn name(&self) -> &'static str;

    fn config(&self) -> &ProviderConfig;

    /// Probe the upstream API once and report liveness. The default pings
    /// the configured health path and classifies by latency; adapters with a
    /// richer status endpoint override this.
    async fn health(&self) -> ProviderHealth {
        let config = self.config();
        probe_endpoint(config.name, &config.client, &config.url(config.health_path)).await
    }
}

/// One bounded GET against `url`, classified into a [`ProviderHealth`].
pub async fn probe_endpoint(
    name: &'static str,
    client: &reqwest::Client,
    url: &str,
) -> ProviderHealth {
    let started = Instant::now();
    let response = client.get(url).timeout(PROBE_TIMEOUT).send().await;
    let latency = started.elapsed();
    match response {
        // Any HTTP answer proves the service is up; auth errors on the probe
        // path are not an outage.
        Ok(_) => {
            let status = if latency > DEGRADED_LATENCY {
                HealthStatus::Degraded
            } else {
                HealthStatus::Healthy
            };
            ProviderHealth {
                name: name.to_string(),
                status,
                latency_ms: Some(latency.as_millis() as u64),
                last_check: UnixTimestamp::now_or_epoch(),
                error_rate: Some(0.0),
            }
        }
        Err(e) => {
            tracing::warn!(provider = name, error = %e, "health probe failed");
            ProviderHealth::failed(name)
        }
    }
}

/// Same-chain EVM aggregators (0x, Odos, …).
#[async_trait]
pub trait OnChainAggregator: SwapProvider {
    /// Fetch an executable quote. `strict` requests upstream-side validation
    /// of balances and allowances where the API distinguishes the two modes.
    async fn get_quote(&self, req: &SwapRequest, strict: bool) -> Result<SwapQuote, ProviderError>;

    /// Assemble the transaction payload for a request, where the upstream
    /// separates pricing from assembly.
    async fn build_tx(&self, req: &SwapRequest) -> Result<TxPayload, ProviderError>;

    fn supports_chain(&self, chain_id: u64) -> bool;

    fn supported_chains(&self) -> Vec<u64>;

    /// Narrow spender-resolution capability, when this adapter has one.
    fn spender_provider(&self) -> Option<&dyn EvmSpenderProvider> {
        None
    }

    /// Quote via the traditional allowance path. Defaults to the plain quote.
    async fn allowance_holder_quote(&self, req: &SwapRequest) -> Result<SwapQuote, ProviderError> {
        self.get_quote(req, false).await
    }

    /// Quote carrying a Permit2 typed-data block, for gas-less approval.
    async fn permit2_quote(&self, _req: &SwapRequest) -> Result<SwapQuote, ProviderError> {
        Err(ProviderError::UnsupportedOperation {
            provider: self.name(),
            operation: "permit2_quote",
        })
    }

    /// Indicative (non-committal) Permit2 price.
    async fn permit2_price(&self, _req: &SwapRequest) -> Result<SwapQuote, ProviderError> {
        Err(ProviderError::UnsupportedOperation {
            provider: self.name(),
            operation: "permit2_price",
        })
    }
}

/// Dynamic spender-address resolution, exposed by adapters whose upstream
/// publishes per-chain approval targets.
#[async_trait]
pub trait EvmSpenderProvider: Send + Sync {
    async fn spender_address(
        &self,
        chain_id: u64,
        strategy: ApprovalStrategy,
    ) -> Result<Address, ProviderError>;
}

/// Transaction ids produced by a meta-aggregator execution.
#[derive(Debug, Clone)]
pub struct MetaExecution {
    pub txids: Vec<String>,
}

/// Chains a meta-aggregator can route from and to.
#[derive(Debug, Clone, Default)]
pub struct SupportedChainsPair {
    pub from: Vec<u64>,
    pub to: Vec<u64>,
}

/// Signing context handed to meta-aggregator execution. The secret is a
/// per-request transient.
pub struct SignerContext {
    pub taker: String,
    pub secret: SignerSecret,
}

/// Cross-chain meta-aggregators (LiFi, Socket, Rango, …).
#[async_trait]
pub trait MetaAggregator: SwapProvider {
    async fn get_routes(&self, req: &UniversalSwapRequest)
    -> Result<Vec<RouteQuote>, ProviderError>;

    async fn execute(
        &self,
        route_id: &str,
        signer: &SignerContext,
    ) -> Result<MetaExecution, ProviderError>;

    async fn status(&self, route_id: &str) -> Result<ExecutionStatus, ProviderError>;

    async fn supported_chains(&self) -> Result<SupportedChainsPair, ProviderError>;
}

/// A raw (optionally signed) Solana transaction plus its id once submitted.
#[derive(Debug, Clone)]
pub struct SolanaSwapTx {
    pub raw_tx: String,
    pub txid: Option<String>,
    pub instructions: Option<serde_json::Value>,
}

/// Solana swap routers (Jupiter, …). Signing and submission are stubbed at
/// this seam; quoting is real.
#[async_trait]
pub trait SolanaRouter: SwapProvider {
    async fn quote(&self, req: &UniversalSwapRequest) -> Result<RouteQuote, ProviderError>;

    async fn build_and_sign(
        &self,
        quote: &RouteQuote,
        keypair: Option<&SignerSecret>,
    ) -> Result<SolanaSwapTx, ProviderError>;

    async fn supports_token_pair(&self, sell: &str, buy: &str) -> Result<bool, ProviderError>;
}

/// Native-asset routers settling through memo deposits (THORChain, Maya).
#[async_trait]
pub trait NativeRouter: SwapProvider {
    async fn quote_btc(&self, req: &UniversalSwapRequest) -> Result<RouteQuote, ProviderError>;

    async fn deposit_and_track(
        &self,
        tx: &str,
        memo: &str,
    ) -> Result<ExecutionStatus, ProviderError>;

    async fn supported_destinations(&self) -> Result<Vec<String>, ProviderError>;
}
