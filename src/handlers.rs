//! HTTP endpoints of the swap gateway.
//!
//! Success responses share the envelope `{success, data, timestamp}`; errors
//! carry `{message, error, details}` with status codes mapped from the
//! [`GatewayError`] taxonomy. All routes live under `/universal-swap` and
//! `/swap-analysis`.

use alloy::network::TransactionBuilder;
use alloy::rpc::types::TransactionRequest;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;

use crate::approval::ApprovalWorkflow;
use crate::chainlist::ChainListService;
use crate::chains::ChainProviders;
use crate::config::Config;
use crate::error::{GatewayError, ProviderError};
use crate::execution::ExecutionCoordinator;
use crate::health::HealthMonitor;
use crate::network::{
    AggregatorType, ApprovalStrategy, Ecosystem, ExecutionStatus, ProviderCategory, SwapType,
};
use crate::orchestrator::QuoteOrchestrator;
use crate::precheck::PreCheck;
use crate::quote_cache::SupportedQuoteCache;
use crate::registry::ProviderRegistry;
use crate::routing::SwapClassifier;
use crate::types::{
    ChainRef, QuoteResult, SignerSecret, SwapRequest, TokenAmount, UniversalSwapRequest,
    UnixTimestamp,
};

/// Shared state behind every handler.
pub struct AppState {
    pub config: Config,
    pub registry: Arc<ProviderRegistry>,
    pub health: Arc<HealthMonitor>,
    pub quote_cache: Arc<SupportedQuoteCache>,
    pub chains: Arc<ChainProviders>,
    pub classifier: Arc<SwapClassifier>,
    pub orchestrator: Arc<QuoteOrchestrator>,
    pub approval: Arc<ApprovalWorkflow>,
    pub precheck: Arc<PreCheck>,
    pub execution: Arc<ExecutionCoordinator>,
    pub chainlist: Arc<ChainListService>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/universal-swap/quote", post(post_quote))
        .route("/universal-swap/pre-check", post(post_pre_check))
        .route("/universal-swap/execute", post(post_execute))
        .route("/universal-swap/status", post(post_status))
        .route("/universal-swap/approval/status", post(post_approval_status))
        .route("/universal-swap/approval/execute", post(post_approval_execute))
        .route("/universal-swap/supported-chains", get(get_supported_chains))
        .route("/universal-swap/aggregators", get(get_aggregators))
        .route("/universal-swap/health", get(get_health))
        .route("/swap-analysis/analyze", get(get_analyze))
        .route("/swap-analysis/ecosystems", get(get_ecosystems))
}

/// The uniform success envelope.
fn envelope<T: Serialize>(data: T) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": data,
            "timestamp": UnixTimestamp::now_or_epoch(),
        })),
    )
        .into_response()
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::Validation(_)
            | GatewayError::Unroutable(_)
            | GatewayError::Unsupported(_)
            | GatewayError::NoProviderForChain { .. }
            | GatewayError::Signing(_)
            | GatewayError::Execution { .. } => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Provider(ProviderError::Upstream { status, .. })
                if (400..500).contains(status) =>
            {
                StatusCode::BAD_REQUEST
            }
            GatewayError::Provider(_)
            | GatewayError::AllProvidersFailed { .. }
            | GatewayError::Rpc { .. }
            | GatewayError::NoRpcForChain(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let details = match &self {
            GatewayError::NoProviderForChain { supported, .. } => {
                json!({ "supportedChains": supported })
            }
            GatewayError::Execution { detail, .. } => json!({ "detail": detail }),
            _ => serde_json::Value::Null,
        };
        (
            status,
            Json(json!({
                "message": self.to_string(),
                "error": self.code(),
                "details": details,
            })),
        )
            .into_response()
    }
}

/// Body of `/universal-swap/quote` responses.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponseBody {
    swap_type: SwapType,
    category: ProviderCategory,
    routes: serde_json::Value,
    recommended_route: RecommendedRoute,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    transaction_data: serde_json::Value,
    warnings: Vec<String>,
}

/// The route the gateway would execute, in either quote shape.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecommendedRoute {
    provider: String,
    /// Legacy identifier for pre-named-provider clients; EVM quotes only.
    #[serde(skip_serializing_if = "Option::is_none")]
    aggregator_type: Option<AggregatorType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<f64>,
    #[serde(flatten)]
    result: QuoteResult,
}

/// `POST /universal-swap/quote`: classify the request and return ranked
/// routes from the category that services it. For same-chain EVM swaps the
/// recommended route's executable transaction payload is included.
#[instrument(skip_all)]
async fn post_quote(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UniversalSwapRequest>,
) -> Result<Response, GatewayError> {
    let classification = state.classifier.classify(&req)?;
    let mut warnings = Vec::new();
    if let Some(rejected) = classification.override_rejected {
        warnings.push(format!(
            "requested swapType {rejected} is inconsistent with the chain legs, using {}",
            classification.swap_type
        ));
    }

    let (routes, recommended, transaction_data) = match classification.category {
        ProviderCategory::EvmAggregator => {
            let legacy = req.to_legacy().ok_or_else(|| {
                GatewayError::validation("on-chain EVM swap legs must share a numeric chainId")
            })?;
            legacy.validate().map_err(GatewayError::validation)?;
            let comparison = state.orchestrator.get_multiple_quotes(&legacy).await?;
            // Ranking (score order) picks the recommendation; the best-price
            // aggregator is still reported inside the comparison.
            let top = comparison.quotes.first().cloned().ok_or_else(|| {
                GatewayError::internal("comparison returned without quotes")
            })?;
            let transaction_data = json!({
                "to": top.quote.to,
                "data": top.quote.data,
                "value": top.quote.value,
                "gas": top.quote.gas,
                "gasPrice": top.quote.gas_price,
            });
            let recommended = RecommendedRoute {
                aggregator_type: Some(AggregatorType::from_provider_name_lossy(&top.provider)),
                provider: top.provider,
                score: Some(top.score),
                result: QuoteResult::Legacy(top.quote),
            };
            (
                serde_json::to_value(&comparison).unwrap_or_default(),
                recommended,
                transaction_data,
            )
        }
        ProviderCategory::MetaAggregator => {
            let routes = state.orchestrator.get_cross_chain_routes(&req).await?;
            let recommended = recommend_route(&routes)?;
            (
                serde_json::to_value(&routes).unwrap_or_default(),
                recommended,
                serde_json::Value::Null,
            )
        }
        ProviderCategory::SolanaRouter => {
            let routes = state.orchestrator.get_solana_routes(&req).await?;
            let recommended = recommend_route(&routes)?;
            (
                serde_json::to_value(&routes).unwrap_or_default(),
                recommended,
                serde_json::Value::Null,
            )
        }
        ProviderCategory::NativeRouter => {
            let routes = state.orchestrator.get_native_routes(&req).await?;
            let recommended = recommend_route(&routes)?;
            (
                serde_json::to_value(&routes).unwrap_or_default(),
                recommended,
                serde_json::Value::Null,
            )
        }
    };

    Ok(envelope(QuoteResponseBody {
        swap_type: classification.swap_type,
        category: classification.category,
        routes,
        recommended_route: recommended,
        transaction_data,
        warnings,
    }))
}

fn recommend_route(
    routes: &[crate::orchestrator::ProviderRoute],
) -> Result<RecommendedRoute, GatewayError> {
    let top = routes
        .first()
        .ok_or_else(|| GatewayError::internal("route set returned empty"))?;
    Ok(RecommendedRoute {
        provider: top.provider.clone(),
        aggregator_type: None,
        score: None,
        result: QuoteResult::Route(top.route.clone()),
    })
}

/// `POST /universal-swap/pre-check`: run the composite validator.
#[instrument(skip_all)]
async fn post_pre_check(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UniversalSwapRequest>,
) -> Result<Response, GatewayError> {
    let report = state.precheck.run(&req).await;
    Ok(envelope(report))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteRequest {
    #[serde(flatten)]
    request: UniversalSwapRequest,
    #[serde(default)]
    route_id: Option<String>,
    private_key: SignerSecret,
}

/// `POST /universal-swap/execute`: execute a swap. Same-chain EVM requests
/// run the full coordinator; routeId-based cross-chain execution is
/// forwarded to the owning meta-aggregator (still stubbed upstream).
#[instrument(skip_all)]
async fn post_execute(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExecuteRequest>,
) -> Result<Response, GatewayError> {
    if let Some(route_id) = &body.route_id {
        let signer = crate::providers::SignerContext {
            taker: body.request.taker.clone(),
            secret: body.private_key.clone(),
        };
        for adapter in state.registry.meta_aggregators() {
            match adapter.execute(route_id, &signer).await {
                Ok(execution) => {
                    return Ok(envelope(json!({
                        "routeId": route_id,
                        "txids": execution.txids,
                        "status": ExecutionStatus::Pending,
                    })));
                }
                Err(ProviderError::UnsupportedOperation { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        return Err(GatewayError::unsupported(
            "no registered meta-aggregator can execute this route server-side",
        ));
    }

    let result = state
        .execution
        .execute_swap(&body.request, body.private_key)
        .await?;
    Ok(envelope(result))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusRequest {
    #[serde(default)]
    execution_id: Option<String>,
    #[serde(default)]
    route_id: Option<String>,
    #[serde(default)]
    provider: Option<String>,
}

/// `POST /universal-swap/status`: poll an execution by id, or a cross-chain
/// route through its meta-aggregator.
#[instrument(skip_all)]
async fn post_status(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StatusRequest>,
) -> Result<Response, GatewayError> {
    if let Some(execution_id) = &body.execution_id {
        let record = state
            .execution
            .status(execution_id)
            .ok_or_else(|| GatewayError::NotFound(format!("execution {execution_id}")))?;
        return Ok(envelope(record));
    }
    if let Some(route_id) = &body.route_id {
        let provider_name = body.provider.as_deref().ok_or_else(|| {
            GatewayError::validation("routeId status polling needs the provider name")
        })?;
        let adapter = state
            .registry
            .meta_aggregator(provider_name)
            .ok_or_else(|| GatewayError::NotFound(format!("provider {provider_name}")))?;
        let status = adapter.status(route_id).await?;
        return Ok(envelope(json!({ "routeId": route_id, "status": status })));
    }
    Err(GatewayError::validation(
        "provide executionId or routeId+provider",
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApprovalRequestBody {
    #[serde(flatten)]
    request: SwapRequest,
    #[serde(default)]
    strategy: Option<ApprovalStrategy>,
    #[serde(default)]
    private_key: Option<SignerSecret>,
}

/// `POST /universal-swap/approval/status`: report whether the taker must
/// approve before swapping, and whom to approve.
#[instrument(skip_all)]
async fn post_approval_status(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ApprovalRequestBody>,
) -> Result<Response, GatewayError> {
    let strategy = body
        .strategy
        .or(body.request.approval_strategy)
        .unwrap_or(ApprovalStrategy::AllowanceHolder);
    let report = state.approval.approval_status(&body.request, strategy).await?;
    Ok(envelope(report))
}

/// `POST /universal-swap/approval/execute`: build the `approve` transaction;
/// when a signing key is supplied the transaction is also submitted.
#[instrument(skip_all)]
async fn post_approval_execute(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ApprovalRequestBody>,
) -> Result<Response, GatewayError> {
    let strategy = body
        .strategy
        .or(body.request.approval_strategy)
        .unwrap_or(ApprovalStrategy::AllowanceHolder);
    if strategy == ApprovalStrategy::Permit2 && !crate::network::supports_permit2(body.request.chain_id)
    {
        return Err(GatewayError::unsupported(format!(
            "permit2 is not deployed on chain {}",
            body.request.chain_id
        )));
    }
    let spender = state
        .approval
        .resolve_spender(body.request.chain_id, strategy, Some(&body.request))
        .await?;
    let calldata = ApprovalWorkflow::approval_calldata(spender, body.request.sell_amount.0);

    let Some(secret) = &body.private_key else {
        // No key: hand back the unsigned payload for client-side signing.
        return Ok(envelope(json!({
            "to": body.request.sell_token,
            "data": calldata,
            "value": TokenAmount::ZERO,
            "spender": spender,
        })));
    };

    let (provider, signer_address) = state.chains.signing(body.request.chain_id, secret)?;
    let tx = TransactionRequest::default()
        .with_from(signer_address)
        .with_to(body.request.sell_token)
        .with_input(calldata);
    let pending = alloy::providers::Provider::send_transaction(&provider, tx)
        .await
        .map_err(|e| GatewayError::Rpc {
            chain_id: body.request.chain_id,
            message: format!("approval submission failed: {e}"),
        })?;
    let tx_hash = format!("{:#x}", *pending.tx_hash());
    Ok(envelope(json!({
        "txHash": tx_hash,
        "spender": spender,
        "status": ExecutionStatus::Pending,
    })))
}

/// `GET /universal-swap/supported-chains`: union of adapter-declared chains,
/// configured RPC chains, and chains seen quoting, enriched via ChainList.
#[instrument(skip_all)]
async fn get_supported_chains(State(state): State<Arc<AppState>>) -> Result<Response, GatewayError> {
    let mut chains = state.registry.evm_supported_chains();
    chains.extend(state.quote_cache.chains());
    chains.extend(state.chains.configured_chains());
    chains.sort_unstable();
    chains.dedup();
    let enriched = state.chainlist.enrich(&chains).await;
    Ok(envelope(enriched))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AggregatorsQuery {
    chain_id: u64,
}

/// `GET /universal-swap/aggregators?chainId=`: names of EVM adapters serving
/// that chain.
#[instrument(skip_all)]
async fn get_aggregators(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AggregatorsQuery>,
) -> Result<Response, GatewayError> {
    let mut names: Vec<String> = state
        .registry
        .evm_aggregators_for_chain(query.chain_id)
        .into_iter()
        .map(|adapter| adapter.name().to_string())
        .collect();
    names.sort();
    Ok(envelope(json!({
        "chainId": query.chain_id,
        "aggregators": names,
    })))
}

/// `GET /universal-swap/health`: gateway liveness.
#[instrument(skip_all)]
async fn get_health() -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "timestamp": UnixTimestamp::now_or_epoch(),
        })),
    )
        .into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeQuery {
    source_chain: String,
    source_ecosystem: Ecosystem,
    destination_chain: String,
    destination_ecosystem: Ecosystem,
    #[serde(default)]
    swap_type: Option<SwapType>,
}

/// `GET /swap-analysis/analyze`: preview the routing classification for a
/// pair of chain legs without quoting anything.
#[instrument(skip_all)]
async fn get_analyze(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnalyzeQuery>,
) -> Result<Response, GatewayError> {
    let probe = UniversalSwapRequest {
        sell_token: String::new(),
        buy_token: String::new(),
        sell_amount: TokenAmount::from(1u64),
        taker: String::new(),
        recipient: None,
        slippage: None,
        deadline: None,
        source: ChainRef {
            chain: query.source_chain,
            ecosystem: query.source_ecosystem,
            standard: crate::network::TokenStandard::Native,
        },
        destination: ChainRef {
            chain: query.destination_chain,
            ecosystem: query.destination_ecosystem,
            standard: crate::network::TokenStandard::Native,
        },
        swap_type: query.swap_type,
        aggregator: None,
        approval_strategy: None,
    };
    let classification = state.classifier.classify(&probe)?;
    let chain_supported = state.classifier.is_chain_supported(&probe);
    Ok(envelope(json!({
        "classification": classification,
        "chainSupported": chain_supported,
    })))
}

/// `GET /swap-analysis/ecosystems`: the static ecosystem catalogue.
#[instrument(skip_all)]
async fn get_ecosystems() -> Response {
    let catalogue: Vec<_> = Ecosystem::variants()
        .iter()
        .map(|ecosystem| {
            json!({
                "ecosystem": ecosystem,
                "evmLike": ecosystem.is_evm_like(),
                "nativeSettled": ecosystem.is_native_settled(),
            })
        })
        .collect();
    envelope(catalogue)
}
