//! Swap gateway HTTP entrypoint.
//!
//! Boot order matters: configuration and chain providers first, then the
//! provider registry is populated by each adapter's `register` entry from
//! this composition root, then the registration-complete latch fires, and
//! only then does the orchestrator serve its first request.
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `HOST`, `PORT` control binding address
//! - `CORS_ORIGIN` restricts cross-origin callers (any origin by default)
//! - `*_RPC_URL` and aggregator API keys per `config`
//! - `OTEL_*` variables enable tracing export

use axum::Router;
use axum::http::{HeaderValue, Method};
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors;
use tower_http::trace::TraceLayer;

use omniswap_rs::approval::ApprovalWorkflow;
use omniswap_rs::chainlist::ChainListService;
use omniswap_rs::chains::ChainProviders;
use omniswap_rs::config::Config;
use omniswap_rs::execution::ExecutionCoordinator;
use omniswap_rs::handlers::{self, AppState};
use omniswap_rs::health::HealthMonitor;
use omniswap_rs::orchestrator::QuoteOrchestrator;
use omniswap_rs::precheck::PreCheck;
use omniswap_rs::providers;
use omniswap_rs::quote_cache::SupportedQuoteCache;
use omniswap_rs::rate_limit::{RateLimiter, rate_limit_middleware};
use omniswap_rs::registry::ProviderRegistry;
use omniswap_rs::routing::SwapClassifier;
use omniswap_rs::sig_down::Shutdown;
use omniswap_rs::telemetry::Telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    let _telemetry = Telemetry::init();

    let config = Config::load()?;
    let chains = Arc::new(ChainProviders::from_config(&config));
    let http = providers::http_client();

    // Adapter self-registration. Each module decides for itself whether its
    // credentials allow it to come up; the host holds no adapter list.
    let registry = Arc::new(ProviderRegistry::new());
    providers::zero_x::register(&registry, config.keys(), &http);
    providers::odos::register(&registry, config.keys(), &http);
    providers::lifi::register(&registry, config.keys(), &http);
    providers::jupiter::register(&registry, config.keys(), &http);
    providers::thorchain::register(&registry, config.keys(), &http);
    registry.registration_complete();

    let health = Arc::new(HealthMonitor::new());
    let quote_cache = Arc::new(SupportedQuoteCache::new());
    let classifier = Arc::new(SwapClassifier::new(
        Arc::clone(&registry),
        Arc::clone(&quote_cache),
    ));
    let orchestrator = Arc::new(QuoteOrchestrator::new(
        Arc::clone(&registry),
        Arc::clone(&health),
        Arc::clone(&quote_cache),
    ));
    let approval = Arc::new(ApprovalWorkflow::new(
        Arc::clone(&chains),
        Arc::clone(&registry),
    ));
    let precheck = Arc::new(PreCheck::new(
        Arc::clone(&classifier),
        Arc::clone(&orchestrator),
        Arc::clone(&approval),
        Arc::clone(&registry),
        Arc::clone(&health),
    ));
    let execution = Arc::new(ExecutionCoordinator::new(
        Arc::clone(&orchestrator),
        Arc::clone(&approval),
        Arc::clone(&precheck),
        Arc::clone(&chains),
    ));
    let chainlist = Arc::new(ChainListService::new(http.clone()));

    let shutdown = Shutdown::try_new()?;
    let rate_limiter = Arc::new(RateLimiter::new());
    rate_limiter.spawn_cleanup(&shutdown);

    let cors_layer = match config.cors_origin() {
        Some(origin) => cors::CorsLayer::new()
            .allow_origin(origin.parse::<HeaderValue>()?)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(cors::Any),
        None => cors::CorsLayer::new()
            .allow_origin(cors::Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(cors::Any),
    };

    let state = Arc::new(AppState {
        config: config.clone(),
        registry,
        health,
        quote_cache,
        chains,
        classifier,
        orchestrator,
        approval,
        precheck,
        execution: Arc::clone(&execution),
        chainlist,
    });

    let app = Router::new()
        .merge(handlers::routes())
        .with_state(state)
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&rate_limiter),
            rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer);

    let addr = SocketAddr::new(config.host(), config.port());
    tracing::info!("Starting swap gateway at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let cancellation_token = shutdown.cancellation_token();
    let graceful_shutdown = async move { cancellation_token.cancelled().await };
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(graceful_shutdown)
    .await?;

    // The listener has stopped accepting; report swaps still in flight and
    // give the background loops a bounded window to wind down.
    let pending = execution.pending_count();
    if pending > 0 {
        tracing::warn!(pending, "shutting down with executions still pending");
    }
    shutdown.drain(Duration::from_secs(10)).await;

    Ok(())
}
