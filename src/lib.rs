//! Universal swap aggregation gateway.
//!
//! Given a request to trade one token for another, possibly across
//! blockchain ecosystems, this crate discovers candidate execution
//! providers, fans out parallel quote requests, ranks the results, and (for
//! EVM chains) orchestrates approval, Permit2 signing, and transaction
//! submission. Liquidity is always external: the gateway mediates between
//! clients and third-party aggregators that share neither a wire format nor
//! a semantic model.
//!
//! # Architecture
//!
//! - [`routing`] — classifies a request into a swap type and provider
//!   category from its source/destination legs.
//! - [`registry`] — name-keyed adapter maps per category, populated by
//!   adapter self-registration at startup.
//! - [`orchestrator`] — health-aware scoring, ordered quote attempts, and
//!   parallel fan-out for price comparison.
//! - [`health`] — cached per-provider liveness driving ranking and fallback.
//! - [`permit2`] / [`approval`] — the two EVM allowance paths: gas-less
//!   EIP-712 permits and traditional on-chain approvals.
//! - [`execution`] — the ordered swap state machine from pre-flight to
//!   receipt parsing.
//! - [`precheck`] — the composite five-probe validator behind
//!   `/universal-swap/pre-check`.
//! - [`providers`] — adapter capability traits plus the concrete 0x, Odos,
//!   LiFi, Jupiter, and THORChain adapters.
//! - [`handlers`] — the Axum HTTP surface.
//!
//! The gateway never custodies funds: signing secrets arrive per request,
//! are used once, and are redacted from all diagnostics.

pub mod approval;
pub mod chainlist;
pub mod chains;
pub mod config;
pub mod error;
pub mod execution;
pub mod handlers;
pub mod health;
pub mod known;
pub mod network;
pub mod orchestrator;
pub mod permit2;
pub mod precheck;
pub mod providers;
pub mod quote_cache;
pub mod rate_limit;
pub mod registry;
pub mod routing;
pub mod sig_down;
pub mod telemetry;
pub mod types;
