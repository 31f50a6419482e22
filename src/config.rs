//! Configuration for the gateway server.
//!
//! Everything is environment-driven: listener address, CORS origin, per-chain
//! RPC endpoints, and the aggregator API credentials. `.env` values are
//! loaded by `main` before [`Config::load`] runs.
//!
//! Environment variables used:
//! - `PORT`, `HOST` — listener binding
//! - `CORS_ORIGIN` — allowed origin (`*` by default)
//! - `ETHEREUM_RPC_URL`, `OPTIMISM_RPC_URL`, `BSC_RPC_URL`, `POLYGON_RPC_URL`,
//!   `ZKSYNC_RPC_URL`, `BASE_RPC_URL`, `ARBITRUM_RPC_URL`, `AVALANCHE_RPC_URL`
//!   — JSON-RPC endpoints per EVM chain
//! - `ZEROX_API_KEY`, `LIFI_API_KEY`, `SOCKET_API_KEY`, `RANGO_API_KEY`,
//!   `ROUTER_API_KEY`, `JUPITER_API_KEY`, `ODOS_REFERRAL_CODE` — adapter
//!   credentials; adapters without a credential stay unregistered

use clap::Parser;
use std::collections::HashMap;
use std::env;
use std::net::IpAddr;
use url::Url;

const ENV_RPC_ETHEREUM: &str = "ETHEREUM_RPC_URL";
const ENV_RPC_OPTIMISM: &str = "OPTIMISM_RPC_URL";
const ENV_RPC_BSC: &str = "BSC_RPC_URL";
const ENV_RPC_POLYGON: &str = "POLYGON_RPC_URL";
const ENV_RPC_ZKSYNC: &str = "ZKSYNC_RPC_URL";
const ENV_RPC_BASE: &str = "BASE_RPC_URL";
const ENV_RPC_ARBITRUM: &str = "ARBITRUM_RPC_URL";
const ENV_RPC_AVALANCHE: &str = "AVALANCHE_RPC_URL";

/// `(env var, chain id)` pairs for every EVM chain the gateway can reach.
const RPC_ENV_VARS: &[(&str, u64)] = &[
    (ENV_RPC_ETHEREUM, 1),
    (ENV_RPC_OPTIMISM, 10),
    (ENV_RPC_BSC, 56),
    (ENV_RPC_POLYGON, 137),
    (ENV_RPC_ZKSYNC, 324),
    (ENV_RPC_BASE, 8453),
    (ENV_RPC_ARBITRUM, 42161),
    (ENV_RPC_AVALANCHE, 43114),
];

/// CLI arguments; each falls back to its environment variable.
#[derive(Parser, Debug)]
#[command(name = "omniswap-rs")]
#[command(about = "Universal swap aggregation gateway")]
struct CliArgs {
    /// Listener port
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Listener host
    #[arg(long, env = "HOST")]
    host: Option<IpAddr>,
}

/// Aggregator API credentials, read once at startup. Absent keys leave the
/// corresponding adapter unregistered rather than failing the boot.
#[derive(Debug, Clone, Default)]
pub struct AggregatorKeys {
    pub zerox: Option<String>,
    pub lifi: Option<String>,
    pub socket: Option<String>,
    pub rango: Option<String>,
    pub router: Option<String>,
    pub jupiter: Option<String>,
    pub odos_referral_code: Option<String>,
}

impl AggregatorKeys {
    fn from_env() -> Self {
        let read = |key: &str| env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            zerox: read("ZEROX_API_KEY"),
            lifi: read("LIFI_API_KEY"),
            socket: read("SOCKET_API_KEY"),
            rango: read("RANGO_API_KEY"),
            router: read("ROUTER_API_KEY"),
            jupiter: read("JUPITER_API_KEY"),
            odos_referral_code: read("ODOS_REFERRAL_CODE"),
        }
    }
}

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    port: u16,
    host: IpAddr,
    cors_origin: Option<String>,
    rpc_urls: HashMap<u64, Url>,
    keys: AggregatorKeys,
}

impl Config {
    /// Resolve configuration from CLI arguments and environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();
        Self::from_sources(cli.port, cli.host)
    }

    /// Resolution without CLI parsing, for tests and embedding.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_sources(None, None)
    }

    fn from_sources(port: Option<u16>, host: Option<IpAddr>) -> Result<Self, ConfigError> {
        let mut rpc_urls = HashMap::new();
        for (env_var, chain_id) in RPC_ENV_VARS {
            match env::var(env_var) {
                Ok(raw) => {
                    let url = raw
                        .parse::<Url>()
                        .map_err(|e| ConfigError::InvalidRpcUrl(env_var, e.to_string()))?;
                    rpc_urls.insert(*chain_id, url);
                }
                Err(_) => {
                    tracing::warn!("No RPC URL configured for chain {chain_id} ({env_var})");
                }
            }
        }

        Ok(Self {
            port: port.unwrap_or_else(config_defaults::default_port),
            host: host.unwrap_or_else(config_defaults::default_host),
            cors_origin: env::var("CORS_ORIGIN").ok().filter(|v| v != "*"),
            rpc_urls,
            keys: AggregatorKeys::from_env(),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn host(&self) -> IpAddr {
        self.host
    }

    /// Explicit CORS origin, or `None` for allow-any.
    pub fn cors_origin(&self) -> Option<&str> {
        self.cors_origin.as_deref()
    }

    pub fn rpc_urls(&self) -> &HashMap<u64, Url> {
        &self.rpc_urls
    }

    pub fn rpc_url(&self, chain_id: u64) -> Option<&Url> {
        self.rpc_urls.get(&chain_id)
    }

    pub fn keys(&self) -> &AggregatorKeys {
        &self.keys
    }
}

pub mod config_defaults {
    use std::env;
    use std::net::IpAddr;

    pub const DEFAULT_PORT: u16 = 3000;
    pub const DEFAULT_HOST: &str = "0.0.0.0";

    /// Default port with fallback: $PORT env var -> 3000.
    pub fn default_port() -> u16 {
        env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT)
    }

    /// Default host with fallback: $HOST env var -> "0.0.0.0".
    pub fn default_host() -> IpAddr {
        env::var("HOST")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| DEFAULT_HOST.parse().expect("valid default host"))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid RPC URL in {0}: {1}")]
    InvalidRpcUrl(&'static str, String),
}
