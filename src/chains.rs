//! EVM RPC provider cache.
//!
//! Read-only providers are constructed once from the configured RPC URLs and
//! shared for allowance reads, balance checks, and receipt retrieval. Signing
//! providers are built per request from the caller-supplied secret and
//! dropped with it.

use alloy::network::EthereumWallet;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use std::collections::HashMap;
use std::str::FromStr;
use url::Url;

use crate::config::Config;
use crate::error::GatewayError;
use crate::types::SignerSecret;

/// Pre-built read-only providers keyed by chain id.
pub struct ChainProviders {
    providers: HashMap<u64, DynProvider>,
    rpc_urls: HashMap<u64, Url>,
}

impl ChainProviders {
    /// Connect a read-only provider for every configured RPC URL.
    pub fn from_config(config: &Config) -> Self {
        let mut providers = HashMap::new();
        for (chain_id, url) in config.rpc_urls() {
            let provider = ProviderBuilder::new().connect_http(url.clone()).erased();
            providers.insert(*chain_id, provider);
            tracing::info!(chain_id, %url, "Initialized RPC provider");
        }
        Self {
            providers,
            rpc_urls: config.rpc_urls().clone(),
        }
    }

    /// The read-only provider for `chain_id`.
    pub fn read(&self, chain_id: u64) -> Result<&DynProvider, GatewayError> {
        self.providers
            .get(&chain_id)
            .ok_or(GatewayError::NoRpcForChain(chain_id))
    }

    /// Chain ids with a configured endpoint.
    pub fn configured_chains(&self) -> Vec<u64> {
        let mut chains: Vec<u64> = self.providers.keys().copied().collect();
        chains.sort_unstable();
        chains
    }

    /// Build a signing provider for one request. The wallet lives only as
    /// long as the returned provider.
    pub fn signing(
        &self,
        chain_id: u64,
        secret: &SignerSecret,
    ) -> Result<(DynProvider, alloy::primitives::Address), GatewayError> {
        let url = self
            .rpc_urls
            .get(&chain_id)
            .ok_or(GatewayError::NoRpcForChain(chain_id))?;
        let signer = parse_signer(secret)?;
        let address = signer.address();
        let wallet = EthereumWallet::from(signer);
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(url.clone())
            .erased();
        Ok((provider, address))
    }
}

/// Parse the per-request signing secret into a local signer. The error path
/// never echoes the secret material.
pub fn parse_signer(secret: &SignerSecret) -> Result<PrivateKeySigner, GatewayError> {
    PrivateKeySigner::from_str(secret.reveal())
        .map_err(|_| GatewayError::Signing("invalid signing key".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signer_parse_error_does_not_leak_material() {
        let secret = SignerSecret::new("not-a-key");
        let err = parse_signer(&secret).expect_err("invalid key");
        let rendered = format!("{err}");
        assert!(!rendered.contains("not-a-key"));
    }

    #[test]
    fn known_secret_derives_expected_address() {
        // The well-known Anvil test key #0.
        let secret = SignerSecret::new(
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        );
        let signer = parse_signer(&secret).expect("valid key");
        assert_eq!(
            format!("{:#x}", signer.address()),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }
}
