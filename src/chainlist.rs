//! ChainList metadata enrichment.
//!
//! Leaf HTTP client over the public ChainList dataset, used to decorate the
//! supported-chains endpoint with human-readable names and native symbols.
//! The fetched catalogue is cached for an hour; when the fetch fails the
//! static table in [`crate::known`] answers instead.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::known;
use crate::network::supports_permit2;

const CHAINLIST_URL: &str = "https://chainid.network/chains.json";
const CATALOGUE_TTL: Duration = Duration::from_secs(60 * 60);

/// A supported chain, enriched for the HTTP surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedChain {
    pub chain_id: u64,
    pub name: String,
    pub native_symbol: String,
    pub permit2: bool,
}

#[derive(Debug, Deserialize)]
struct ChainListEntry {
    #[serde(rename = "chainId")]
    chain_id: u64,
    name: String,
    #[serde(rename = "nativeCurrency")]
    native_currency: Option<ChainListCurrency>,
}

#[derive(Debug, Deserialize)]
struct ChainListCurrency {
    symbol: String,
}

struct Catalogue {
    by_id: HashMap<u64, (String, String)>,
    fetched: Instant,
}

pub struct ChainListService {
    client: reqwest::Client,
    catalogue: RwLock<Option<Catalogue>>,
}

impl ChainListService {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            catalogue: RwLock::new(None),
        }
    }

    /// Enrich the given chain ids. Unknown ids are passed through with
    /// placeholder metadata rather than dropped.
    pub async fn enrich(&self, chain_ids: &[u64]) -> Vec<EnrichedChain> {
        let catalogue = self.catalogue().await;
        chain_ids
            .iter()
            .map(|chain_id| {
                let fetched = catalogue
                    .as_ref()
                    .and_then(|map| map.get(chain_id).cloned());
                let fallback = known::by_chain_id(*chain_id)
                    .map(|info| (info.name.to_string(), info.native_symbol.to_string()));
                let (name, native_symbol) = fetched
                    .or(fallback)
                    .unwrap_or_else(|| (format!("chain-{chain_id}"), "?".to_string()));
                EnrichedChain {
                    chain_id: *chain_id,
                    name,
                    native_symbol,
                    permit2: supports_permit2(*chain_id),
                }
            })
            .collect()
    }

    async fn catalogue(&self) -> Option<HashMap<u64, (String, String)>> {
        {
            let guard = self.catalogue.read().await;
            if let Some(catalogue) = guard.as_ref() {
                if catalogue.fetched.elapsed() < CATALOGUE_TTL {
                    return Some(catalogue.by_id.clone());
                }
            }
        }
        match self.fetch().await {
            Ok(by_id) => {
                let mut guard = self.catalogue.write().await;
                *guard = Some(Catalogue {
                    by_id: by_id.clone(),
                    fetched: Instant::now(),
                });
                Some(by_id)
            }
            Err(e) => {
                tracing::warn!(error = %e, "chainlist fetch failed, using static table");
                // Keep serving a stale catalogue if one exists.
                let guard = self.catalogue.read().await;
                guard.as_ref().map(|catalogue| catalogue.by_id.clone())
            }
        }
    }

    async fn fetch(&self) -> Result<HashMap<u64, (String, String)>, reqwest::Error> {
        let entries: Vec<ChainListEntry> = self
            .client
            .get(CHAINLIST_URL)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(entries
            .into_iter()
            .map(|entry| {
                let symbol = entry
                    .native_currency
                    .map(|currency| currency.symbol)
                    .unwrap_or_else(|| "?".to_string());
                (entry.chain_id, (entry.name, symbol))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enrichment_falls_back_to_static_table() {
        // Unroutable client URL forces the fallback path.
        let service = ChainListService::new(crate::providers::http_client());
        {
            let mut guard = service.catalogue.write().await;
            *guard = Some(Catalogue {
                by_id: HashMap::new(),
                fetched: Instant::now(),
            });
        }
        let enriched = service.enrich(&[1, 999_999]).await;
        assert_eq!(enriched.len(), 2);
        assert_eq!(enriched[0].name, "ethereum");
        assert!(enriched[0].permit2);
        assert_eq!(enriched[1].name, "chain-999999");
        assert!(!enriched[1].permit2);
    }
}
