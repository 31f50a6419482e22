//! Supported-quote cache.
//!
//! Remembers `(chain, token)` pairs that have returned at least one
//! successful quote. Chain-compatibility checks consult it so a chain stays
//! routable even when every adapter's static chain table is silent about it.
//! Entries only accumulate; the cache can be cleared administratively.

use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeSet;

/// Token sides seen quoting successfully on one chain, lower-hex normalized.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainQuoteEntry {
    pub sell_tokens: BTreeSet<String>,
    pub buy_tokens: BTreeSet<String>,
}

#[derive(Default)]
pub struct SupportedQuoteCache {
    entries: DashMap<u64, ChainQuoteEntry>,
}

impl SupportedQuoteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful quote for `chain_id` over the given pair.
    pub fn record(&self, chain_id: u64, sell_token: &str, buy_token: &str) {
        let mut entry = self.entries.entry(chain_id).or_default();
        entry.sell_tokens.insert(sell_token.to_ascii_lowercase());
        entry.buy_tokens.insert(buy_token.to_ascii_lowercase());
    }

    /// Any successful quote ever seen on this chain.
    pub fn has_chain(&self, chain_id: u64) -> bool {
        self.entries.contains_key(&chain_id)
    }

    /// Whether this exact pair has quoted successfully before.
    pub fn has_pair(&self, chain_id: u64, sell_token: &str, buy_token: &str) -> bool {
        self.entries
            .get(&chain_id)
            .map(|entry| {
                entry.sell_tokens.contains(&sell_token.to_ascii_lowercase())
                    && entry.buy_tokens.contains(&buy_token.to_ascii_lowercase())
            })
            .unwrap_or(false)
    }

    pub fn chains(&self) -> Vec<u64> {
        let mut chains: Vec<u64> = self.entries.iter().map(|e| *e.key()).collect();
        chains.sort_unstable();
        chains
    }

    pub fn snapshot(&self, chain_id: u64) -> Option<ChainQuoteEntry> {
        self.entries.get(&chain_id).map(|e| e.clone())
    }

    /// Administrative reset.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_normalizes_case_and_grows_monotonically() {
        let cache = SupportedQuoteCache::new();
        assert!(!cache.has_chain(1));

        cache.record(1, "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2", "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
        assert!(cache.has_chain(1));
        assert!(cache.has_pair(
            1,
            "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2",
            "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"
        ));

        cache.record(1, "0xdAC17F958D2ee523a2206206994597C13D831ec7", "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
        let entry = cache.snapshot(1).expect("entry exists");
        assert_eq!(entry.sell_tokens.len(), 2);

        cache.clear();
        assert!(!cache.has_chain(1));
    }
}
