//! Provider registry.
//!
//! Adapters self-register at startup through the category-specific
//! `register_*` methods (or the [`ProviderHandle`] dispatch form); the host
//! has no central list of which adapters exist. Registration is idempotent
//! per `(category, name)`: a duplicate is ignored with a warning. The maps
//! are written only during the startup window and read-only once the host
//! fires [`ProviderRegistry::registration_complete`].

use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::network::{AggregatorType, ProviderCategory};
use crate::providers::{MetaAggregator, NativeRouter, OnChainAggregator, SolanaRouter};

/// An adapter instance tagged with its category, for the generic
/// registration entry point.
pub enum ProviderHandle {
    OnChain(Arc<dyn OnChainAggregator>),
    Meta(Arc<dyn MetaAggregator>),
    Solana(Arc<dyn SolanaRouter>),
    Native(Arc<dyn NativeRouter>),
}

/// Name-keyed adapter maps, one per category, plus the legacy
/// [`AggregatorType`] mirror.
#[derive(Default)]
pub struct ProviderRegistry {
    evm: DashMap<String, Arc<dyn OnChainAggregator>>,
    meta: DashMap<String, Arc<dyn MetaAggregator>>,
    solana: DashMap<String, Arc<dyn SolanaRouter>>,
    native: DashMap<String, Arc<dyn NativeRouter>>,
    legacy: DashMap<AggregatorType, Arc<dyn OnChainAggregator>>,
    complete: AtomicBool,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generic registration; dispatches on the handle's category.
    pub fn register(&self, handle: ProviderHandle) {
        match handle {
            ProviderHandle::OnChain(p) => self.register_evm_aggregator(p),
            ProviderHandle::Meta(p) => self.register_meta_aggregator(p),
            ProviderHandle::Solana(p) => self.register_solana_router(p),
            ProviderHandle::Native(p) => self.register_native_router(p),
        }
    }

    pub fn register_evm_aggregator(&self, provider: Arc<dyn OnChainAggregator>) {
        let name = provider.name().to_string();
        if self.evm.contains_key(&name) {
            tracing::warn!(provider = %name, category = %ProviderCategory::EvmAggregator,
                "duplicate registration ignored");
            return;
        }
        // Mirror the two original adapters under their legacy identifiers.
        if let Some(legacy) = AggregatorType::from_provider_name(&name) {
            self.legacy.insert(legacy, Arc::clone(&provider));
        }
        self.evm.insert(name.clone(), provider);
        self.announce(&name, ProviderCategory::EvmAggregator);
    }

    pub fn register_meta_aggregator(&self, provider: Arc<dyn MetaAggregator>) {
        let name = provider.name().to_string();
        if self.meta.contains_key(&name) {
            tracing::warn!(provider = %name, category = %ProviderCategory::MetaAggregator,
                "duplicate registration ignored");
            return;
        }
        self.meta.insert(name.clone(), provider);
        self.announce(&name, ProviderCategory::MetaAggregator);
    }

    pub fn register_solana_router(&self, provider: Arc<dyn SolanaRouter>) {
        let name = provider.name().to_string();
        if self.solana.contains_key(&name) {
            tracing::warn!(provider = %name, category = %ProviderCategory::SolanaRouter,
                "duplicate registration ignored");
            return;
        }
        self.solana.insert(name.clone(), provider);
        self.announce(&name, ProviderCategory::SolanaRouter);
    }

    pub fn register_native_router(&self, provider: Arc<dyn NativeRouter>) {
        let name = provider.name().to_string();
        if self.native.contains_key(&name) {
            tracing::warn!(provider = %name, category = %ProviderCategory::NativeRouter,
                "duplicate registration ignored");
            return;
        }
        self.native.insert(name.clone(), provider);
        self.announce(&name, ProviderCategory::NativeRouter);
    }

    fn announce(&self, name: &str, category: ProviderCategory) {
        // Registrations after the latch stay valid but are not announced.
        if self.complete.load(Ordering::Acquire) {
            return;
        }
        tracing::info!(provider = %name, %category, "provider registered");
    }

    /// Transition the registration-complete latch. The host calls this once
    /// after the composition root has run every adapter's `register` entry.
    pub fn registration_complete(&self) {
        if self.complete.swap(true, Ordering::AcqRel) {
            tracing::warn!("registration_complete invoked more than once");
            return;
        }
        tracing::info!(
            evm = self.evm.len(),
            meta = self.meta.len(),
            solana = self.solana.len(),
            native = self.native.len(),
            "provider registration complete"
        );
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    /// True when no adapter of any category has been registered.
    pub fn is_empty(&self) -> bool {
        self.evm.is_empty() && self.meta.is_empty() && self.solana.is_empty() && self.native.is_empty()
    }

    pub fn evm_aggregator(&self, name: &str) -> Option<Arc<dyn OnChainAggregator>> {
        self.evm.get(name).map(|e| Arc::clone(e.value()))
    }

    /// Legacy lookup by [`AggregatorType`].
    pub fn legacy_aggregator(&self, kind: AggregatorType) -> Option<Arc<dyn OnChainAggregator>> {
        self.legacy.get(&kind).map(|e| Arc::clone(e.value()))
    }

    pub fn evm_aggregators(&self) -> Vec<Arc<dyn OnChainAggregator>> {
        self.evm.iter().map(|e| Arc::clone(e.value())).collect()
    }

    pub fn meta_aggregator(&self, name: &str) -> Option<Arc<dyn MetaAggregator>> {
        self.meta.get(name).map(|e| Arc::clone(e.value()))
    }

    pub fn meta_aggregators(&self) -> Vec<Arc<dyn MetaAggregator>> {
        self.meta.iter().map(|e| Arc::clone(e.value())).collect()
    }

    pub fn solana_routers(&self) -> Vec<Arc<dyn SolanaRouter>> {
        self.solana.iter().map(|e| Arc::clone(e.value())).collect()
    }

    pub fn native_routers(&self) -> Vec<Arc<dyn NativeRouter>> {
        self.native.iter().map(|e| Arc::clone(e.value())).collect()
    }

    /// Names registered in one category.
    pub fn names(&self, category: ProviderCategory) -> Vec<String> {
        let mut names: Vec<String> = match category {
            ProviderCategory::EvmAggregator => self.evm.iter().map(|e| e.key().clone()).collect(),
            ProviderCategory::MetaAggregator => self.meta.iter().map(|e| e.key().clone()).collect(),
            ProviderCategory::SolanaRouter => self.solana.iter().map(|e| e.key().clone()).collect(),
            ProviderCategory::NativeRouter => self.native.iter().map(|e| e.key().clone()).collect(),
        };
        names.sort();
        names
    }

    /// EVM aggregators claiming support for `chain_id`.
    pub fn evm_aggregators_for_chain(&self, chain_id: u64) -> Vec<Arc<dyn OnChainAggregator>> {
        self.evm
            .iter()
            .filter(|e| e.value().supports_chain(chain_id))
            .map(|e| Arc::clone(e.value()))
            .collect()
    }

    /// Union of every EVM adapter's declared chains, sorted and deduplicated.
    pub fn evm_supported_chains(&self) -> Vec<u64> {
        let mut chains: Vec<u64> = self
            .evm
            .iter()
            .flat_map(|e| e.value().supported_chains())
            .collect();
        chains.sort_unstable();
        chains.dedup();
        chains
    }

    /// Whether any registered adapter of any category claims the chain.
    pub fn any_adapter_supports_chain(&self, chain_id: u64) -> bool {
        if self.evm.iter().any(|e| e.value().supports_chain(chain_id)) {
            return true;
        }
        // Meta-aggregator support sets are fetched asynchronously; at the
        // registry level their presence counts as a claim for EVM chains.
        !self.meta.is_empty() && crate::known::by_chain_id(chain_id).is_some()
    }
}
