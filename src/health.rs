//! Provider health monitor.
//!
//! Caches the most recent [`ProviderHealth`] per adapter and refreshes an
//! entry when it is older than [`HEALTH_TTL`]. The monitor is the sole
//! writer; quote selection reads snapshots. Concurrent lookups of the same
//! stale provider coalesce onto one probe through a per-key mutex.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::providers::{PROBE_TIMEOUT, SwapProvider};
use crate::types::ProviderHealth;

/// Cached health is considered fresh for this long.
pub const HEALTH_TTL: Duration = Duration::from_secs(5 * 60);

struct CachedHealth {
    health: ProviderHealth,
    refreshed: Instant,
}

/// Per-provider health cache with on-demand refresh.
#[derive(Default)]
pub struct HealthMonitor {
    cache: DashMap<String, CachedHealth>,
    // One probe in flight per provider; latecomers wait and read the cache.
    inflight: DashMap<String, Arc<Mutex<()>>>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current health of `provider`, probing iff the cached entry is missing
    /// or stale. A probe that errors or overruns its timeout yields the
    /// unhealthy record rather than an error.
    pub async fn health_of(&self, provider: &dyn SwapProvider) -> ProviderHealth {
        let name = provider.name();
        if let Some(fresh) = self.fresh_snapshot(name) {
            return fresh;
        }

        let lock = {
            let entry = self
                .inflight
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())));
            Arc::clone(entry.value())
        };
        let _guard = lock.lock().await;

        // Another caller may have refreshed while this one waited.
        if let Some(fresh) = self.fresh_snapshot(name) {
            return fresh;
        }

        let health = match tokio::time::timeout(PROBE_TIMEOUT, provider.health()).await {
            Ok(health) => health,
            Err(_) => {
                tracing::warn!(provider = name, "health probe timed out");
                ProviderHealth::failed(name)
            }
        };
        self.cache.insert(
            name.to_string(),
            CachedHealth {
                health: health.clone(),
                refreshed: Instant::now(),
            },
        );
        health
    }

    /// The cached record regardless of freshness, if any probe has run.
    pub fn snapshot(&self, name: &str) -> Option<ProviderHealth> {
        self.cache.get(name).map(|e| e.health.clone())
    }

    fn fresh_snapshot(&self, name: &str) -> Option<ProviderHealth> {
        self.cache.get(name).and_then(|entry| {
            (entry.refreshed.elapsed() < HEALTH_TTL).then(|| entry.health.clone())
        })
    }

    /// Drop every cached record, forcing fresh probes on next lookup.
    pub fn invalidate_all(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderConfig;
    use crate::types::{HealthStatus, UnixTimestamp};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        config: ProviderConfig,
        probes: AtomicUsize,
    }

    impl CountingProvider {
        fn new() -> Self {
            Self {
                config: ProviderConfig::new(
                    "counting",
                    "http://localhost:0",
                    None,
                    crate::providers::http_client(),
                ),
                probes: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SwapProvider for CountingProvider {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn config(&self) -> &ProviderConfig {
            &self.config
        }

        async fn health(&self) -> ProviderHealth {
            self.probes.fetch_add(1, Ordering::SeqCst);
            ProviderHealth {
                name: "counting".to_string(),
                status: HealthStatus::Healthy,
                latency_ms: Some(12),
                last_check: UnixTimestamp::now_or_epoch(),
                error_rate: Some(0.0),
            }
        }
    }

    #[tokio::test]
    async fn second_lookup_within_ttl_hits_cache() {
        let monitor = HealthMonitor::new();
        let provider = CountingProvider::new();

        let first = monitor.health_of(&provider).await;
        assert!(first.is_healthy());
        let second = monitor.health_of(&provider).await;
        assert!(second.is_healthy());
        assert_eq!(provider.probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_lookups_coalesce_to_one_probe() {
        let monitor = Arc::new(HealthMonitor::new());
        let provider = Arc::new(CountingProvider::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let monitor = Arc::clone(&monitor);
            let provider = Arc::clone(&provider);
            handles.push(tokio::spawn(async move {
                monitor.health_of(provider.as_ref()).await
            }));
        }
        for handle in handles {
            assert!(handle.await.expect("join").is_healthy());
        }
        assert_eq!(provider.probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_new_probe() {
        let monitor = HealthMonitor::new();
        let provider = CountingProvider::new();

        monitor.health_of(&provider).await;
        monitor.invalidate_all();
        monitor.health_of(&provider).await;
        assert_eq!(provider.probes.load(Ordering::SeqCst), 2);
    }
}
