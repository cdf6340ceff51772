use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;
use wayfinder_core::{Gateway, WayfinderError};

use crate::provider::GatewayProvider;

/// Wraps a `GatewayProvider` with a TTL cache. Concurrent callers that land
/// inside a cold/expired window coalesce onto a single upstream fetch because
/// the refresh happens while holding `state`'s lock — nobody else can start a
/// second fetch until it finishes and the cache is warm again (single-flight
/// via mutex, the same trick `ando-store::cache::ConfigCache` uses for its
/// apply-then-read critical section).
///
/// On upstream failure the cache does not poison itself — a prior entry, if
/// any, is left untouched for the next caller to retry against. Wayfinder
/// does not define stale-while-error serving, so a failed refresh always
/// propagates the error to its caller rather than returning stale data.
pub struct SimpleCacheGatewayProvider<P> {
    inner: P,
    ttl: Duration,
    state: Mutex<Option<(Instant, Vec<Gateway>)>>,
}

impl<P: GatewayProvider> SimpleCacheGatewayProvider<P> {
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            state: Mutex::new(None),
        }
    }
}

#[async_trait]
impl<P: GatewayProvider> GatewayProvider for SimpleCacheGatewayProvider<P> {
    async fn get_gateways(&self) -> Result<Vec<Gateway>, WayfinderError> {
        let mut guard = self.state.lock().await;
        if let Some((fetched_at, gateways)) = guard.as_ref() {
            if fetched_at.elapsed() < self.ttl {
                return Ok(gateways.clone());
            }
        }

        match self.inner.get_gateways().await {
            Ok(gateways) => {
                *guard = Some((Instant::now(), gateways.clone()));
                Ok(gateways)
            }
            Err(e) => {
                warn!(error = %e, "gateway cache refresh failed, cache left untouched");
                Err(e)
            }
        }
    }
}

/// Durable backing store for `LocalStorageCacheGatewayProvider`. A native
/// default (`FileStore`) is provided; hosts embedding Wayfinder in other
/// environments (e.g. a browser via wasm) supply their own.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    async fn load(&self) -> Option<String>;
    async fn save(&self, value: &str);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedEntry {
    gateways: Vec<Gateway>,
    fetched_at_unix_ms: u128,
    ttl_ms: u128,
}

/// JSON-file-backed `PersistentStore`, keyed by a single `path`.
pub struct FileStore {
    path: std::path::PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PersistentStore for FileStore {
    async fn load(&self) -> Option<String> {
        tokio::fs::read_to_string(&self.path).await.ok()
    }

    async fn save(&self, value: &str) {
        if let Err(e) = tokio::fs::write(&self.path, value).await {
            warn!(path = %self.path.display(), error = %e, "failed to persist gateway cache");
        }
    }
}

/// Same coalescing behavior as `SimpleCacheGatewayProvider`, but the TTL
/// record survives process restarts via a `PersistentStore` (§6 "Persisted
/// state", key `wayfinder|gateways`).
pub struct LocalStorageCacheGatewayProvider<P, S> {
    inner: P,
    store: S,
    ttl: Duration,
    state: Mutex<Option<(Instant, Vec<Gateway>)>>,
}

impl<P: GatewayProvider, S: PersistentStore> LocalStorageCacheGatewayProvider<P, S> {
    pub fn new(inner: P, store: S, ttl: Duration) -> Self {
        Self {
            inner,
            store,
            ttl,
            state: Mutex::new(None),
        }
    }

    async fn load_persisted(&self) -> Option<Vec<Gateway>> {
        let raw = self.store.load().await?;
        let entry: PersistedEntry = serde_json::from_str(&raw).ok()?;
        let age_ms = now_unix_ms().saturating_sub(entry.fetched_at_unix_ms);
        if age_ms < entry.ttl_ms {
            Some(entry.gateways)
        } else {
            None
        }
    }

    async fn persist(&self, gateways: &[Gateway]) {
        let entry = PersistedEntry {
            gateways: gateways.to_vec(),
            fetched_at_unix_ms: now_unix_ms(),
            ttl_ms: self.ttl.as_millis(),
        };
        if let Ok(json) = serde_json::to_string(&entry) {
            self.store.save(&json).await;
        }
    }
}

fn now_unix_ms() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

#[async_trait]
impl<P: GatewayProvider, S: PersistentStore> GatewayProvider
    for LocalStorageCacheGatewayProvider<P, S>
{
    async fn get_gateways(&self) -> Result<Vec<Gateway>, WayfinderError> {
        let mut guard = self.state.lock().await;
        if let Some((fetched_at, gateways)) = guard.as_ref() {
            if fetched_at.elapsed() < self.ttl {
                return Ok(gateways.clone());
            }
        }

        if guard.is_none() {
            if let Some(persisted) = self.load_persisted().await {
                *guard = Some((Instant::now(), persisted.clone()));
                return Ok(persisted);
            }
        }

        match self.inner.get_gateways().await {
            Ok(gateways) => {
                *guard = Some((Instant::now(), gateways.clone()));
                self.persist(&gateways).await;
                Ok(gateways)
            }
            Err(e) => {
                warn!(error = %e, "gateway cache refresh failed, cache left untouched");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StaticGatewayProvider;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        gateways: Vec<Gateway>,
    }

    #[async_trait]
    impl GatewayProvider for CountingProvider {
        async fn get_gateways(&self) -> Result<Vec<Gateway>, WayfinderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.gateways.clone())
        }
    }

    #[tokio::test]
    async fn test_cache_hits_avoid_refetch() {
        let provider = CountingProvider {
            calls: AtomicUsize::new(0),
            gateways: vec![Gateway::from_str("http://a.example").unwrap()],
        };
        let cache = SimpleCacheGatewayProvider::new(provider, Duration::from_secs(60));
        cache.get_gateways().await.unwrap();
        cache.get_gateways().await.unwrap();
        cache.get_gateways().await.unwrap();
        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_refetches_after_ttl() {
        let provider = CountingProvider {
            calls: AtomicUsize::new(0),
            gateways: vec![Gateway::from_str("http://a.example").unwrap()],
        };
        let cache = SimpleCacheGatewayProvider::new(provider, Duration::from_millis(10));
        cache.get_gateways().await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        cache.get_gateways().await.unwrap();
        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cache_does_not_poison_on_failure() {
        struct FlakyProvider;
        #[async_trait]
        impl GatewayProvider for FlakyProvider {
            async fn get_gateways(&self) -> Result<Vec<Gateway>, WayfinderError> {
                Err(WayfinderError::NetworkError("down".into()))
            }
        }
        let cache = SimpleCacheGatewayProvider::new(FlakyProvider, Duration::from_secs(60));
        assert!(cache.get_gateways().await.is_err());
        assert!(cache.get_gateways().await.is_err());
    }

    struct MemoryStore(Mutex<Option<String>>);

    #[async_trait]
    impl PersistentStore for MemoryStore {
        async fn load(&self) -> Option<String> {
            self.0.lock().await.clone()
        }
        async fn save(&self, value: &str) {
            *self.0.lock().await = Some(value.to_string());
        }
    }

    #[tokio::test]
    async fn test_local_storage_cache_persists_across_instances() {
        let store = MemoryStore(Mutex::new(None));
        let provider = StaticGatewayProvider::new(vec![Gateway::from_str("http://a.example").unwrap()]);
        let cache = LocalStorageCacheGatewayProvider::new(provider, store, Duration::from_secs(60));
        cache.get_gateways().await.unwrap();

        let persisted = cache.store.load().await;
        assert!(persisted.is_some());
    }
}
