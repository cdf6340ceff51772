use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Semaphore;
use wayfinder_core::{CachedResource, Manifest, WayfinderError};

use crate::cache::ContentCache;

const MANIFEST_CONTENT_TYPE: &str = "application/x.arweave-manifest+json";
const DEFAULT_MAX_DEPTH: usize = 5;

/// Fetches raw transaction bytes for a tx id. Implemented by the facade
/// crate on top of `DataRetriever`, so `wayfinder-manifest` never depends on
/// the HTTP client stack directly.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, tx_id: &str) -> Result<FetchedContent, WayfinderError>;
}

pub struct FetchedContent {
    pub bytes: bytes::Bytes,
    pub content_type: Option<String>,
    pub headers: HashMap<String, String>,
}

/// Verifies previously-fetched bytes against a tx id. Implemented by the
/// facade crate on top of `VerificationStrategy`.
#[async_trait]
pub trait ContentVerifier: Send + Sync {
    async fn verify(
        &self,
        tx_id: &str,
        bytes: &bytes::Bytes,
        headers: &HashMap<String, String>,
    ) -> Result<(), WayfinderError>;
}

/// No-op verifier used when verification is disabled.
pub struct NoopVerifier;

#[async_trait]
impl ContentVerifier for NoopVerifier {
    async fn verify(
        &self,
        _tx_id: &str,
        _bytes: &bytes::Bytes,
        _headers: &HashMap<String, String>,
    ) -> Result<(), WayfinderError> {
        Ok(())
    }
}

/// Resolves `ar://<manifest-id>/<path>` requests: fetches the manifest,
/// validates its schema, looks up the path's target tx id, and fetches +
/// verifies that target — following nested manifests up to `max_depth`
/// (§4.7 Manifest resolution).
pub struct ManifestResolver {
    fetcher: Arc<dyn ContentFetcher>,
    verifier: Arc<dyn ContentVerifier>,
    content_cache: ContentCache,
    manifest_cache: ContentCache,
    semaphore: Arc<Semaphore>,
    max_depth: usize,
}

impl ManifestResolver {
    pub fn new(
        fetcher: Arc<dyn ContentFetcher>,
        verifier: Arc<dyn ContentVerifier>,
        cache_ttl: Duration,
        max_concurrency: usize,
        max_depth: usize,
    ) -> Self {
        Self {
            fetcher,
            verifier,
            content_cache: ContentCache::new(cache_ttl),
            manifest_cache: ContentCache::new(cache_ttl),
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
            max_depth: if max_depth == 0 { DEFAULT_MAX_DEPTH } else { max_depth },
        }
    }

    /// Resolves `path` against `manifest_tx_id`, returning only the final
    /// target resource.
    pub async fn resolve(
        &self,
        manifest_tx_id: &str,
        path: &str,
    ) -> Result<CachedResource, WayfinderError> {
        let (resource, _visited) = self.resolve_with_options(manifest_tx_id, path, None, None).await?;
        Ok(resource)
    }

    /// Resolves `path` against `manifest_tx_id`, allowing a per-request
    /// `max_depth`/`concurrency` override (`requestWithManifest`'s
    /// `{maxDepth?, concurrency?}`, §6), and returning every target
    /// resource touched along the way so a caller can report per-resource
    /// verification results. A `concurrency` override bounds only this
    /// call's own recursion — it does not touch the resolver's shared pool.
    pub async fn resolve_with_options(
        &self,
        manifest_tx_id: &str,
        path: &str,
        max_depth: Option<usize>,
        concurrency: Option<usize>,
    ) -> Result<(CachedResource, Vec<CachedResource>), WayfinderError> {
        let max_depth = max_depth.unwrap_or(self.max_depth);
        let semaphore = match concurrency {
            Some(n) => Arc::new(Semaphore::new(n.max(1))),
            None => self.semaphore.clone(),
        };
        let mut visited = Vec::new();
        let resource = self
            .resolve_depth(manifest_tx_id, path, 0, max_depth, &semaphore, &mut visited)
            .await?;
        Ok((resource, visited))
    }

    /// Fetches and schema-validates a manifest without resolving a path —
    /// used to surface the manifest itself alongside a resolved response.
    pub async fn manifest(&self, tx_id: &str) -> Result<Manifest, WayfinderError> {
        self.fetch_manifest(tx_id, &self.semaphore).await
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_depth<'a>(
        &'a self,
        manifest_tx_id: &'a str,
        path: &'a str,
        depth: usize,
        max_depth: usize,
        semaphore: &'a Arc<Semaphore>,
        visited: &'a mut Vec<CachedResource>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<CachedResource, WayfinderError>> + Send + 'a>>
    {
        Box::pin(async move {
            if depth >= max_depth {
                return Err(WayfinderError::ManifestError(format!(
                    "manifest recursion exceeded max depth {max_depth}"
                )));
            }

            let manifest = self.fetch_manifest(manifest_tx_id, semaphore).await?;
            let target_id = manifest.resolve_path(path).ok_or_else(|| {
                WayfinderError::ManifestError(format!("no path entry for '{path}'"))
            })?;

            let target = self.fetch_and_verify(target_id, semaphore).await?;
            visited.push(target.clone());

            if target.content_type.as_deref() == Some(MANIFEST_CONTENT_TYPE) {
                return self.resolve_depth(target_id, path, depth + 1, max_depth, semaphore, visited).await;
            }

            Ok(target)
        })
    }

    async fn fetch_manifest(&self, tx_id: &str, semaphore: &Arc<Semaphore>) -> Result<Manifest, WayfinderError> {
        let resource = self
            .manifest_cache
            .get_or_fetch(tx_id, || async {
                let _permit = semaphore.acquire().await.map_err(|_| WayfinderError::Cancelled)?;
                let content = self.fetcher.fetch(tx_id).await?;
                Ok(CachedResource {
                    tx_id: tx_id.to_string(),
                    bytes: Some(content.bytes),
                    content_type: content.content_type,
                    headers: content.headers,
                    verified: false,
                    error: None,
                    expires_at: SystemTime::now() + self.manifest_cache.ttl(),
                })
            })
            .await?;

        let bytes = resource
            .bytes
            .ok_or_else(|| WayfinderError::ManifestError("manifest body missing".into()))?;
        let manifest: Manifest = serde_json::from_slice(&bytes)?;
        if !manifest.is_valid_schema() {
            return Err(WayfinderError::ManifestError(format!(
                "manifest {tx_id} failed schema validation"
            )));
        }
        Ok(manifest)
    }

    async fn fetch_and_verify(
        &self,
        tx_id: &str,
        semaphore: &Arc<Semaphore>,
    ) -> Result<CachedResource, WayfinderError> {
        self.content_cache
            .get_or_fetch(tx_id, || async {
                let _permit = semaphore.acquire().await.map_err(|_| WayfinderError::Cancelled)?;
                let content = self.fetcher.fetch(tx_id).await?;
                let verify_result = self.verifier.verify(tx_id, &content.bytes, &content.headers).await;
                let (verified, error) = match verify_result {
                    Ok(()) => (true, None),
                    Err(e) => (false, Some(e.to_string())),
                };
                Ok(CachedResource {
                    tx_id: tx_id.to_string(),
                    bytes: Some(content.bytes),
                    content_type: content.content_type,
                    headers: content.headers,
                    verified,
                    error,
                    expires_at: SystemTime::now() + self.content_cache.ttl(),
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeFetcher {
        pages: Mutex<HashMap<String, String>>,
        fetch_count: AtomicUsize,
    }

    #[async_trait]
    impl ContentFetcher for FakeFetcher {
        async fn fetch(&self, tx_id: &str) -> Result<FetchedContent, WayfinderError> {
            self.fetch_count.fetch_add(1, Ordering::SeqCst);
            let pages = self.pages.lock().unwrap();
            let body = pages
                .get(tx_id)
                .cloned()
                .ok_or_else(|| WayfinderError::NetworkError(format!("404: {tx_id}")))?;
            let content_type = if tx_id.starts_with("manifest-") {
                Some(MANIFEST_CONTENT_TYPE.to_string())
            } else {
                Some("text/html".to_string())
            };
            Ok(FetchedContent {
                bytes: bytes::Bytes::from(body),
                content_type,
                headers: HashMap::new(),
            })
        }
    }

    const ID_INDEX: &str = "1111111111111111111111111111111111111111111";
    const ID_APP: &str = "2222222222222222222222222222222222222222222";

    fn manifest_json() -> String {
        format!(
            r#"{{"manifest":"arweave/paths","version":"0.1.0","index":{{"path":"index.html"}},"paths":{{"index.html":{{"id":"{ID_INDEX}"}},"app.js":{{"id":"{ID_APP}"}}}}}}"#
        )
    }

    fn resolver_with(pages: HashMap<String, String>) -> (ManifestResolver, Arc<FakeFetcher>) {
        let fetcher = Arc::new(FakeFetcher {
            pages: Mutex::new(pages),
            fetch_count: AtomicUsize::new(0),
        });
        let resolver = ManifestResolver::new(
            fetcher.clone(),
            Arc::new(NoopVerifier),
            Duration::from_secs(60),
            4,
            DEFAULT_MAX_DEPTH,
        );
        (resolver, fetcher)
    }

    #[tokio::test]
    async fn test_resolve_known_path() {
        let mut pages = HashMap::new();
        pages.insert("manifest-1".to_string(), manifest_json());
        pages.insert(ID_APP.to_string(), "console.log(1)".to_string());
        let (resolver, _) = resolver_with(pages);

        let resource = resolver.resolve("manifest-1", "app.js").await.unwrap();
        assert_eq!(resource.tx_id, ID_APP);
        assert!(resource.verified);
    }

    #[tokio::test]
    async fn test_resolve_index_on_empty_path() {
        let mut pages = HashMap::new();
        pages.insert("manifest-1".to_string(), manifest_json());
        pages.insert(ID_INDEX.to_string(), "<html></html>".to_string());
        let (resolver, _) = resolver_with(pages);

        let resource = resolver.resolve("manifest-1", "").await.unwrap();
        assert_eq!(resource.tx_id, ID_INDEX);
    }

    #[tokio::test]
    async fn test_resolve_missing_path_errors() {
        let mut pages = HashMap::new();
        pages.insert("manifest-1".to_string(), manifest_json());
        let (resolver, _) = resolver_with(pages);

        let err = resolver.resolve("manifest-1", "missing.png").await;
        assert!(matches!(err, Err(WayfinderError::ManifestError(_))));
    }

    #[tokio::test]
    async fn test_invalid_schema_manifest_errors() {
        let mut pages = HashMap::new();
        pages.insert(
            "manifest-1".to_string(),
            r#"{"manifest":"not-a-manifest","version":"0.1.0","paths":{}}"#.to_string(),
        );
        let (resolver, _) = resolver_with(pages);

        let err = resolver.resolve("manifest-1", "anything").await;
        assert!(matches!(err, Err(WayfinderError::ManifestError(_))));
    }

    #[tokio::test]
    async fn test_concurrent_resolves_coalesce_fetches() {
        let mut pages = HashMap::new();
        pages.insert("manifest-1".to_string(), manifest_json());
        pages.insert(ID_APP.to_string(), "console.log(1)".to_string());
        let (resolver, fetcher) = resolver_with(pages);
        let resolver = Arc::new(resolver);

        let mut handles = Vec::new();
        for _ in 0..10 {
            let resolver = resolver.clone();
            handles.push(tokio::spawn(async move {
                resolver.resolve("manifest-1", "app.js").await.unwrap()
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        // one fetch for the manifest, one for app.js
        assert_eq!(fetcher.fetch_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_resolve_with_options_reports_visited_resources() {
        let mut pages = HashMap::new();
        pages.insert("manifest-1".to_string(), manifest_json());
        pages.insert(ID_APP.to_string(), "console.log(1)".to_string());
        let (resolver, _) = resolver_with(pages);

        let (resource, visited) = resolver
            .resolve_with_options("manifest-1", "app.js", Some(2), Some(1))
            .await
            .unwrap();
        assert_eq!(resource.tx_id, ID_APP);
        assert_eq!(visited.len(), 1);
        assert!(visited[0].verified);
    }

    #[tokio::test]
    async fn test_max_depth_override_is_enforced() {
        let mut pages = HashMap::new();
        pages.insert("manifest-1".to_string(), manifest_json());
        let (resolver, _) = resolver_with(pages);

        let err = resolver
            .resolve_with_options("manifest-1", "app.js", Some(0), None)
            .await;
        assert!(matches!(err, Err(WayfinderError::ManifestError(_))));
    }
}
