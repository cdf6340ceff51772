use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tracing::{info, warn};
use wayfinder_core::{
    create_wayfinder_url, CachedResource, Manifest, ResolveInput, RoutingInput, UrlResolver,
    WayfinderError, WayfinderUri,
};
use wayfinder_gateway::{RoutingStrategy, SelectContext};
use wayfinder_manifest::ManifestResolver;
use wayfinder_observability::{EventEmitter, TelemetryExporter, WayfinderEvent};
use wayfinder_verify::{effective_verification_id, VerificationStrategy};

use crate::retriever::DataRetriever;

const MANIFEST_CONTENT_TYPE: &str = "application/x.arweave-manifest+json";

/// The result of a successful `WayfinderFacade::request` call.
pub struct WayfinderResponse {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub headers: HashMap<String, String>,
    pub gateway: String,
    pub verified: bool,
}

/// Per-request overrides for `requestWithManifest`'s manifest resolution
/// (§4.7); `None` falls back to the facade's configured `ManifestSettings`.
#[derive(Debug, Clone, Default)]
pub struct ManifestRequestOptions {
    pub max_depth: Option<usize>,
    pub concurrency: Option<usize>,
}

/// `requestWithManifest`'s return shape: the resolved response plus the
/// manifest itself and a per-resource verification breakdown (§6).
pub struct WayfinderManifestResponse {
    pub response: WayfinderResponse,
    pub manifest: Option<Manifest>,
    pub verification_results: Vec<(String, bool)>,
    pub all_verified: bool,
}

/// Orchestrates routing, retrieval, manifest resolution, and verification
/// for a single `ar://` input — the one entry point a host application
/// talks to (§4.8 Facade).
pub struct WayfinderFacade {
    pub(crate) routing_strategy: Arc<dyn RoutingStrategy>,
    pub(crate) retriever: DataRetriever,
    pub(crate) manifest_resolver: Option<Arc<ManifestResolver>>,
    pub(crate) verification_strategy: Option<Arc<dyn VerificationStrategy>>,
    pub(crate) verification_strict: bool,
    pub(crate) routing_strategy_name: String,
    pub(crate) verification_strategy_name: Option<String>,
    pub(crate) default_trusted_gateway: String,
    pub(crate) emitter: Arc<EventEmitter>,
    pub(crate) telemetry: TelemetryExporter,
}

impl WayfinderFacade {
    /// `createWayfinderUrl` / `resolveUrl` — normalizes any supported input
    /// into a canonical `ar://` string without performing any network I/O.
    pub fn resolve_url(&self, input: ResolveInput) -> Result<String, WayfinderError> {
        create_wayfinder_url(input)
    }

    pub async fn request(&self, ar_url: &str) -> Result<WayfinderResponse, WayfinderError> {
        let started = Instant::now();

        if !ar_url.starts_with("ar://") {
            self.emitter.emit(WayfinderEvent::RoutingSkipped {
                url: ar_url.to_string(),
            });
            return self.request_passthrough(ar_url).await;
        }

        let routing_input = UrlResolver::extract(ar_url);
        self.emitter.emit(WayfinderEvent::RoutingStarted {
            url: ar_url.to_string(),
        });

        let result = self.request_inner(ar_url, &routing_input).await;

        let (status, outcome) = match &result {
            Ok(resp) => (200u16, "ok"),
            Err(e) => (e.status_code(), "error"),
        };
        let gateway_host = result
            .as_ref()
            .map(|r| r.gateway.clone())
            .unwrap_or_default();
        self.telemetry.report(
            0.0,
            &gateway_host,
            ar_url,
            ar_url,
            status,
            started.elapsed().as_secs_f64() * 1000.0,
            &self.routing_strategy_name,
            self.verification_strategy_name.as_deref(),
        );
        if let Err(e) = &result {
            self.emitter.emit(WayfinderEvent::RoutingFailed {
                url: ar_url.to_string(),
                reason: e.to_string(),
            });
        }
        let _ = outcome;
        result
    }

    /// Resolves `ar://<manifest-id>[/path]` with explicit manifest controls,
    /// returning the manifest and per-resource verification results
    /// alongside the resolved response (§6 `requestWithManifest`).
    pub async fn request_with_manifest(
        &self,
        ar_url: &str,
        options: Option<ManifestRequestOptions>,
    ) -> Result<WayfinderManifestResponse, WayfinderError> {
        if !ar_url.starts_with("ar://") {
            return Err(WayfinderError::InvalidUrl(format!(
                "requestWithManifest requires an ar:// input, got '{ar_url}'"
            )));
        }

        let routing_input = UrlResolver::extract(ar_url);
        let tx_id = routing_input.tx_id.clone().ok_or_else(|| {
            WayfinderError::InvalidUrl(format!(
                "requestWithManifest requires a transaction id, got '{ar_url}'"
            ))
        })?;
        let resolver = self.manifest_resolver.as_ref().ok_or_else(|| {
            WayfinderError::ManifestError("manifest resolution is not configured".to_string())
        })?;

        let tail = request_tail(ar_url, &tx_id);
        let options = options.unwrap_or_default();
        let (resolved, visited) = resolver
            .resolve_with_options(&tx_id, &tail, options.max_depth, options.concurrency)
            .await?;

        if self.verification_strict && !resolved.verified {
            return Err(WayfinderError::verification_failed(
                resolved
                    .error
                    .clone()
                    .unwrap_or_else(|| "manifest content failed verification".to_string()),
            ));
        }

        self.emitter.emit(WayfinderEvent::ManifestProgress {
            tx_id: tx_id.clone(),
            path: tail.clone(),
        });

        let manifest = resolver.manifest(&tx_id).await.ok();
        let verification_results: Vec<(String, bool)> = visited
            .iter()
            .map(|r| (r.tx_id.clone(), r.verified))
            .collect();
        let all_verified = verification_results.iter().all(|(_, v)| *v);

        let response = self.into_response(resolved, self.default_trusted_gateway.clone());

        Ok(WayfinderManifestResponse {
            response,
            manifest,
            verification_results,
            all_verified,
        })
    }

    /// Fetches non-`ar://` input directly against its own URL, with no
    /// gateway selection and no verification — there is no tx id to verify
    /// against.
    async fn request_passthrough(&self, ar_url: &str) -> Result<WayfinderResponse, WayfinderError> {
        let url = url::Url::parse(ar_url).map_err(|e| WayfinderError::InvalidUrl(e.to_string()))?;
        let content = self.retriever.fetch(&url).await?;
        self.emitter.emit(WayfinderEvent::VerificationSkipped {
            tx_id: ar_url.to_string(),
            reason: "non-ar:// input is not verifiable".to_string(),
        });
        Ok(WayfinderResponse {
            bytes: content.bytes,
            content_type: content.content_type,
            headers: content.headers,
            gateway: url.host_str().unwrap_or_default().to_string(),
            verified: false,
        })
    }

    async fn request_inner(
        &self,
        ar_url: &str,
        routing_input: &RoutingInput,
    ) -> Result<WayfinderResponse, WayfinderError> {
        let ctx = SelectContext {
            subdomain: &routing_input.subdomain,
            path: &routing_input.path,
        };
        let gateway = self.routing_strategy.select_gateway(&ctx).await?;
        self.emitter.emit(WayfinderEvent::RoutingSucceeded {
            url: ar_url.to_string(),
            gateway: gateway.url.to_string(),
        });

        let target_url = UrlResolver::construct(&gateway, &routing_input.subdomain, &routing_input.path)?;
        let content = self.retriever.fetch(&target_url).await?;

        let is_manifest = content.content_type.as_deref() == Some(MANIFEST_CONTENT_TYPE);
        if is_manifest {
            if let (Some(resolver), Some(tx_id)) = (&self.manifest_resolver, &routing_input.tx_id) {
                let tail = request_tail(ar_url, tx_id);
                let resolved = resolver.resolve(tx_id, &tail).await?;
                if self.verification_strict && !resolved.verified {
                    return Err(WayfinderError::verification_failed(
                        resolved.error.unwrap_or_else(|| "manifest content failed verification".to_string()),
                    ));
                }
                return Ok(self.into_response(resolved, gateway.url.to_string()));
            }
        }

        let verified = self
            .verify_if_configured(routing_input.tx_id.as_deref(), &content.bytes, &content.headers, false)
            .await?;

        Ok(WayfinderResponse {
            bytes: content.bytes,
            content_type: content.content_type,
            headers: content.headers,
            gateway: gateway.url.to_string(),
            verified,
        })
    }

    async fn verify_if_configured(
        &self,
        tx_id: Option<&str>,
        bytes: &Bytes,
        headers: &HashMap<String, String>,
        raw: bool,
    ) -> Result<bool, WayfinderError> {
        let Some(tx_id) = tx_id else {
            self.emitter.emit(WayfinderEvent::VerificationSkipped {
                tx_id: String::new(),
                reason: "no transaction id to verify".to_string(),
            });
            return Ok(false);
        };
        let Some(strategy) = &self.verification_strategy else {
            self.emitter.emit(WayfinderEvent::VerificationSkipped {
                tx_id: tx_id.to_string(),
                reason: "no verification strategy configured".to_string(),
            });
            return Ok(false);
        };

        let effective_id = effective_verification_id(tx_id, headers, raw);
        self.emitter.emit(WayfinderEvent::VerificationStarted {
            tx_id: effective_id.clone(),
        });

        match strategy.verify(&effective_id, bytes, headers, raw).await {
            Ok(()) => {
                self.emitter.emit(WayfinderEvent::VerificationSucceeded {
                    tx_id: effective_id,
                });
                Ok(true)
            }
            Err(e) => {
                self.emitter.emit(WayfinderEvent::VerificationFailed {
                    tx_id: effective_id.clone(),
                    reason: e.to_string(),
                });
                if self.verification_strict {
                    Err(e)
                } else {
                    warn!(tx_id = %effective_id, error = %e, "verification failed in non-strict mode, serving content anyway");
                    self.emitter.emit(WayfinderEvent::VerificationWarning {
                        tx_id: effective_id,
                        reason: e.to_string(),
                    });
                    Ok(false)
                }
            }
        }
    }

    fn into_response(&self, resource: CachedResource, gateway: String) -> WayfinderResponse {
        info!(tx_id = %resource.tx_id, verified = resource.verified, "served manifest-resolved content");
        WayfinderResponse {
            bytes: resource.bytes.unwrap_or_default(),
            content_type: resource.content_type,
            headers: resource.headers,
            gateway,
            verified: resource.verified,
        }
    }
}

/// Recovers the sub-path requested within a manifest from the original
/// `ar://<tx_id>/<tail>` input, since `RoutingInput::path` carries the
/// sandboxed full path rather than the tail alone.
fn request_tail(ar_url: &str, tx_id: &str) -> String {
    match UrlResolver::parse(ar_url) {
        Some(WayfinderUri::TxId { id, tail }) if id == tx_id => {
            tail.trim_start_matches('/').to_string()
        }
        _ => String::new(),
    }
}
