use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use wayfinder_core::{
    FacadeOptions, Gateway as GatewayHandle, RoutingStrategyKind, VerificationStrategyKind,
    WayfinderError,
};
use wayfinder_gateway::{
    FastestPingStrategy, GatewayProvider, HighestStakeStrategy, PreferredWithFallbackStrategy,
    RandomStrategy, RoundRobinStrategy, RoutingStrategy, SimpleCacheGatewayProvider,
    StakeWeightedStrategy, StaticStrategy, TopKStakeRandomStrategy, TrustedPeersGatewayProvider,
};
use wayfinder_manifest::{ContentFetcher, ContentVerifier, FetchedContent, ManifestResolver, NoopVerifier};
use wayfinder_observability::{EventEmitter, TelemetryExporter};
use wayfinder_verify::{
    Ans104SignatureVerification, CompositeVerificationStrategy, HashVerification,
    TransactionSignatureVerification, TrustedGatewayRootSource, VerificationStrategy,
};

use crate::facade::WayfinderFacade;
use crate::retriever::DataRetriever;

const DEFAULT_GATEWAY_CACHE_TTL: Duration = Duration::from_secs(60);

/// Turns the serializable `FacadeOptions` shape into live trait objects and
/// assembles a `WayfinderFacade`. This is the only place in the workspace
/// that wires `wayfinder-gateway`, `wayfinder-verify`, and
/// `wayfinder-manifest` together.
pub struct WayfinderBuilder {
    options: FacadeOptions,
    client: Client,
}

impl WayfinderBuilder {
    pub fn new(options: FacadeOptions) -> Self {
        Self {
            options,
            client: Client::new(),
        }
    }

    pub fn build(self) -> Result<WayfinderFacade, WayfinderError> {
        let gateway_provider: Arc<dyn GatewayProvider> = Arc::new(SimpleCacheGatewayProvider::new(
            TrustedPeersGatewayProvider::new(
                self.client.clone(),
                self.options.default_trusted_gateway.clone(),
            ),
            DEFAULT_GATEWAY_CACHE_TTL,
        ));

        let routing_strategy = build_routing_strategy(&self.options.routing.strategy, gateway_provider.clone());
        let routing_strategy_name = routing_strategy_name(&self.options.routing.strategy);

        let root_source = Arc::new(TrustedGatewayRootSource::new(
            self.client.clone(),
            self.options.default_trusted_gateway.clone(),
        ));

        let verification_strategy: Option<Arc<dyn VerificationStrategy>> = if self.options.verification.enabled {
            Some(build_verification_strategy(
                &self.options.verification.strategy,
                root_source.clone(),
            ))
        } else {
            None
        };
        let verification_strategy_name = self
            .options
            .verification
            .enabled
            .then(|| verification_strategy_name(&self.options.verification.strategy));

        let retriever = DataRetriever::new(self.client.clone());

        let manifest_resolver = Some(Arc::new(ManifestResolver::new(
            Arc::new(RetrieverContentFetcher {
                retriever: DataRetriever::new(self.client.clone()),
                gateway_url: self.options.default_trusted_gateway.clone(),
            }),
            verification_strategy
                .clone()
                .map(|s| Arc::new(VerifierAdapter(s)) as Arc<dyn ContentVerifier>)
                .unwrap_or_else(|| Arc::new(NoopVerifier)),
            DEFAULT_GATEWAY_CACHE_TTL,
            self.options.manifest.concurrency,
            self.options.manifest.max_depth,
        )));

        Ok(WayfinderFacade {
            routing_strategy,
            retriever,
            manifest_resolver,
            verification_strategy,
            verification_strict: self.options.verification.strict,
            routing_strategy_name,
            verification_strategy_name,
            default_trusted_gateway: self.options.default_trusted_gateway.clone(),
            emitter: EventEmitter::new(),
            telemetry: TelemetryExporter::new(&self.options.telemetry),
        })
    }
}

/// Adapts a `VerificationStrategy` to the `ContentVerifier` interface the
/// manifest resolver expects, so `wayfinder-manifest` never needs to depend
/// on `wayfinder-verify` directly. Always verifies in `raw` mode — manifest
/// path resolution already names the exact tx id to check, so there's no
/// `x-ar-io-data-id`/`x-arns-resolved-id` header to disambiguate against.
struct VerifierAdapter(Arc<dyn VerificationStrategy>);

#[async_trait]
impl ContentVerifier for VerifierAdapter {
    async fn verify(
        &self,
        tx_id: &str,
        bytes: &bytes::Bytes,
        headers: &HashMap<String, String>,
    ) -> Result<(), WayfinderError> {
        self.0.verify(tx_id, bytes, headers, true).await
    }
}

/// Adapts `DataRetriever` to the `ContentFetcher` interface, fetching
/// directly against a fixed gateway (the configured default trusted
/// gateway) since manifest resolution happens independently of the
/// per-request routing decision.
struct RetrieverContentFetcher {
    retriever: DataRetriever,
    gateway_url: String,
}

#[async_trait]
impl ContentFetcher for RetrieverContentFetcher {
    async fn fetch(&self, tx_id: &str) -> Result<FetchedContent, WayfinderError> {
        let url_str = format!("{}/{tx_id}", self.gateway_url.trim_end_matches('/'));
        let url = url::Url::parse(&url_str).map_err(|e| WayfinderError::InvalidUrl(e.to_string()))?;
        let content = self.retriever.fetch(&url).await?;
        Ok(FetchedContent {
            bytes: content.bytes,
            content_type: content.content_type,
            headers: content.headers,
        })
    }
}

fn build_routing_strategy(
    kind: &RoutingStrategyKind,
    provider: Arc<dyn GatewayProvider>,
) -> Arc<dyn RoutingStrategy> {
    match kind {
        RoutingStrategyKind::Random => Arc::new(RandomStrategy::new(provider)),
        RoutingStrategyKind::StakeWeighted => Arc::new(StakeWeightedStrategy::new(provider)),
        RoutingStrategyKind::HighestStake => Arc::new(HighestStakeStrategy::new(provider)),
        RoutingStrategyKind::TopKStakeRandom { k } => Arc::new(TopKStakeRandomStrategy::new(provider, *k)),
        RoutingStrategyKind::RoundRobin => Arc::new(RoundRobinStrategy::new(provider)),
        RoutingStrategyKind::Static { gateway } => Arc::new(StaticStrategy::new(
            GatewayHandle::from_str(gateway).unwrap_or_else(|_| GatewayHandle::new(
                url::Url::parse("https://arweave.net").expect("static fallback url is valid"),
            )),
        )),
        RoutingStrategyKind::FastestPing { max_concurrency, timeout_ms } => Arc::new(
            FastestPingStrategy::new(provider, *max_concurrency, Duration::from_millis(*timeout_ms)),
        ),
        RoutingStrategyKind::PreferredWithFallback { preferred, timeout_ms } => {
            let preferred_gateway = GatewayHandle::from_str(preferred).unwrap_or_else(|_| {
                GatewayHandle::new(url::Url::parse("https://arweave.net").expect("fallback url is valid"))
            });
            let fallback = Arc::new(RandomStrategy::new(provider));
            Arc::new(PreferredWithFallbackStrategy::new(
                preferred_gateway,
                fallback,
                Duration::from_millis(*timeout_ms),
            ))
        }
    }
}

fn routing_strategy_name(kind: &RoutingStrategyKind) -> String {
    match kind {
        RoutingStrategyKind::Random => "random",
        RoutingStrategyKind::StakeWeighted => "stake-weighted",
        RoutingStrategyKind::HighestStake => "highest-stake",
        RoutingStrategyKind::TopKStakeRandom { .. } => "top-k-stake-random",
        RoutingStrategyKind::FastestPing { .. } => "fastest-ping",
        RoutingStrategyKind::PreferredWithFallback { .. } => "preferred-with-fallback",
        RoutingStrategyKind::RoundRobin => "round-robin",
        RoutingStrategyKind::Static { .. } => "static",
    }
    .to_string()
}

fn build_verification_strategy(
    kind: &VerificationStrategyKind,
    root_source: Arc<TrustedGatewayRootSource>,
) -> Arc<dyn VerificationStrategy> {
    match kind {
        VerificationStrategyKind::Hash { max_concurrency, trusted_gateways } => {
            Arc::new(HashVerification::new(trusted_gateways.clone(), *max_concurrency))
        }
        VerificationStrategyKind::Ans104Signature { max_concurrency, .. } => {
            Arc::new(Ans104SignatureVerification::new(root_source, *max_concurrency))
        }
        VerificationStrategyKind::TransactionSignature { .. } => {
            Arc::new(TransactionSignatureVerification::new(root_source))
        }
        VerificationStrategyKind::Composite { max_concurrency, trusted_gateways } => {
            Arc::new(CompositeVerificationStrategy::new(vec![
                Arc::new(Ans104SignatureVerification::new(root_source.clone(), *max_concurrency)),
                Arc::new(TransactionSignatureVerification::new(root_source)),
                Arc::new(HashVerification::new(trusted_gateways.clone(), *max_concurrency)),
            ]))
        }
    }
}

fn verification_strategy_name(kind: &VerificationStrategyKind) -> String {
    match kind {
        VerificationStrategyKind::Hash { .. } => "hash",
        VerificationStrategyKind::Ans104Signature { .. } => "ans104-signature",
        VerificationStrategyKind::TransactionSignature { .. } => "transaction-signature",
        VerificationStrategyKind::Composite { .. } => "composite",
    }
    .to_string()
}
