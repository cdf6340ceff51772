use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use wayfinder_core::{Gateway, WayfinderError};

use crate::probe::probe;
use crate::provider::GatewayProvider;

/// The routing request context — the subdomain/path pair `UrlResolver::extract`
/// produced, handed to the strategy so host-aware strategies (none currently
/// need it, but `FastestPing`/`PreferredWithFallback` probe the constructed
/// URL) can build a real request.
pub struct SelectContext<'a> {
    pub subdomain: &'a str,
    pub path: &'a str,
}

#[async_trait]
pub trait RoutingStrategy: Send + Sync {
    async fn select_gateway(&self, ctx: &SelectContext<'_>) -> Result<Gateway, WayfinderError>;
}

async fn online_candidates(
    provider: &dyn GatewayProvider,
) -> Result<Vec<Gateway>, WayfinderError> {
    let all = provider.get_gateways().await?;
    let online: Vec<Gateway> = all.into_iter().filter(Gateway::is_online).collect();
    if online.is_empty() {
        return Err(WayfinderError::NoGatewayAvailable(
            "no online gateways in candidate set".into(),
        ));
    }
    Ok(online)
}

/// Uniform random choice among online gateways.
pub struct RandomStrategy {
    provider: Arc<dyn GatewayProvider>,
}

impl RandomStrategy {
    pub fn new(provider: Arc<dyn GatewayProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl RoutingStrategy for RandomStrategy {
    async fn select_gateway(&self, _ctx: &SelectContext<'_>) -> Result<Gateway, WayfinderError> {
        let candidates = online_candidates(self.provider.as_ref()).await?;
        Ok(candidates
            .choose(&mut rand::thread_rng())
            .expect("non-empty candidate set")
            .clone())
    }
}

/// Picks a gateway with probability proportional to its stake. Falls back to
/// uniform random when every candidate's stake is zero.
pub struct StakeWeightedStrategy {
    provider: Arc<dyn GatewayProvider>,
}

impl StakeWeightedStrategy {
    pub fn new(provider: Arc<dyn GatewayProvider>) -> Self {
        Self { provider }
    }
}

fn pick_stake_weighted(candidates: &[Gateway]) -> Gateway {
    let total: u64 = candidates.iter().map(Gateway::stake).sum();
    if total == 0 {
        return candidates
            .choose(&mut rand::thread_rng())
            .expect("non-empty candidate set")
            .clone();
    }
    let mut r = rand::thread_rng().gen_range(0..total);
    for gw in candidates {
        let stake = gw.stake();
        if r < stake {
            return gw.clone();
        }
        r -= stake;
    }
    candidates.last().expect("non-empty candidate set").clone()
}

#[async_trait]
impl RoutingStrategy for StakeWeightedStrategy {
    async fn select_gateway(&self, _ctx: &SelectContext<'_>) -> Result<Gateway, WayfinderError> {
        let candidates = online_candidates(self.provider.as_ref()).await?;
        Ok(pick_stake_weighted(&candidates))
    }
}

/// Picks among the gateways tied for the highest stake, uniformly at random.
pub struct HighestStakeStrategy {
    provider: Arc<dyn GatewayProvider>,
}

impl HighestStakeStrategy {
    pub fn new(provider: Arc<dyn GatewayProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl RoutingStrategy for HighestStakeStrategy {
    async fn select_gateway(&self, _ctx: &SelectContext<'_>) -> Result<Gateway, WayfinderError> {
        let candidates = online_candidates(self.provider.as_ref()).await?;
        let max_stake = candidates.iter().map(Gateway::stake).max().unwrap_or(0);
        let top: Vec<&Gateway> = candidates
            .iter()
            .filter(|g| g.stake() == max_stake)
            .collect();
        Ok((*top.choose(&mut rand::thread_rng()).expect("non-empty top set")).clone())
    }
}

/// Sorts by stake descending, takes the top `k`, then picks uniformly at random.
pub struct TopKStakeRandomStrategy {
    provider: Arc<dyn GatewayProvider>,
    k: usize,
}

impl TopKStakeRandomStrategy {
    pub fn new(provider: Arc<dyn GatewayProvider>, k: usize) -> Self {
        Self { provider, k }
    }
}

#[async_trait]
impl RoutingStrategy for TopKStakeRandomStrategy {
    async fn select_gateway(&self, _ctx: &SelectContext<'_>) -> Result<Gateway, WayfinderError> {
        let mut candidates = online_candidates(self.provider.as_ref()).await?;
        candidates.sort_by(|a, b| b.stake().cmp(&a.stake()));
        candidates.truncate(self.k.max(1));
        Ok(candidates
            .choose(&mut rand::thread_rng())
            .expect("non-empty top-k set")
            .clone())
    }
}

/// Cycles through the candidate set in order, one gateway per call.
pub struct RoundRobinStrategy {
    provider: Arc<dyn GatewayProvider>,
    counter: AtomicUsize,
}

impl RoundRobinStrategy {
    pub fn new(provider: Arc<dyn GatewayProvider>) -> Self {
        Self {
            provider,
            counter: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RoutingStrategy for RoundRobinStrategy {
    async fn select_gateway(&self, _ctx: &SelectContext<'_>) -> Result<Gateway, WayfinderError> {
        let candidates = online_candidates(self.provider.as_ref()).await?;
        let i = self.counter.fetch_add(1, Ordering::Relaxed) % candidates.len();
        Ok(candidates[i].clone())
    }
}

/// Always returns the same configured gateway, ignoring the provider entirely.
pub struct StaticStrategy {
    gateway: Gateway,
}

impl StaticStrategy {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl RoutingStrategy for StaticStrategy {
    async fn select_gateway(&self, _ctx: &SelectContext<'_>) -> Result<Gateway, WayfinderError> {
        Ok(self.gateway.clone())
    }
}

/// Probes up to `max_concurrency` candidates concurrently with a HEAD request
/// and returns the first to answer within `timeout`. Falls back to
/// `RandomStrategy` semantics over the full candidate set if none answer.
pub struct FastestPingStrategy {
    provider: Arc<dyn GatewayProvider>,
    client: Client,
    max_concurrency: usize,
    timeout: Duration,
}

impl FastestPingStrategy {
    pub fn new(provider: Arc<dyn GatewayProvider>, max_concurrency: usize, timeout: Duration) -> Self {
        Self {
            provider,
            client: Client::new(),
            max_concurrency: max_concurrency.max(1),
            timeout,
        }
    }
}

#[async_trait]
impl RoutingStrategy for FastestPingStrategy {
    async fn select_gateway(&self, ctx: &SelectContext<'_>) -> Result<Gateway, WayfinderError> {
        let candidates = online_candidates(self.provider.as_ref()).await?;

        for chunk in candidates.chunks(self.max_concurrency) {
            let probes = chunk.iter().map(|gw| {
                let client = self.client.clone();
                let timeout = self.timeout;
                let url = wayfinder_core::UrlResolver::construct(gw, ctx.subdomain, ctx.path);
                async move {
                    match url {
                        Ok(url) => probe(&client, &url, timeout).await,
                        Err(_) => false,
                    }
                }
            });
            let results = futures::future::join_all(probes).await;
            if let Some((gw, _)) = chunk.iter().zip(results).find(|(_, ok)| *ok) {
                return Ok(gw.clone());
            }
        }

        warn!("fastest-ping strategy found no responsive gateway, falling back to random choice");
        Ok(candidates
            .choose(&mut rand::thread_rng())
            .expect("non-empty candidate set")
            .clone())
    }
}

/// Probes a preferred gateway; on success, returns it. On failure, delegates
/// to an inner fallback strategy.
pub struct PreferredWithFallbackStrategy {
    preferred: Gateway,
    fallback: Arc<dyn RoutingStrategy>,
    client: Client,
    timeout: Duration,
}

impl PreferredWithFallbackStrategy {
    pub fn new(preferred: Gateway, fallback: Arc<dyn RoutingStrategy>, timeout: Duration) -> Self {
        Self {
            preferred,
            fallback,
            client: Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl RoutingStrategy for PreferredWithFallbackStrategy {
    async fn select_gateway(&self, ctx: &SelectContext<'_>) -> Result<Gateway, WayfinderError> {
        let url = wayfinder_core::UrlResolver::construct(&self.preferred, ctx.subdomain, ctx.path)?;
        if probe(&self.client, &url, self.timeout).await {
            return Ok(self.preferred.clone());
        }
        warn!(
            preferred = %self.preferred.url,
            "preferred gateway unresponsive, delegating to fallback strategy"
        );
        self.fallback.select_gateway(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StaticGatewayProvider;

    fn gw(url: &str, stake: u64) -> Gateway {
        Gateway::from_str(url).unwrap().with_stake(stake)
    }

    fn ctx<'a>() -> SelectContext<'a> {
        SelectContext {
            subdomain: "",
            path: "/",
        }
    }

    #[tokio::test]
    async fn test_random_picks_from_candidates() {
        let provider = Arc::new(StaticGatewayProvider::new(vec![
            gw("http://a.example", 0),
            gw("http://b.example", 0),
        ]));
        let strategy = RandomStrategy::new(provider);
        let picked = strategy.select_gateway(&ctx()).await.unwrap();
        assert!(["a.example", "b.example"].contains(&picked.host()));
    }

    #[tokio::test]
    async fn test_highest_stake_always_wins() {
        let provider = Arc::new(StaticGatewayProvider::new(vec![
            gw("http://low.example", 1),
            gw("http://high.example", 100),
        ]));
        let strategy = HighestStakeStrategy::new(provider);
        let picked = strategy.select_gateway(&ctx()).await.unwrap();
        assert_eq!(picked.host(), "high.example");
    }

    #[tokio::test]
    async fn test_stake_weighted_zero_stake_falls_back_to_uniform() {
        let provider = Arc::new(StaticGatewayProvider::new(vec![
            gw("http://a.example", 0),
            gw("http://b.example", 0),
        ]));
        let strategy = StakeWeightedStrategy::new(provider);
        let picked = strategy.select_gateway(&ctx()).await.unwrap();
        assert!(["a.example", "b.example"].contains(&picked.host()));
    }

    #[tokio::test]
    async fn test_stake_weighted_distribution_favors_higher_stake() {
        let candidates = vec![gw("http://low.example", 1), gw("http://high.example", 99)];
        let mut high_count = 0;
        for _ in 0..500 {
            if pick_stake_weighted(&candidates).host() == "high.example" {
                high_count += 1;
            }
        }
        // overwhelmingly likely to land above 80% with a 99:1 weighting
        assert!(high_count > 400, "high_count={high_count}");
    }

    #[tokio::test]
    async fn test_top_k_stake_random_restricts_to_top_k() {
        let provider = Arc::new(StaticGatewayProvider::new(vec![
            gw("http://low.example", 1),
            gw("http://mid.example", 50),
            gw("http://high.example", 100),
        ]));
        let strategy = TopKStakeRandomStrategy::new(provider, 2);
        for _ in 0..20 {
            let picked = strategy.select_gateway(&ctx()).await.unwrap();
            assert_ne!(picked.host(), "low.example");
        }
    }

    #[tokio::test]
    async fn test_round_robin_cycles() {
        let provider = Arc::new(StaticGatewayProvider::new(vec![
            gw("http://a.example", 0),
            gw("http://b.example", 0),
        ]));
        let strategy = RoundRobinStrategy::new(provider);
        let first = strategy.select_gateway(&ctx()).await.unwrap();
        let second = strategy.select_gateway(&ctx()).await.unwrap();
        let third = strategy.select_gateway(&ctx()).await.unwrap();
        assert_ne!(first.host(), second.host());
        assert_eq!(first.host(), third.host());
    }

    #[tokio::test]
    async fn test_static_strategy_ignores_provider() {
        let strategy = StaticStrategy::new(gw("http://fixed.example", 0));
        let picked = strategy.select_gateway(&ctx()).await.unwrap();
        assert_eq!(picked.host(), "fixed.example");
    }

    #[tokio::test]
    async fn test_no_online_candidates_errors() {
        let provider = Arc::new(StaticGatewayProvider::new(vec![Gateway::from_str(
            "http://a.example",
        )
        .unwrap()
        .with_status(wayfinder_core::GatewayStatus::Leaving)]));
        let strategy = RandomStrategy::new(provider);
        assert!(strategy.select_gateway(&ctx()).await.is_err());
    }

    #[tokio::test]
    async fn test_preferred_with_fallback_falls_back_on_unreachable_preferred() {
        let preferred = gw("http://127.0.0.1:1", 0);
        let fallback_provider = Arc::new(StaticGatewayProvider::new(vec![gw(
            "http://backup.example",
            0,
        )]));
        let fallback = Arc::new(RandomStrategy::new(fallback_provider));
        let strategy = PreferredWithFallbackStrategy::new(
            preferred,
            fallback,
            Duration::from_millis(150),
        );
        let picked = strategy.select_gateway(&ctx()).await.unwrap();
        assert_eq!(picked.host(), "backup.example");
    }
}
