use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;
use wayfinder_core::{Gateway, WayfinderError};

/// Supplies the current candidate gateway set. Implementations never return
/// an empty, successful list — empty is treated as failure by callers.
#[async_trait]
pub trait GatewayProvider: Send + Sync {
    async fn get_gateways(&self) -> Result<Vec<Gateway>, WayfinderError>;
}

/// Returns a fixed list, unconditionally.
pub struct StaticGatewayProvider {
    gateways: Vec<Gateway>,
}

impl StaticGatewayProvider {
    pub fn new(gateways: Vec<Gateway>) -> Self {
        Self { gateways }
    }
}

#[async_trait]
impl GatewayProvider for StaticGatewayProvider {
    async fn get_gateways(&self) -> Result<Vec<Gateway>, WayfinderError> {
        if self.gateways.is_empty() {
            return Err(WayfinderError::NoGatewayAvailable(
                "static provider has no gateways configured".into(),
            ));
        }
        Ok(self.gateways.clone())
    }
}

/// HTTP GET against a configured directory endpoint. Tolerates three JSON
/// shapes: `{gateways: {<address>: Gateway}}`, `{state: {gateways: ...}}`,
/// or `{result: ...}` — "accept any" per §4.2.
pub struct NetworkGatewayProvider {
    client: Client,
    directory_url: String,
}

impl NetworkGatewayProvider {
    pub fn new(client: Client, directory_url: impl Into<String>) -> Self {
        Self {
            client,
            directory_url: directory_url.into(),
        }
    }
}

#[async_trait]
impl GatewayProvider for NetworkGatewayProvider {
    async fn get_gateways(&self) -> Result<Vec<Gateway>, WayfinderError> {
        let resp = self
            .client
            .get(&self.directory_url)
            .send()
            .await
            .map_err(|e| WayfinderError::NetworkError(e.to_string()))?;
        let body: Value = resp
            .json()
            .await
            .map_err(|e| WayfinderError::NetworkError(e.to_string()))?;

        let gateways_value = body
            .get("gateways")
            .or_else(|| body.get("state").and_then(|s| s.get("gateways")))
            .or_else(|| body.get("result"))
            .ok_or_else(|| {
                WayfinderError::NoGatewayAvailable(
                    "directory response had no recognizable gateway list".into(),
                )
            })?;

        let gateways = parse_gateway_directory(gateways_value);
        if gateways.is_empty() {
            return Err(WayfinderError::NoGatewayAvailable(
                "directory response contained zero usable gateways".into(),
            ));
        }
        Ok(gateways)
    }
}

fn parse_gateway_directory(value: &Value) -> Vec<Gateway> {
    let mut out = Vec::new();
    match value {
        Value::Object(map) => {
            for (address, entry) in map {
                if let Some(gw) = parse_gateway_entry(address, entry) {
                    out.push(gw);
                }
            }
        }
        Value::Array(items) => {
            for (i, entry) in items.iter().enumerate() {
                let key = i.to_string();
                if let Some(gw) = parse_gateway_entry(&key, entry) {
                    out.push(gw);
                }
            }
        }
        _ => {}
    }
    out
}

fn parse_gateway_entry(address: &str, entry: &Value) -> Option<Gateway> {
    let url_str = entry
        .get("url")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| build_url_from_settings(entry))?;

    let mut gw = Gateway::from_str(&url_str)
        .inspect_err(|e| warn!(address, error = %e, "skipping gateway with malformed URL"))
        .ok()?;

    if let Some(stake) = entry
        .get("operatorStake")
        .or_else(|| entry.get("operator_stake"))
        .and_then(Value::as_u64)
    {
        gw.operator_stake = Some(stake);
    }

    Some(gw)
}

fn build_url_from_settings(entry: &Value) -> Option<String> {
    let settings = entry.get("settings")?;
    let fqdn = settings.get("fqdn").and_then(Value::as_str)?;
    let protocol = settings
        .get("protocol")
        .and_then(Value::as_str)
        .unwrap_or("https");
    let port = settings.get("port").and_then(Value::as_u64);
    Some(match port {
        Some(p) => format!("{protocol}://{fqdn}:{p}"),
        None => format!("{protocol}://{fqdn}"),
    })
}

/// GET `{trustedGateway}/ar-io/peers`; emits gateways from the `gateways`
/// sub-object's `url` fields, skipping malformed URLs.
pub struct TrustedPeersGatewayProvider {
    client: Client,
    trusted_gateway: String,
}

impl TrustedPeersGatewayProvider {
    pub fn new(client: Client, trusted_gateway: impl Into<String>) -> Self {
        Self {
            client,
            trusted_gateway: trusted_gateway.into(),
        }
    }
}

#[async_trait]
impl GatewayProvider for TrustedPeersGatewayProvider {
    async fn get_gateways(&self) -> Result<Vec<Gateway>, WayfinderError> {
        let url = format!("{}/ar-io/peers", self.trusted_gateway.trim_end_matches('/'));
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| WayfinderError::NetworkError(e.to_string()))?;
        let body: Value = resp
            .json()
            .await
            .map_err(|e| WayfinderError::NetworkError(e.to_string()))?;

        let mut gateways = Vec::new();
        if let Some(Value::Object(peers)) = body.get("gateways") {
            for (address, peer) in peers {
                let Some(url) = peer.get("url").and_then(Value::as_str) else {
                    continue;
                };
                match Gateway::from_str(url) {
                    Ok(gw) => gateways.push(gw),
                    Err(e) => warn!(address, error = %e, "skipping malformed peer URL"),
                }
            }
        }

        if gateways.is_empty() {
            return Err(WayfinderError::NoGatewayAvailable(format!(
                "trusted peers endpoint {url} returned no usable gateways"
            )));
        }
        Ok(gateways)
    }
}

/// Tries each provider in order; the first to return a non-empty list wins.
/// Earlier failures are swallowed (logged at `warn`).
pub struct CompositeGatewayProvider {
    providers: Vec<Arc<dyn GatewayProvider>>,
}

impl CompositeGatewayProvider {
    pub fn new(providers: Vec<Arc<dyn GatewayProvider>>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl GatewayProvider for CompositeGatewayProvider {
    async fn get_gateways(&self) -> Result<Vec<Gateway>, WayfinderError> {
        for provider in &self.providers {
            match provider.get_gateways().await {
                Ok(gateways) if !gateways.is_empty() => return Ok(gateways),
                Ok(_) => warn!("gateway provider returned an empty list, trying next"),
                Err(e) => warn!(error = %e, "gateway provider failed, trying next"),
            }
        }
        Err(WayfinderError::NoGatewayAvailable(
            "all providers exhausted".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider_returns_configured_list() {
        let gws = vec![Gateway::from_str("http://a.example").unwrap()];
        let provider = StaticGatewayProvider::new(gws.clone());
        let got = provider.get_gateways().await.unwrap();
        assert_eq!(got, gws);
    }

    #[tokio::test]
    async fn test_static_provider_empty_is_failure() {
        let provider = StaticGatewayProvider::new(vec![]);
        assert!(provider.get_gateways().await.is_err());
    }

    #[tokio::test]
    async fn test_composite_falls_through_on_failure() {
        struct AlwaysFails;
        #[async_trait]
        impl GatewayProvider for AlwaysFails {
            async fn get_gateways(&self) -> Result<Vec<Gateway>, WayfinderError> {
                Err(WayfinderError::NetworkError("down".into()))
            }
        }
        struct AlwaysEmpty;
        #[async_trait]
        impl GatewayProvider for AlwaysEmpty {
            async fn get_gateways(&self) -> Result<Vec<Gateway>, WayfinderError> {
                Ok(vec![])
            }
        }
        let good = StaticGatewayProvider::new(vec![Gateway::from_str("http://good.example").unwrap()]);
        let composite = CompositeGatewayProvider::new(vec![
            Arc::new(AlwaysFails),
            Arc::new(AlwaysEmpty),
            Arc::new(good),
        ]);
        let got = composite.get_gateways().await.unwrap();
        assert_eq!(got[0].url.host_str(), Some("good.example"));
    }

    #[tokio::test]
    async fn test_composite_all_exhausted() {
        struct AlwaysFails;
        #[async_trait]
        impl GatewayProvider for AlwaysFails {
            async fn get_gateways(&self) -> Result<Vec<Gateway>, WayfinderError> {
                Err(WayfinderError::NetworkError("down".into()))
            }
        }
        let composite = CompositeGatewayProvider::new(vec![Arc::new(AlwaysFails)]);
        assert!(composite.get_gateways().await.is_err());
    }

    #[test]
    fn test_parse_gateway_directory_map_shape() {
        let value: Value = serde_json::from_str(
            r#"{"abc": {"settings": {"fqdn": "permagate.io", "protocol": "https"}, "operatorStake": 42}}"#,
        )
        .unwrap();
        let gateways = parse_gateway_directory(&value);
        assert_eq!(gateways.len(), 1);
        assert_eq!(gateways[0].url.host_str(), Some("permagate.io"));
        assert_eq!(gateways[0].stake(), 42);
    }
}
