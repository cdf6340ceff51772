use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Top-level Wayfinder facade configuration (§6 "Configuration").
///
/// This is plain, serde-deserializable data — the strategy/provider `kind`
/// fields name *what* to build; `wayfinder::WayfinderBuilder` is what turns
/// a `FacadeOptions` into the live trait objects (`GatewayProvider`,
/// `RoutingStrategy`, `VerificationStrategy`) that actually do the work.
/// Keeping the shape here (rather than in the facade crate) lets it be
/// loaded from YAML/env the same way `ando-core::config::AndoConfig` is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacadeOptions {
    #[serde(default)]
    pub routing: RoutingSettings,

    #[serde(default)]
    pub verification: VerificationSettings,

    #[serde(default)]
    pub telemetry: TelemetrySettings,

    #[serde(default)]
    pub manifest: ManifestSettings,

    /// Trusted-gateway directory endpoint used by the default
    /// `TrustedPeers` gateway provider when no provider is supplied.
    #[serde(default = "default_trusted_gateway")]
    pub default_trusted_gateway: String,
}

/// Nested-manifest resolution limits (§4.7), overridable per-request via
/// `requestWithManifest`'s `{maxDepth?, concurrency?}` options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestSettings {
    #[serde(default = "default_manifest_max_depth")]
    pub max_depth: usize,

    #[serde(default = "default_manifest_concurrency")]
    pub concurrency: usize,
}

impl Default for ManifestSettings {
    fn default() -> Self {
        Self {
            max_depth: default_manifest_max_depth(),
            concurrency: default_manifest_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingSettings {
    #[serde(default)]
    pub strategy: RoutingStrategyKind,

    /// Emit routing lifecycle events (`routing-started`, `routing-succeeded`, ...).
    #[serde(default = "default_true")]
    pub events: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RoutingStrategyKind {
    Random,
    StakeWeighted,
    HighestStake,
    TopKStakeRandom {
        #[serde(default = "default_top_k")]
        k: usize,
    },
    FastestPing {
        #[serde(default = "default_probe_concurrency")]
        max_concurrency: usize,
        #[serde(default = "default_probe_timeout_ms")]
        timeout_ms: u64,
    },
    PreferredWithFallback {
        preferred: String,
        #[serde(default = "default_probe_timeout_ms")]
        timeout_ms: u64,
    },
    RoundRobin,
    Static {
        gateway: String,
    },
}

impl Default for RoutingStrategyKind {
    fn default() -> Self {
        RoutingStrategyKind::Random
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSettings {
    #[serde(default)]
    pub enabled: bool,

    /// Strict mode surfaces verification failures on the client stream;
    /// non-strict only emits events.
    #[serde(default)]
    pub strict: bool,

    #[serde(default)]
    pub strategy: VerificationStrategyKind,

    #[serde(default = "default_true")]
    pub events: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum VerificationStrategyKind {
    Hash {
        #[serde(default = "default_one")]
        max_concurrency: usize,
        trusted_gateways: Vec<String>,
    },
    Ans104Signature {
        #[serde(default = "default_one")]
        max_concurrency: usize,
        trusted_gateways: Vec<String>,
    },
    TransactionSignature {
        trusted_gateways: Vec<String>,
    },
    /// Dispatches on `RootTransactionSource::getRootTransaction` to either
    /// Ans104 or L1 transaction verification, and is manifest-aware.
    Composite {
        #[serde(default = "default_one")]
        max_concurrency: usize,
        trusted_gateways: Vec<String>,
    },
}

impl Default for VerificationStrategyKind {
    fn default() -> Self {
        VerificationStrategyKind::Hash {
            max_concurrency: 1,
            trusted_gateways: vec!["https://arweave.net".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub exporter_url: Option<String>,

    #[serde(default)]
    pub client_name: Option<String>,

    #[serde(default)]
    pub client_version: Option<String>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            sample_rate: default_sample_rate(),
            api_key: None,
            exporter_url: None,
            client_name: None,
            client_version: None,
        }
    }
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            strategy: RoutingStrategyKind::default(),
            events: true,
        }
    }
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            strict: false,
            strategy: VerificationStrategyKind::default(),
            events: true,
        }
    }
}

impl Default for FacadeOptions {
    fn default() -> Self {
        Self {
            routing: RoutingSettings::default(),
            verification: VerificationSettings::default(),
            telemetry: TelemetrySettings::default(),
            manifest: ManifestSettings::default(),
            default_trusted_gateway: default_trusted_gateway(),
        }
    }
}

impl FacadeOptions {
    /// Load configuration from a YAML file, overridden by `WAYFINDER_`-prefixed
    /// environment variables (e.g. `WAYFINDER_VERIFICATION__STRICT=true`).
    pub fn from_yaml_file(path: &str) -> anyhow::Result<Self> {
        let figment = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("WAYFINDER_").split("__"));
        Ok(figment.extract()?)
    }

    /// Load configuration from environment variables only, layered over defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let figment = Figment::from(figment::providers::Serialized::defaults(Self::default()))
            .merge(Env::prefixed("WAYFINDER_").split("__"));
        Ok(figment.extract()?)
    }
}

fn default_true() -> bool {
    true
}
fn default_one() -> usize {
    1
}
fn default_top_k() -> usize {
    5
}
fn default_probe_concurrency() -> usize {
    5
}
fn default_probe_timeout_ms() -> u64 {
    1000
}
fn default_sample_rate() -> f64 {
    0.1
}
fn default_manifest_max_depth() -> usize {
    5
}
fn default_manifest_concurrency() -> usize {
    10
}
fn default_trusted_gateway() -> String {
    "https://arweave.net".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = FacadeOptions::default();
        assert!(!opts.verification.enabled);
        assert!(!opts.verification.strict);
        assert!(matches!(opts.routing.strategy, RoutingStrategyKind::Random));
        assert_eq!(opts.default_trusted_gateway, "https://arweave.net");
    }

    #[test]
    fn test_routing_strategy_kind_deserialize() {
        let json = r#"{"type":"top-k-stake-random","k":3}"#;
        let kind: RoutingStrategyKind = serde_json::from_str(json).unwrap();
        match kind {
            RoutingStrategyKind::TopKStakeRandom { k } => assert_eq!(k, 3),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_verification_settings_default_strict_is_false() {
        let settings = VerificationSettings::default();
        assert!(!settings.strict);
        assert!(settings.events);
    }

    #[test]
    fn test_telemetry_defaults_disabled_with_sample_rate() {
        let t = TelemetrySettings::default();
        assert!(!t.enabled);
        assert_eq!(t.sample_rate, 0.1);
    }

    #[test]
    fn test_manifest_settings_defaults() {
        let m = ManifestSettings::default();
        assert_eq!(m.max_depth, 5);
        assert_eq!(m.concurrency, 10);
    }
}
