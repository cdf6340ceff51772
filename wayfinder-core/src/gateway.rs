use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

/// An Arweave HTTP endpoint capable of serving transactions and ArNS names.
///
/// Equality (and therefore dedup/set membership across providers) is on
/// `url` alone — `operator_stake` and `status` are routing inputs, not
/// identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gateway {
    pub url: Url,

    /// Non-negative stake used by stake-weighted routing strategies.
    #[serde(default)]
    pub operator_stake: Option<u64>,

    #[serde(default)]
    pub status: GatewayStatus,

    /// Provider-private metadata (e.g. AR.IO network observer scores).
    /// Opaque to routing strategies.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayStatus {
    Joined,
    Leaving,
    #[default]
    Unknown,
}

impl PartialEq for Gateway {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}
impl Eq for Gateway {}

impl std::hash::Hash for Gateway {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.url.as_str().hash(state);
    }
}

impl Gateway {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            operator_stake: None,
            status: GatewayStatus::Unknown,
            metadata: HashMap::new(),
        }
    }

    pub fn from_str(url: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(url)?))
    }

    pub fn with_stake(mut self, stake: u64) -> Self {
        self.operator_stake = Some(stake);
        self
    }

    pub fn with_status(mut self, status: GatewayStatus) -> Self {
        self.status = status;
        self
    }

    pub fn stake(&self) -> u64 {
        self.operator_stake.unwrap_or(0)
    }

    /// "online" is a provider-supplied attribute per the spec's open
    /// question — Wayfinder never performs its own liveness probing to
    /// decide this; routing strategies that want freshness use `FastestPing`
    /// or `PreferredWithFallback`, which probe explicitly.
    pub fn is_online(&self) -> bool {
        !matches!(self.status, GatewayStatus::Leaving)
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or("")
    }

    pub fn is_loopback(&self) -> bool {
        matches!(self.host(), "localhost" | "127.0.0.1" | "::1")
    }
}
