pub mod config;
pub mod error;
pub mod gateway;
pub mod manifest;
pub mod uri;

pub use config::{
    FacadeOptions, ManifestSettings, RoutingSettings, RoutingStrategyKind, TelemetrySettings,
    VerificationSettings, VerificationStrategyKind,
};
pub use error::WayfinderError;
pub use gateway::{Gateway, GatewayStatus};
pub use manifest::{CachedResource, Manifest, ManifestFallback, ManifestIndex, ManifestPathEntry};
pub use uri::{create_wayfinder_url, sandbox_subdomain, ResolveInput, RoutingInput, UrlResolver, WayfinderUri};
