pub mod builder;
pub mod facade;
pub mod retriever;

pub use builder::WayfinderBuilder;
pub use facade::{
    ManifestRequestOptions, WayfinderFacade, WayfinderManifestResponse, WayfinderResponse,
};
pub use retriever::{DataRetriever, RetrievedContent};

pub use wayfinder_core::{
    create_wayfinder_url, CachedResource, FacadeOptions, Gateway, GatewayStatus, Manifest,
    ResolveInput, RoutingInput, RoutingStrategyKind, UrlResolver, VerificationStrategyKind,
    WayfinderError,
};
pub use wayfinder_observability::WayfinderEvent;
