pub mod cache;
pub mod resolver;

pub use cache::ContentCache;
pub use resolver::{ContentFetcher, ContentVerifier, FetchedContent, ManifestResolver, NoopVerifier};
