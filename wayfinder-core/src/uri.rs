use crate::error::WayfinderError;
use crate::gateway::Gateway;
use base64::Engine;
use serde::{Deserialize, Serialize};
use url::Url;

const TX_ID_LEN: usize = 43;
const ARNS_NAME_MAX_LEN: usize = 51;

/// A parsed `ar://` identifier — the tagged union from §3 of the data model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WayfinderUri {
    /// `ar:///graphql` — routed straight through to the chosen gateway, no subdomain.
    GatewayEndpoint { path: String },
    /// `ar://<43-char-id>[/tail]`
    TxId { id: String, tail: String },
    /// `ar://<name>[/tail]`, name matching `^[a-z0-9_-]{1,51}$` (case-insensitively).
    ArnsName { name: String, tail: String },
    /// Anything else — routed as a literal path against the chosen gateway.
    Fallback { raw: String },
}

/// Output of `UrlResolver::extract` — what `RoutingStrategy::select` and
/// `UrlResolver::construct` need to pick a gateway and assemble the final URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingInput {
    pub subdomain: String,
    pub path: String,
    pub tx_id: Option<String>,
    pub arns_name: Option<String>,
}

/// Parses `ar://` URIs and assembles them into concrete gateway URLs.
pub struct UrlResolver;

impl UrlResolver {
    /// Classify a raw input string. Returns `None` when it isn't an `ar://`
    /// URI at all — the caller should pass such input through unchanged.
    pub fn parse(uri: &str) -> Option<WayfinderUri> {
        let rest = uri.strip_prefix("ar://")?;

        if let Some(path) = rest.strip_prefix('/') {
            return Some(WayfinderUri::GatewayEndpoint {
                path: format!("/{path}"),
            });
        }

        let split_at = rest.find('/').unwrap_or(rest.len());
        let head = &rest[..split_at];
        let tail = &rest[split_at..]; // keeps the leading '/' when present

        if head.len() == TX_ID_LEN && head.bytes().all(is_tx_id_byte) {
            return Some(WayfinderUri::TxId {
                id: head.to_string(),
                tail: tail.to_string(),
            });
        }

        let lowered = head.to_lowercase();
        if is_arns_name(&lowered) {
            return Some(WayfinderUri::ArnsName {
                name: lowered,
                tail: tail.to_string(),
            });
        }

        Some(WayfinderUri::Fallback {
            raw: rest.to_string(),
        })
    }

    /// extract(uri) -> RoutingInput, per §4.1 rules 1-7.
    pub fn extract(uri: &str) -> RoutingInput {
        match Self::parse(uri) {
            None => RoutingInput::default(),
            Some(WayfinderUri::GatewayEndpoint { path }) => RoutingInput {
                subdomain: String::new(),
                path,
                tx_id: None,
                arns_name: None,
            },
            Some(WayfinderUri::TxId { id, tail }) => RoutingInput {
                subdomain: sandbox_subdomain(&id).unwrap_or_default(),
                path: format!("/{id}{tail}"),
                tx_id: Some(id),
                arns_name: None,
            },
            Some(WayfinderUri::ArnsName { name, tail }) => RoutingInput {
                subdomain: name.clone(),
                path: if tail.is_empty() {
                    "/".to_string()
                } else {
                    tail
                },
                tx_id: None,
                arns_name: Some(name),
            },
            Some(WayfinderUri::Fallback { raw }) => RoutingInput {
                subdomain: String::new(),
                path: format!("/{raw}"),
                tx_id: None,
                arns_name: None,
            },
        }
    }

    /// construct(gateway, subdomain, path) -> URL, per §4.1.
    pub fn construct(
        gateway: &Gateway,
        subdomain: &str,
        path: &str,
    ) -> Result<Url, WayfinderError> {
        let mut url = gateway.url.clone();

        if !gateway.is_loopback() && !subdomain.is_empty() {
            let host = gateway
                .host()
                .to_string();
            let new_host = format!("{subdomain}.{host}");
            url.set_host(Some(&new_host))
                .map_err(|e| WayfinderError::InvalidUrl(e.to_string()))?;
        }

        let (pathname, query) = match path.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (path, None),
        };
        url.set_path(pathname);
        url.set_query(query);

        Ok(url)
    }
}

/// The 32-byte sandbox subdomain: lowercased RFC-4648 base32, no padding,
/// of the 32 raw bytes obtained by base64url-decoding a 43-char tx id.
pub fn sandbox_subdomain(tx_id: &str) -> Result<String, WayfinderError> {
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(tx_id)
        .map_err(|e| WayfinderError::InvalidUrl(format!("invalid tx id encoding: {e}")))?;
    if bytes.len() != 32 {
        return Err(WayfinderError::InvalidUrl(format!(
            "tx id decodes to {} bytes, expected 32",
            bytes.len()
        )));
    }
    let encoded = base32::encode(base32::Alphabet::Rfc4648 { padding: false }, &bytes);
    Ok(encoded.to_lowercase())
}

fn is_tx_id_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

fn is_arns_name(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= ARNS_NAME_MAX_LEN
        && s.bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
}

/// Exactly one of these must be supplied to `createWayfinderUrl` / `resolveUrl`.
pub enum ResolveInput {
    OriginalUrl(String),
    WayfinderUrl(String),
    TxId(String),
    ArnsName(String),
}

/// `createWayfinderUrl` — normalizes any of the four supported inputs into
/// an `ar://…` string. `originalUrl` is only accepted for `arweave.net` /
/// `arweave.dev` hosts; anything else fails.
pub fn create_wayfinder_url(input: ResolveInput) -> Result<String, WayfinderError> {
    match input {
        ResolveInput::WayfinderUrl(s) => Ok(s),
        ResolveInput::TxId(id) => Ok(format!("ar://{id}")),
        ResolveInput::ArnsName(name) => Ok(format!("ar://{name}")),
        ResolveInput::OriginalUrl(raw) => {
            let parsed =
                Url::parse(&raw).map_err(|e| WayfinderError::InvalidUrl(e.to_string()))?;
            let host = parsed.host_str().unwrap_or("");
            if host == "arweave.net" || host == "arweave.dev" {
                let path = parsed.path().trim_start_matches('/');
                let mut ar_url = format!("ar://{path}");
                if let Some(q) = parsed.query() {
                    ar_url.push('?');
                    ar_url.push_str(q);
                }
                Ok(ar_url)
            } else {
                Err(WayfinderError::InvalidUrl(format!(
                    "unsupported originalUrl host: {host}"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_ar_url_passes_through() {
        let input = UrlResolver::extract("https://example.com/x");
        assert_eq!(input, RoutingInput::default());
    }

    #[test]
    fn test_gateway_endpoint() {
        let input = UrlResolver::extract("ar:///ar-io/info");
        assert_eq!(input.subdomain, "");
        assert_eq!(input.path, "/ar-io/info");
        assert!(input.tx_id.is_none());
    }

    #[test]
    fn test_tx_id_with_tail() {
        let id = "c7wkwt6TKgcWJUfgvpJ5q5qi4DIZyJ1_TqhjXgURh0U";
        let input = UrlResolver::extract(&format!("ar://{id}/path/to/x"));
        assert_eq!(input.tx_id.as_deref(), Some(id));
        assert_eq!(input.path, format!("/{id}/path/to/x"));
        assert_eq!(input.subdomain.len(), 52);
        assert_eq!(
            input.subdomain,
            "oo6cjqw6smvaofrfi7ql5etzvonkfybsdhej272ovbrv4birq5cq"
        );
    }

    #[test]
    fn test_arns_name_lowercased() {
        let input = UrlResolver::extract("ar://MyApp/path");
        assert_eq!(input.arns_name.as_deref(), Some("myapp"));
        assert_eq!(input.subdomain, "myapp");
        assert_eq!(input.path, "/path");
    }

    #[test]
    fn test_arns_name_no_tail_normalizes_path_to_slash() {
        let input = UrlResolver::extract("ar://cookbook_ao");
        assert_eq!(input.arns_name.as_deref(), Some("cookbook_ao"));
        assert_eq!(input.path, "/");
    }

    #[test]
    fn test_arns_name_with_tail() {
        let input = UrlResolver::extract("ar://cookbook_ao/welcome/getting-started.html");
        assert_eq!(input.arns_name.as_deref(), Some("cookbook_ao"));
        assert_eq!(input.path, "/welcome/getting-started.html");
    }

    #[test]
    fn test_too_long_name_falls_back() {
        let name = "a".repeat(52);
        let input = UrlResolver::extract(&format!("ar://{name}/p"));
        assert!(input.arns_name.is_none());
        assert!(input.tx_id.is_none());
        assert_eq!(input.subdomain, "");
        assert_eq!(input.path, format!("/{name}/p"));
    }

    #[test]
    fn test_construct_static_endpoint() {
        let gw = Gateway::from_str("http://permagate.io").unwrap();
        let url = UrlResolver::construct(&gw, "", "/ar-io/info").unwrap();
        assert_eq!(url.as_str(), "http://permagate.io/ar-io/info");
    }

    #[test]
    fn test_construct_tx_id_sandbox() {
        let gw = Gateway::from_str("http://permagate.io").unwrap();
        let id = "c7wkwt6TKgcWJUfgvpJ5q5qi4DIZyJ1_TqhjXgURh0U";
        let input = UrlResolver::extract(&format!("ar://{id}/path/to/x"));
        let url = UrlResolver::construct(&gw, &input.subdomain, &input.path).unwrap();
        assert_eq!(
            url.as_str(),
            "http://oo6cjqw6smvaofrfi7ql5etzvonkfybsdhej272ovbrv4birq5cq.permagate.io/c7wkwt6TKgcWJUfgvpJ5q5qi4DIZyJ1_TqhjXgURh0U/path/to/x"
        );
    }

    #[test]
    fn test_construct_arns_lowercased() {
        let gw = Gateway::from_str("http://permagate.io").unwrap();
        let input = UrlResolver::extract("ar://MyApp/path");
        let url = UrlResolver::construct(&gw, &input.subdomain, &input.path).unwrap();
        assert_eq!(url.as_str(), "http://myapp.permagate.io/path");
    }

    #[test]
    fn test_construct_ignores_subdomain_on_loopback() {
        let gw = Gateway::from_str("http://localhost:1984").unwrap();
        let url = UrlResolver::construct(&gw, "myapp", "/path").unwrap();
        assert_eq!(url.host_str(), Some("localhost"));
        assert_eq!(url.port(), Some(1984));
    }

    #[test]
    fn test_construct_splits_query() {
        let gw = Gateway::from_str("http://permagate.io").unwrap();
        let url = UrlResolver::construct(&gw, "", "/ar-io/info?a=1&b=2").unwrap();
        assert_eq!(url.path(), "/ar-io/info");
        assert_eq!(url.query(), Some("a=1&b=2"));
    }

    #[test]
    fn test_create_wayfinder_url_from_tx_id() {
        let url = create_wayfinder_url(ResolveInput::TxId("abc".into())).unwrap();
        assert_eq!(url, "ar://abc");
    }

    #[test]
    fn test_create_wayfinder_url_from_original_url() {
        let url = create_wayfinder_url(ResolveInput::OriginalUrl(
            "https://arweave.net/some-tx-id".into(),
        ))
        .unwrap();
        assert_eq!(url, "ar://some-tx-id");
    }

    #[test]
    fn test_create_wayfinder_url_rejects_unsupported_host() {
        let result = create_wayfinder_url(ResolveInput::OriginalUrl(
            "https://example.com/some-tx-id".into(),
        ));
        assert!(result.is_err());
    }

    #[test]
    fn test_sandbox_round_trip_length() {
        let id = "c7wkwt6TKgcWJUfgvpJ5q5qi4DIZyJ1_TqhjXgURh0U";
        let sandbox = sandbox_subdomain(id).unwrap();
        assert_eq!(sandbox.len(), 52);
        assert!(sandbox.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
        // 52 chars exceeds the 51-char ArNS cap, so it is recognized as a
        // sandbox, never mistaken for an ArNS name.
        assert!(!is_arns_name(&sandbox));
    }
}
