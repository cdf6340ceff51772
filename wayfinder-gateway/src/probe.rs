use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// HEAD-probes a constructed gateway URL, returning true on any 2xx/3xx
/// response within `timeout`. Used by `FastestPing` and `PreferredWithFallback`
/// — Wayfinder never probes gateways on its own initiative otherwise.
pub async fn probe(client: &Client, url: &Url, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, client.head(url.clone()).send()).await {
        Ok(Ok(resp)) => resp.status().is_success() || resp.status().is_redirection(),
        Ok(Err(e)) => {
            debug!(url = %url, error = %e, "gateway probe request failed");
            false
        }
        Err(_) => {
            debug!(url = %url, "gateway probe timed out");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_probe_unreachable_host_fails_within_timeout() {
        let client = Client::new();
        let url = Url::parse("http://127.0.0.1:1").unwrap();
        let ok = probe(&client, &url, Duration::from_millis(200)).await;
        assert!(!ok);
    }
}
