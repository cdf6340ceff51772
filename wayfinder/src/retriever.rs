use bytes::Bytes;
use reqwest::Client;
use std::collections::HashMap;
use url::Url;
use uuid::Uuid;
use wayfinder_core::WayfinderError;

/// The bytes of a successfully retrieved resource, plus enough response
/// metadata for the facade to decide whether it's a manifest and what
/// headers to surface to the caller.
pub struct RetrievedContent {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub headers: HashMap<String, String>,
    pub status: u16,
}

/// Performs the actual HTTP GET against a constructed gateway URL, tagging
/// every outbound request with `x-ar-io-component` / `x-ar-io-trace-id` so
/// gateway-side logs can be correlated back to a specific Wayfinder call.
pub struct DataRetriever {
    client: Client,
}

impl DataRetriever {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn fetch(&self, url: &Url) -> Result<RetrievedContent, WayfinderError> {
        let trace_id = Uuid::new_v4().to_string();
        let resp = self
            .client
            .get(url.clone())
            .header("x-ar-io-component", "wayfinder")
            .header("x-ar-io-trace-id", &trace_id)
            .send()
            .await
            .map_err(|e| WayfinderError::NetworkError(e.to_string()))?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            return Err(WayfinderError::NetworkError(format!(
                "gateway returned HTTP {status} for {url}"
            )));
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.to_string(), v.to_str().ok()?.to_string())))
            .collect();

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| WayfinderError::NetworkError(e.to_string()))?;

        Ok(RetrievedContent {
            bytes,
            content_type,
            headers,
            status,
        })
    }
}

impl Default for DataRetriever {
    fn default() -> Self {
        Self::new(Client::new())
    }
}
