use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use futures::future::join_all;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::warn;

use crate::strategy::VerificationStrategy;
use wayfinder_core::WayfinderError;

/// Cross-checks locally-retrieved bytes against the `x-ar-io-digest` header
/// a trusted gateway advertises for the same tx id (§4.5.1 step 2, §6
/// "Incoming HTTP headers") — a `HEAD` request per trusted gateway, not a
/// second full-body fetch. Succeeds as soon as any trusted gateway's
/// digest matches; fails only once every configured gateway has been tried.
pub struct HashVerification {
    client: Client,
    trusted_gateways: Vec<String>,
    semaphore: std::sync::Arc<Semaphore>,
}

impl HashVerification {
    pub fn new(trusted_gateways: Vec<String>, max_concurrency: usize) -> Self {
        Self {
            client: Client::new(),
            trusted_gateways,
            semaphore: std::sync::Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    async fn fetch_digest(&self, gateway: &str, tx_id: &str) -> Option<[u8; 32]> {
        let _permit = self.semaphore.acquire().await.ok()?;
        let url = format!("{}/{tx_id}", gateway.trim_end_matches('/'));
        let resp = self
            .client
            .head(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .ok()?;
        let raw = resp.headers().get("x-ar-io-digest")?.to_str().ok()?;
        decode_digest(raw)
    }
}

fn decode_digest(raw: &str) -> Option<[u8; 32]> {
    if raw.len() == 64 && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
        let mut out = [0u8; 32];
        for (i, chunk) in raw.as_bytes().chunks(2).enumerate() {
            let byte_str = std::str::from_utf8(chunk).ok()?;
            out[i] = u8::from_str_radix(byte_str, 16).ok()?;
        }
        return Some(out);
    }
    let decoded = URL_SAFE_NO_PAD.decode(raw).ok()?;
    decoded.try_into().ok()
}

fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

#[async_trait]
impl VerificationStrategy for HashVerification {
    async fn verify(
        &self,
        tx_id: &str,
        data: &[u8],
        _headers: &HashMap<String, String>,
        _raw: bool,
    ) -> Result<(), WayfinderError> {
        if self.trusted_gateways.is_empty() {
            return Err(WayfinderError::verification_failed(
                "hash verification has no trusted gateways configured",
            ));
        }

        let local_digest = sha256(data);
        let fetches = self
            .trusted_gateways
            .iter()
            .map(|gw| self.fetch_digest(gw, tx_id));
        let results = join_all(fetches).await;

        for (gateway, digest) in self.trusted_gateways.iter().zip(results) {
            match digest {
                Some(d) if d == local_digest => return Ok(()),
                Some(_) => warn!(gateway, tx_id, "trusted gateway digest mismatch"),
                None => warn!(gateway, tx_id, "trusted gateway attestation fetch failed"),
            }
        }

        Err(WayfinderError::verification_failed(format!(
            "no trusted gateway attestation matched the local digest for {tx_id}"
        )))
    }
}
