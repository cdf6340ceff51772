use async_trait::async_trait;
use std::collections::HashMap;
use wayfinder_core::WayfinderError;

/// Verifies locally-retrieved content against a trusted-gateway attestation.
/// `verify` is handed the full content bytes already assembled by the
/// retriever — strategies never fetch the content being verified themselves,
/// only the attestation data (digests, signatures, owner keys) they check it
/// against. `headers` are the local response's headers (used by callers to
/// disambiguate which id is actually being verified, see
/// `effective_verification_id`); `raw` disables that disambiguation when the
/// caller already knows exactly which tx id the bytes belong to.
#[async_trait]
pub trait VerificationStrategy: Send + Sync {
    async fn verify(
        &self,
        tx_id: &str,
        data: &[u8],
        headers: &HashMap<String, String>,
        raw: bool,
    ) -> Result<(), WayfinderError>;
}

/// Resolves the tx id a verification strategy should actually check, per
/// the rule that a request served from a manifest's resolved index may
/// carry `x-ar-io-data-id` (the concrete id that was served) or
/// `x-arns-resolved-id` (the ArNS name's resolved antenna id) rather than
/// matching the id in the original `ar://` input. `raw` bypasses this
/// entirely — the caller already knows the exact id.
pub fn effective_verification_id(tx_id: &str, headers: &HashMap<String, String>, raw: bool) -> String {
    if raw {
        return tx_id.to_string();
    }
    headers
        .get("x-ar-io-data-id")
        .or_else(|| headers.get("x-arns-resolved-id"))
        .cloned()
        .unwrap_or_else(|| tx_id.to_string())
}

/// Dispatches to ANS-104 or L1 transaction-signature verification depending
/// on what `RootTransactionSource::get_root_transaction` reports for the tx
/// id — manifests and directly-addressed transactions both flow through
/// here uniformly.
pub struct CompositeVerificationStrategy {
    strategies: Vec<std::sync::Arc<dyn VerificationStrategy>>,
}

impl CompositeVerificationStrategy {
    pub fn new(strategies: Vec<std::sync::Arc<dyn VerificationStrategy>>) -> Self {
        Self { strategies }
    }
}

#[async_trait]
impl VerificationStrategy for CompositeVerificationStrategy {
    async fn verify(
        &self,
        tx_id: &str,
        data: &[u8],
        headers: &HashMap<String, String>,
        raw: bool,
    ) -> Result<(), WayfinderError> {
        let mut last_err = None;
        for strategy in &self.strategies {
            match strategy.verify(tx_id, data, headers, raw).await {
                Ok(()) => return Ok(()),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            WayfinderError::verification_failed("no verification strategies configured")
        }))
    }
}
