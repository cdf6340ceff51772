use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use std::collections::HashMap;
use std::sync::Arc;

use crate::deep_hash::{deep_hash, DeepHashItem};
use crate::merkle::compute_data_root;
use crate::pss::verify_pss;
use crate::root_source::RootTransactionSource;
use crate::strategy::VerificationStrategy;
use wayfinder_core::WayfinderError;

/// Verifies an L1 Arweave transaction's RSA-PSS signature (tx format 2) by
/// recomputing the `deepHash` signature base from its header fields and the
/// merkle `data_root` of the bytes actually retrieved — not the `data_root`
/// field a gateway reports, which says nothing about what bytes it served.
pub struct TransactionSignatureVerification {
    source: Arc<dyn RootTransactionSource>,
}

impl TransactionSignatureVerification {
    pub fn new(source: Arc<dyn RootTransactionSource>) -> Self {
        Self { source }
    }
}

fn tag_list(tags: &[(String, String)]) -> DeepHashItem {
    DeepHashItem::List(
        tags.iter()
            .map(|(name, value)| {
                DeepHashItem::List(vec![
                    DeepHashItem::blob(URL_SAFE_NO_PAD.decode(name).unwrap_or_default()),
                    DeepHashItem::blob(URL_SAFE_NO_PAD.decode(value).unwrap_or_default()),
                ])
            })
            .collect(),
    )
}

#[async_trait]
impl VerificationStrategy for TransactionSignatureVerification {
    async fn verify(
        &self,
        tx_id: &str,
        data: &[u8],
        _headers: &HashMap<String, String>,
        _raw: bool,
    ) -> Result<(), WayfinderError> {
        let tx = self.source.get_transaction_metadata(tx_id).await?;

        let data_root = compute_data_root(data);
        let signature_base = DeepHashItem::List(vec![
            DeepHashItem::utf8(tx.format.to_string()),
            DeepHashItem::blob(URL_SAFE_NO_PAD.decode(&tx.owner).unwrap_or_default()),
            DeepHashItem::blob(URL_SAFE_NO_PAD.decode(&tx.target).unwrap_or_default()),
            DeepHashItem::utf8(&tx.quantity),
            DeepHashItem::utf8(&tx.reward),
            DeepHashItem::blob(URL_SAFE_NO_PAD.decode(&tx.anchor).unwrap_or_default()),
            tag_list(&tx.tags),
            DeepHashItem::utf8(data.len().to_string()),
            DeepHashItem::blob(data_root.to_vec()),
        ]);
        let message = deep_hash(&signature_base);

        verify_pss(&tx.owner, &tx.signature, &message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::root_source::TransactionMetadata;
    use async_trait::async_trait;

    use crate::root_source::RootTransactionInfo;

    struct FixedSource(TransactionMetadata);

    #[async_trait]
    impl RootTransactionSource for FixedSource {
        async fn get_root_transaction(&self, tx_id: &str) -> Result<RootTransactionInfo, WayfinderError> {
            Ok(RootTransactionInfo {
                root_transaction_id: tx_id.to_string(),
                is_data_item: false,
                root_data_item_offset: None,
                root_data_offset: None,
            })
        }

        async fn get_transaction_metadata(&self, _tx_id: &str) -> Result<TransactionMetadata, WayfinderError> {
            Ok(self.0.clone())
        }

        async fn fetch_range(&self, _tx_id: &str, _start: u64, _end: u64) -> Result<bytes::Bytes, WayfinderError> {
            Err(WayfinderError::ManifestError("fetch_range not supported by FixedSource".into()))
        }
    }

    #[tokio::test]
    async fn test_malformed_signature_fails_verification() {
        let metadata = TransactionMetadata {
            format: 2,
            owner: URL_SAFE_NO_PAD.encode([1u8; 128]),
            target: String::new(),
            quantity: "0".to_string(),
            reward: "0".to_string(),
            anchor: String::new(),
            tags: vec![],
            data_size: "0".to_string(),
            data_root: String::new(),
            signature: URL_SAFE_NO_PAD.encode([0u8; 128]),
        };
        let verifier = TransactionSignatureVerification::new(Arc::new(FixedSource(metadata)));
        assert!(verifier
            .verify("tx", b"", &HashMap::new(), false)
            .await
            .is_err());
    }
}
