use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::deep_hash::{deep_hash, DeepHashItem};
use crate::pss::verify_pss;
use crate::root_source::RootTransactionSource;
use crate::strategy::VerificationStrategy;
use wayfinder_core::WayfinderError;

const SIGNATURE_LEN: usize = 512;
const OWNER_LEN: usize = 512;
const FIELD_LEN: usize = 32;

/// An ANS-104 data item's binary header, parsed up to (but not including)
/// its `data` field (§4.5.2). Field layout: sigType(2) | signature(512) |
/// owner(512) | targetPresent(1) [+target(32)] | anchorPresent(1)
/// [+anchor(32)] | numTags(8) | numTagsBytes(8) | tags(numTagsBytes).
struct DataItemHeader {
    signature_type: u16,
    signature: Vec<u8>,
    owner: Vec<u8>,
    target: Vec<u8>,
    anchor: Vec<u8>,
    tags_bytes: Vec<u8>,
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], WayfinderError> {
        let end = self.pos + len;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or_else(|| WayfinderError::verification_failed("truncated data item header"))?;
        self.pos = end;
        Ok(slice)
    }

    fn take_u8(&mut self) -> Result<u8, WayfinderError> {
        Ok(self.take(1)?[0])
    }

    fn take_u16_le(&mut self) -> Result<u16, WayfinderError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn take_u64_le(&mut self) -> Result<u64, WayfinderError> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes(b.try_into().expect("8 bytes")))
    }
}

impl DataItemHeader {
    fn parse(bytes: &[u8]) -> Result<Self, WayfinderError> {
        let mut cursor = Cursor::new(bytes);
        let signature_type = cursor.take_u16_le()?;
        let signature = cursor.take(SIGNATURE_LEN)?.to_vec();
        let owner = cursor.take(OWNER_LEN)?.to_vec();

        let target = if cursor.take_u8()? == 1 {
            cursor.take(FIELD_LEN)?.to_vec()
        } else {
            Vec::new()
        };
        let anchor = if cursor.take_u8()? == 1 {
            cursor.take(FIELD_LEN)?.to_vec()
        } else {
            Vec::new()
        };

        let _num_tags = cursor.take_u64_le()?;
        let num_tags_bytes = cursor.take_u64_le()? as usize;
        let tags_bytes = cursor.take(num_tags_bytes)?.to_vec();

        Ok(Self {
            signature_type,
            signature,
            owner,
            target,
            anchor,
            tags_bytes,
        })
    }
}

fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Verifies an ANS-104 bundled data item's RSA-PSS signature. Per §4.5.2,
/// this first classifies the tx id and locates its header offsets inside
/// its bundling (root) transaction, ranged-fetches that header from a
/// trusted gateway, confirms the header's own signature hashes to the
/// requested tx id, then recomputes the signature base —
/// `deepHash(["dataitem", "1", signatureType, owner, target, anchor, tags,
/// data])` — over the header fields and the already-retrieved `data` bytes.
pub struct Ans104SignatureVerification {
    source: Arc<dyn RootTransactionSource>,
    semaphore: Arc<Semaphore>,
}

impl Ans104SignatureVerification {
    pub fn new(source: Arc<dyn RootTransactionSource>, max_concurrency: usize) -> Self {
        Self {
            source,
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }
}

#[async_trait]
impl VerificationStrategy for Ans104SignatureVerification {
    async fn verify(
        &self,
        tx_id: &str,
        data: &[u8],
        _headers: &HashMap<String, String>,
        _raw: bool,
    ) -> Result<(), WayfinderError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| WayfinderError::Cancelled)?;

        let info = self.source.get_root_transaction(tx_id).await?;
        if !info.is_data_item {
            return Err(WayfinderError::verification_failed(format!(
                "{tx_id} is not an ANS-104 data item"
            )));
        }
        let item_offset = info.root_data_item_offset.ok_or_else(|| {
            WayfinderError::verification_failed("trusted gateway reported no data-item-offset")
        })?;
        let data_offset = info.root_data_offset.ok_or_else(|| {
            WayfinderError::verification_failed("trusted gateway reported no data-item-data-offset")
        })?;
        if data_offset <= item_offset {
            return Err(WayfinderError::verification_failed(
                "data-item-data-offset must come after data-item-offset",
            ));
        }

        let header_bytes = self
            .source
            .fetch_range(&info.root_transaction_id, item_offset, data_offset - 1)
            .await?;
        let header = DataItemHeader::parse(&header_bytes)?;

        let computed_id = URL_SAFE_NO_PAD.encode(sha256(&header.signature));
        if computed_id != tx_id {
            return Err(WayfinderError::verification_failed(format!(
                "computed data item id {computed_id} does not match {tx_id}"
            )));
        }

        let signature_base = DeepHashItem::List(vec![
            DeepHashItem::utf8("dataitem"),
            DeepHashItem::utf8("1"),
            DeepHashItem::utf8(header.signature_type.to_string()),
            DeepHashItem::blob(header.owner.clone()),
            DeepHashItem::blob(header.target.clone()),
            DeepHashItem::blob(header.anchor.clone()),
            DeepHashItem::blob(header.tags_bytes.clone()),
            DeepHashItem::blob(data.to_vec()),
        ]);
        let message = deep_hash(&signature_base);
        let owner_b64 = URL_SAFE_NO_PAD.encode(&header.owner);
        let signature_b64 = URL_SAFE_NO_PAD.encode(&header.signature);

        verify_pss(&owner_b64, &signature_b64, &message)
    }
}
