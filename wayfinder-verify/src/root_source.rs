use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use wayfinder_core::WayfinderError;

/// The L1 transaction (or ANS-104 data item) metadata needed to recompute a
/// signature base and verify it against the owner's public key.
#[derive(Debug, Clone)]
pub struct TransactionMetadata {
    pub format: u8,
    pub owner: String,
    pub target: String,
    pub quantity: String,
    pub reward: String,
    pub anchor: String,
    pub tags: Vec<(String, String)>,
    pub data_size: String,
    pub data_root: String,
    pub signature: String,
}

/// Tells a caller whether a tx id names an L1 transaction or an ANS-104
/// bundled data item, and if the latter, where to find it inside its
/// bundling transaction's body.
#[derive(Debug, Clone)]
pub struct RootTransactionInfo {
    pub root_transaction_id: String,
    pub is_data_item: bool,
    /// Byte offset, within `root_transaction_id`'s data, where this data
    /// item's binary header begins.
    pub root_data_item_offset: Option<u64>,
    /// Byte offset, within `root_transaction_id`'s data, where this data
    /// item's own `data` field begins (i.e. where its header ends).
    pub root_data_offset: Option<u64>,
}

/// Locates and fetches the transaction (or data item) backing a tx id, as
/// attested to by a trusted source. Implementations differ only in *where*
/// they look.
#[async_trait]
pub trait RootTransactionSource: Send + Sync {
    /// Classifies `tx_id` as an L1 transaction or ANS-104 data item (§4.5.4).
    async fn get_root_transaction(&self, tx_id: &str) -> Result<RootTransactionInfo, WayfinderError>;

    /// Fetches the L1 header fields (owner, signature, tags, ...) needed to
    /// verify a format-1/2 transaction's own signature.
    async fn get_transaction_metadata(&self, tx_id: &str) -> Result<TransactionMetadata, WayfinderError>;

    /// Ranged byte fetch against `tx_id`'s data, inclusive of both ends —
    /// used to pull a bundled data item's binary header out of its root
    /// transaction's body.
    async fn fetch_range(&self, tx_id: &str, start: u64, end: u64) -> Result<Bytes, WayfinderError>;
}

#[derive(Debug, Deserialize)]
struct RawTxResponse {
    format: Option<u8>,
    owner: String,
    target: String,
    #[serde(default)]
    quantity: String,
    #[serde(default)]
    reward: String,
    last_tx: String,
    #[serde(default)]
    tags: Vec<RawTag>,
    #[serde(default)]
    data_size: String,
    #[serde(default)]
    data_root: String,
    signature: String,
}

#[derive(Debug, Deserialize)]
struct RawTag {
    name: String,
    value: String,
}

/// Queries a trusted gateway directly: `HEAD /{id}` for the data-item
/// classifier headers (§6 "Incoming HTTP headers"), `GET /tx/{id}` for L1
/// header fields, and ranged `GET /{id}` for raw byte windows.
pub struct TrustedGatewayRootSource {
    client: Client,
    trusted_gateway: String,
}

impl TrustedGatewayRootSource {
    pub fn new(client: Client, trusted_gateway: impl Into<String>) -> Self {
        Self {
            client,
            trusted_gateway: trusted_gateway.into(),
        }
    }

    fn url_for(&self, tx_id: &str) -> String {
        format!("{}/{tx_id}", self.trusted_gateway.trim_end_matches('/'))
    }
}

#[async_trait]
impl RootTransactionSource for TrustedGatewayRootSource {
    async fn get_root_transaction(&self, tx_id: &str) -> Result<RootTransactionInfo, WayfinderError> {
        let resp = self
            .client
            .head(self.url_for(tx_id))
            .send()
            .await
            .map_err(|e| WayfinderError::NetworkError(e.to_string()))?;

        let header = |name: &str| -> Option<String> {
            resp.headers().get(name)?.to_str().ok().map(str::to_string)
        };

        let root_transaction_id = header("root-transaction-id");
        let is_data_item = root_transaction_id
            .as_deref()
            .is_some_and(|id| id != tx_id);

        if !is_data_item {
            return Ok(RootTransactionInfo {
                root_transaction_id: tx_id.to_string(),
                is_data_item: false,
                root_data_item_offset: None,
                root_data_offset: None,
            });
        }

        let parse_offset = |name: &str| {
            header(name)
                .and_then(|v| v.parse::<u64>().ok())
                .ok_or_else(|| {
                    WayfinderError::verification_failed(format!("trusted gateway missing {name} header"))
                })
        };

        Ok(RootTransactionInfo {
            root_transaction_id: root_transaction_id.expect("checked above"),
            is_data_item: true,
            root_data_item_offset: Some(parse_offset("data-item-offset")?),
            root_data_offset: Some(parse_offset("data-item-data-offset")?),
        })
    }

    async fn get_transaction_metadata(&self, tx_id: &str) -> Result<TransactionMetadata, WayfinderError> {
        let url = format!("{}/tx/{tx_id}", self.trusted_gateway.trim_end_matches('/'));
        let resp: RawTxResponse = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| WayfinderError::NetworkError(e.to_string()))?
            .json()
            .await
            .map_err(|e| WayfinderError::NetworkError(e.to_string()))?;
        Ok(from_raw(resp))
    }

    async fn fetch_range(&self, tx_id: &str, start: u64, end: u64) -> Result<Bytes, WayfinderError> {
        let resp = self
            .client
            .get(self.url_for(tx_id))
            .header(reqwest::header::RANGE, format!("bytes={start}-{end}"))
            .send()
            .await
            .map_err(|e| WayfinderError::NetworkError(e.to_string()))?;
        resp.bytes()
            .await
            .map_err(|e| WayfinderError::NetworkError(e.to_string()))
    }
}

/// Queries a trusted gateway's GraphQL endpoint for transaction metadata —
/// used when the tx id is an ANS-104 bundled data item rather than an L1 tx.
/// GraphQL exposes no byte-range or offset data, so `get_root_transaction`
/// and `fetch_range` are unsupported here; pair this source with
/// `TrustedGatewayRootSource` when ANS-104 offset verification is needed.
pub struct GqlRootSource {
    client: Client,
    trusted_gateway: String,
}

impl GqlRootSource {
    pub fn new(client: Client, trusted_gateway: impl Into<String>) -> Self {
        Self {
            client,
            trusted_gateway: trusted_gateway.into(),
        }
    }
}

#[async_trait]
impl RootTransactionSource for GqlRootSource {
    async fn get_root_transaction(&self, _tx_id: &str) -> Result<RootTransactionInfo, WayfinderError> {
        Err(WayfinderError::ManifestError(
            "GqlRootSource cannot classify data-item offsets, use TrustedGatewayRootSource".into(),
        ))
    }

    async fn get_transaction_metadata(&self, tx_id: &str) -> Result<TransactionMetadata, WayfinderError> {
        let url = format!("{}/graphql", self.trusted_gateway.trim_end_matches('/'));
        let query = serde_json::json!({
            "query": "query($id: ID!) { transaction(id: $id) { owner { key } signature tags { name value } } }",
            "variables": { "id": tx_id },
        });
        let body: serde_json::Value = self
            .client
            .post(&url)
            .json(&query)
            .send()
            .await
            .map_err(|e| WayfinderError::NetworkError(e.to_string()))?
            .json()
            .await
            .map_err(|e| WayfinderError::NetworkError(e.to_string()))?;

        let tx = body
            .pointer("/data/transaction")
            .ok_or_else(|| WayfinderError::ManifestError("graphql response missing transaction".into()))?;
        let owner = tx
            .pointer("/owner/key")
            .and_then(|v| v.as_str())
            .ok_or_else(|| WayfinderError::ManifestError("graphql response missing owner key".into()))?
            .to_string();
        let signature = tx
            .get("signature")
            .and_then(|v| v.as_str())
            .ok_or_else(|| WayfinderError::ManifestError("graphql response missing signature".into()))?
            .to_string();
        let tags = tx
            .get("tags")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|t| {
                        let name = t.get("name")?.as_str()?.to_string();
                        let value = t.get("value")?.as_str()?.to_string();
                        Some((name, value))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(TransactionMetadata {
            format: 2,
            owner,
            target: String::new(),
            quantity: String::new(),
            reward: String::new(),
            anchor: String::new(),
            tags,
            data_size: String::new(),
            data_root: String::new(),
            signature,
        })
    }

    async fn fetch_range(&self, _tx_id: &str, _start: u64, _end: u64) -> Result<Bytes, WayfinderError> {
        Err(WayfinderError::ManifestError(
            "GqlRootSource has no byte-range access, use TrustedGatewayRootSource".into(),
        ))
    }
}

fn from_raw(raw: RawTxResponse) -> TransactionMetadata {
    TransactionMetadata {
        format: raw.format.unwrap_or(1),
        owner: raw.owner,
        target: raw.target,
        quantity: raw.quantity,
        reward: raw.reward,
        anchor: raw.last_tx,
        tags: raw.tags.into_iter().map(|t| (t.name, t.value)).collect(),
        data_size: raw.data_size,
        data_root: raw.data_root,
        signature: raw.signature,
    }
}
