use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An `arweave/paths` manifest (§3 Manifest).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub manifest: String,
    pub version: String,
    #[serde(default)]
    pub paths: HashMap<String, ManifestPathEntry>,
    #[serde(default)]
    pub index: Option<ManifestIndex>,
    #[serde(default)]
    pub fallback: Option<ManifestFallback>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestPathEntry {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ManifestIndex {
    Path { path: String },
    Id { id: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestFallback {
    pub id: String,
}

const TX_ID_LEN: usize = 43;

impl Manifest {
    pub fn is_valid_schema(&self) -> bool {
        if self.manifest != "arweave/paths" {
            return false;
        }
        if self.version != "0.1.0" && self.version != "0.2.0" {
            return false;
        }
        let ids_valid = self.paths.values().all(|e| is_valid_tx_id(&e.id))
            && self
                .index
                .as_ref()
                .map(|i| match i {
                    ManifestIndex::Id { id } => is_valid_tx_id(id),
                    ManifestIndex::Path { .. } => true,
                })
                .unwrap_or(true)
            && self
                .fallback
                .as_ref()
                .map(|f| is_valid_tx_id(&f.id))
                .unwrap_or(true);
        ids_valid
    }

    /// Resolve a path to a tx id: normalize, check `paths`, fall back to
    /// `index`/`fallback`, per §4.7 "Path resolution".
    pub fn resolve_path(&self, path: &str) -> Option<&str> {
        let normalized = path.trim_matches('/');
        if normalized.is_empty() {
            if let Some(ManifestIndex::Path { path: idx_path }) = &self.index {
                return self.paths.get(idx_path).map(|e| e.id.as_str());
            }
            if let Some(ManifestIndex::Id { id }) = &self.index {
                return Some(id.as_str());
            }
        }
        if let Some(entry) = self.paths.get(normalized) {
            return Some(entry.id.as_str());
        }
        self.fallback.as_ref().map(|f| f.id.as_str())
    }

    /// Every tx id this manifest references — index, fallback, and all path targets.
    pub fn referenced_tx_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.paths.values().map(|e| e.id.clone()).collect();
        if let Some(ManifestIndex::Id { id }) = &self.index {
            ids.push(id.clone());
        }
        if let Some(fallback) = &self.fallback {
            ids.push(fallback.id.clone());
        }
        ids.sort();
        ids.dedup();
        ids
    }
}

fn is_valid_tx_id(id: &str) -> bool {
    id.len() == TX_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// A verified (or verification-failed) resource, keyed by tx id (§3 CachedResource).
#[derive(Debug, Clone)]
pub struct CachedResource {
    pub tx_id: String,
    pub bytes: Option<bytes::Bytes>,
    pub content_type: Option<String>,
    pub headers: HashMap<String, String>,
    pub verified: bool,
    pub error: Option<String>,
    pub expires_at: std::time::SystemTime,
}

impl CachedResource {
    pub fn is_expired(&self) -> bool {
        std::time::SystemTime::now() > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest_with(paths: &[(&str, &str)]) -> Manifest {
        Manifest {
            manifest: "arweave/paths".to_string(),
            version: "0.1.0".to_string(),
            paths: paths
                .iter()
                .map(|(k, v)| {
                    (
                        k.to_string(),
                        ManifestPathEntry {
                            id: v.to_string(),
                        },
                    )
                })
                .collect(),
            index: Some(ManifestIndex::Path {
                path: "index.html".to_string(),
            }),
            fallback: None,
        }
    }

    const ID_A: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
    const ID_B: &str = "BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB";

    #[test]
    fn test_resolve_known_path() {
        let m = manifest_with(&[("index.html", ID_A), ("app.js", ID_B)]);
        assert_eq!(m.resolve_path("app.js"), Some(ID_B));
    }

    #[test]
    fn test_resolve_empty_path_uses_index() {
        let m = manifest_with(&[("index.html", ID_A), ("app.js", ID_B)]);
        assert_eq!(m.resolve_path(""), Some(ID_A));
        assert_eq!(m.resolve_path("/"), Some(ID_A));
    }

    #[test]
    fn test_resolve_unknown_path_uses_fallback() {
        let mut m = manifest_with(&[("index.html", ID_A)]);
        m.fallback = Some(ManifestFallback {
            id: ID_B.to_string(),
        });
        assert_eq!(m.resolve_path("missing.png"), Some(ID_B));
    }

    #[test]
    fn test_resolve_unknown_path_no_fallback_is_none() {
        let m = manifest_with(&[("index.html", ID_A)]);
        assert_eq!(m.resolve_path("missing.png"), None);
    }

    #[test]
    fn test_schema_validation_rejects_bad_version() {
        let mut m = manifest_with(&[("index.html", ID_A)]);
        m.version = "9.9.9".to_string();
        assert!(!m.is_valid_schema());
    }

    #[test]
    fn test_schema_validation_rejects_bad_tx_id() {
        let m = manifest_with(&[("index.html", "too-short")]);
        assert!(!m.is_valid_schema());
    }

    #[test]
    fn test_referenced_tx_ids_dedups() {
        let m = manifest_with(&[("index.html", ID_A), ("about.html", ID_A)]);
        assert_eq!(m.referenced_tx_ids(), vec![ID_A.to_string()]);
    }
}
