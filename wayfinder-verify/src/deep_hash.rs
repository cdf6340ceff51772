use sha2::{Digest, Sha384};

/// Arweave's `deepHash`: a recursive tagged hash over nested blobs and lists,
/// used as the signature base for both L1 transactions and ANS-104 data items.
#[derive(Debug, Clone)]
pub enum DeepHashItem {
    Blob(Vec<u8>),
    List(Vec<DeepHashItem>),
}

impl DeepHashItem {
    pub fn blob(bytes: impl Into<Vec<u8>>) -> Self {
        DeepHashItem::Blob(bytes.into())
    }

    pub fn utf8(s: impl AsRef<str>) -> Self {
        DeepHashItem::Blob(s.as_ref().as_bytes().to_vec())
    }
}

pub fn deep_hash(item: &DeepHashItem) -> [u8; 48] {
    match item {
        DeepHashItem::Blob(bytes) => {
            let tag = sha384(format!("blob{}", bytes.len()).as_bytes());
            let body = sha384(bytes);
            sha384(&concat(&tag, &body))
        }
        DeepHashItem::List(items) => {
            let mut acc = sha384(format!("list{}", items.len()).as_bytes());
            for item in items {
                let hashed = deep_hash(item);
                acc = sha384(&concat(&acc, &hashed));
            }
            acc
        }
    }
}

fn sha384(bytes: &[u8]) -> [u8; 48] {
    let mut hasher = Sha384::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

fn concat(a: &[u8; 48], b: &[u8; 48]) -> Vec<u8> {
    let mut out = Vec::with_capacity(96);
    out.extend_from_slice(a);
    out.extend_from_slice(b);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deep_hash_is_deterministic() {
        let item = DeepHashItem::List(vec![DeepHashItem::utf8("a"), DeepHashItem::utf8("b")]);
        assert_eq!(deep_hash(&item), deep_hash(&item));
    }

    #[test]
    fn test_deep_hash_sensitive_to_order() {
        let ab = DeepHashItem::List(vec![DeepHashItem::utf8("a"), DeepHashItem::utf8("b")]);
        let ba = DeepHashItem::List(vec![DeepHashItem::utf8("b"), DeepHashItem::utf8("a")]);
        assert_ne!(deep_hash(&ab), deep_hash(&ba));
    }

    #[test]
    fn test_blob_and_single_element_list_differ() {
        let blob = DeepHashItem::utf8("a");
        let list = DeepHashItem::List(vec![DeepHashItem::utf8("a")]);
        assert_ne!(deep_hash(&blob), deep_hash(&list));
    }

    #[test]
    fn test_empty_list_hash_is_stable() {
        let empty = DeepHashItem::List(vec![]);
        assert_eq!(deep_hash(&empty), deep_hash(&DeepHashItem::List(vec![])));
    }
}
