use sha2::{Digest, Sha256};

/// Arweave's data chunking/merkle scheme, used to recompute a transaction's
/// `data_root` from retrieved bytes so verification checks the bytes
/// actually served rather than a header field a gateway merely reports.
const MAX_CHUNK_SIZE: usize = 256 * 1024;
const MIN_CHUNK_SIZE: usize = 32 * 1024;
const NOTE_SIZE: usize = 32;

struct Chunk {
    data_hash: [u8; 32],
    max_byte_range: u64,
}

fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

fn encode_offset(offset: u64) -> [u8; NOTE_SIZE] {
    let mut note = [0u8; NOTE_SIZE];
    note[NOTE_SIZE - 8..].copy_from_slice(&offset.to_be_bytes());
    note
}

/// Splits `data` into Arweave chunks, rebalancing the final chunk so no
/// chunk (other than a trailing remainder smaller than the minimum) is cut
/// unevenly short of `MIN_CHUNK_SIZE`.
fn chunk_data(data: &[u8]) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut rest = data;
    let mut cursor: u64 = 0;

    while rest.len() >= MAX_CHUNK_SIZE {
        let mut chunk_size = MAX_CHUNK_SIZE;
        let next_chunk_size = rest.len() - MAX_CHUNK_SIZE;
        if next_chunk_size > 0 && next_chunk_size < MIN_CHUNK_SIZE {
            chunk_size = rest.len().div_ceil(2);
        }
        let (chunk, remainder) = rest.split_at(chunk_size);
        cursor += chunk.len() as u64;
        chunks.push(Chunk {
            data_hash: sha256(chunk),
            max_byte_range: cursor,
        });
        rest = remainder;
    }

    cursor += rest.len() as u64;
    chunks.push(Chunk {
        data_hash: sha256(rest),
        max_byte_range: cursor,
    });
    chunks
}

struct Node {
    id: [u8; 32],
    max_byte_range: u64,
}

fn leaf(chunk: &Chunk) -> Node {
    let note = encode_offset(chunk.max_byte_range);
    let mut preimage = Vec::with_capacity(64);
    preimage.extend_from_slice(&sha256(&chunk.data_hash));
    preimage.extend_from_slice(&sha256(&note));
    Node {
        id: sha256(&preimage),
        max_byte_range: chunk.max_byte_range,
    }
}

fn hash_pair(left: &Node, right: Option<&Node>) -> Node {
    match right {
        None => Node {
            id: left.id,
            max_byte_range: left.max_byte_range,
        },
        Some(right) => {
            let note = encode_offset(left.max_byte_range);
            let mut preimage = Vec::with_capacity(96);
            preimage.extend_from_slice(&sha256(&left.id));
            preimage.extend_from_slice(&sha256(&right.id));
            preimage.extend_from_slice(&sha256(&note));
            Node {
                id: sha256(&preimage),
                max_byte_range: right.max_byte_range,
            }
        }
    }
}

fn build_layers(mut nodes: Vec<Node>) -> Node {
    while nodes.len() > 1 {
        let mut next = Vec::with_capacity(nodes.len().div_ceil(2));
        let mut iter = nodes.into_iter();
        while let Some(left) = iter.next() {
            let right = iter.next();
            next.push(hash_pair(&left, right.as_ref()));
        }
        nodes = next;
    }
    nodes.into_iter().next().unwrap_or(Node {
        id: sha256(&[]),
        max_byte_range: 0,
    })
}

/// Recomputes the Arweave merkle `data_root` for a byte slice.
pub fn compute_data_root(data: &[u8]) -> [u8; 32] {
    let chunks = chunk_data(data);
    let leaves: Vec<Node> = chunks.iter().map(leaf).collect();
    build_layers(leaves).id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_data_root_is_stable() {
        assert_eq!(compute_data_root(b""), compute_data_root(b""));
    }

    #[test]
    fn test_small_data_root_is_deterministic() {
        let data = b"hello wayfinder";
        assert_eq!(compute_data_root(data), compute_data_root(data));
    }

    #[test]
    fn test_different_data_yields_different_root() {
        assert_ne!(compute_data_root(b"hello"), compute_data_root(b"world"));
    }

    #[test]
    fn test_multi_chunk_data_root() {
        let data = vec![7u8; MAX_CHUNK_SIZE + 1024];
        let root = compute_data_root(&data);
        assert_ne!(root, compute_data_root(&data[..MAX_CHUNK_SIZE]));
    }
}
