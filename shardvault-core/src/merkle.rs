//! SHA256 Merkle tree over an ordered list of chunks.
//!
//! Leaves are the SHA256 digests of each chunk. Each parent is the SHA256 of
//! its two children's raw digests concatenated; an odd node at the end of a
//! level is paired with itself. Chunk order is part of the hashed domain.

use sha2::{Digest, Sha256};

type Digest32 = [u8; 32];

/// Compute SHA256 hash of data as lowercase hex
pub fn compute_hash(data: &[u8]) -> String {
    hex::encode(digest(data))
}

fn digest(data: &[u8]) -> Digest32 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

fn combine(left: &Digest32, right: &Digest32) -> Digest32 {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Every level of the tree, leaves first. Built iteratively so very large
/// chunk counts never recurse.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<Digest32>>,
}

impl MerkleTree {
    pub fn build<T: AsRef<[u8]>>(chunks: &[T]) -> Self {
        if chunks.is_empty() {
            return Self {
                levels: vec![vec![digest(&[])]],
            };
        }

        let leaves: Vec<Digest32> = chunks.iter().map(|chunk| digest(chunk.as_ref())).collect();
        let mut levels = vec![leaves];

        while levels.last().map(Vec::len).unwrap_or(0) > 1 {
            let current = &levels[levels.len() - 1];
            let next: Vec<Digest32> = current
                .chunks(2)
                .map(|pair| {
                    let left = &pair[0];
                    let right = pair.get(1).unwrap_or(left);
                    combine(left, right)
                })
                .collect();
            levels.push(next);
        }

        Self { levels }
    }

    pub fn root(&self) -> String {
        // build() always leaves a final level holding exactly one digest
        self.levels
            .last()
            .and_then(|level| level.first())
            .map(hex::encode)
            .unwrap_or_default()
    }

    pub fn leaf_count(&self) -> usize {
        self.levels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn leaf_hashes(&self) -> Vec<String> {
        self.levels
            .first()
            .map(|level| level.iter().map(hex::encode).collect())
            .unwrap_or_default()
    }
}

pub fn build_root<T: AsRef<[u8]>>(chunks: &[T]) -> String {
    MerkleTree::build(chunks).root()
}

/// Exact comparison only; there is no partial-match result.
pub fn verify_root<T: AsRef<[u8]>>(chunks: &[T], expected_root: &str) -> bool {
    build_root(chunks) == expected_root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair_hex(left: &str, right: &str) -> String {
        let left = hex::decode(left).unwrap();
        let right = hex::decode(right).unwrap();
        let mut joined = left;
        joined.extend_from_slice(&right);
        compute_hash(&joined)
    }

    #[test]
    fn test_compute_hash() {
        let hash = compute_hash(b"hello world");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_single_chunk_root_is_leaf_hash() {
        let root = build_root(&[b"only chunk".to_vec()]);
        assert_eq!(root, compute_hash(b"only chunk"));
    }

    #[test]
    fn test_two_chunks() {
        let a = compute_hash(b"a");
        let b = compute_hash(b"b");
        assert_eq!(build_root(&[b"a", b"b"]), pair_hex(&a, &b));
    }

    #[test]
    fn test_odd_level_duplicates_last() {
        let a = compute_hash(b"a");
        let b = compute_hash(b"b");
        let c = compute_hash(b"c");

        let expected = pair_hex(&pair_hex(&a, &b), &pair_hex(&c, &c));
        let tree = MerkleTree::build(&[b"a", b"b", b"c"]);

        assert_eq!(tree.root(), expected);
        assert_eq!(tree.leaf_count(), 3);
        assert_eq!(tree.depth(), 3);
        assert_eq!(tree.leaf_hashes(), vec![a, b, c]);
    }

    #[test]
    fn test_deterministic() {
        let chunks: Vec<Vec<u8>> = (0..9u8).map(|i| vec![i; 100]).collect();
        assert_eq!(build_root(&chunks), build_root(&chunks));
    }

    #[test]
    fn test_reordering_changes_root() {
        let chunks = vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()];
        let mut swapped = chunks.clone();
        swapped.swap(0, 2);
        assert_ne!(build_root(&chunks), build_root(&swapped));
    }

    #[test]
    fn test_single_byte_change_fails_verification() {
        let chunks = vec![vec![7u8; 64], vec![8u8; 64], vec![9u8; 10]];
        let root = build_root(&chunks);
        assert!(verify_root(&chunks, &root));

        let mut tampered = chunks.clone();
        tampered[1][33] ^= 0x01;
        assert!(!verify_root(&tampered, &root));
    }

    #[test]
    fn test_dropping_a_trailing_chunk_changes_root() {
        let three = build_root(&[b"a", b"b", b"c"]);
        let two = build_root(&[b"a", b"b"]);
        assert_ne!(three, two);
    }

    #[test]
    fn test_padding_matches_explicit_duplicate() {
        // Readers must check the chunk count as well as the root.
        let padded = build_root(&[b"a", b"b", b"c"]);
        let explicit = build_root(&[b"a", b"b", b"c", b"c"]);
        assert_eq!(padded, explicit);
    }

    #[test]
    fn test_empty_input() {
        let empty: Vec<Vec<u8>> = Vec::new();
        assert_eq!(build_root(&empty), compute_hash(&[]));
        assert!(verify_root(&empty, &compute_hash(&[])));
    }
}
