use crate::merkle::compute_hash;
use bytes::Bytes;

pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Split a file body into `CHUNK_SIZE` slices in original order. The last
/// chunk may be shorter; an empty body yields no chunks.
pub fn split_into_chunks(data: &Bytes) -> Vec<Bytes> {
    split_with_size(data, CHUNK_SIZE)
}

pub(crate) fn split_with_size(data: &Bytes, chunk_size: usize) -> Vec<Bytes> {
    let chunk_size = chunk_size.max(1);
    (0..data.len())
        .step_by(chunk_size)
        .map(|start| data.slice(start..(start + chunk_size).min(data.len())))
        .collect()
}

/// Chunk ids are content-derived but scoped to the file and position, so two
/// identical chunks in one file still get distinct ids.
pub fn derive_chunk_id(file_id: &str, chunk_index: u32, chunk_hash: &str) -> String {
    compute_hash(format!("{}:{}:{}", file_id, chunk_index, chunk_hash).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_exact_multiple() {
        let data = Bytes::from(vec![1u8; CHUNK_SIZE * 3]);
        let chunks = split_into_chunks(&data);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() == CHUNK_SIZE));
    }

    #[test]
    fn test_split_short_tail() {
        let data = Bytes::from(vec![2u8; CHUNK_SIZE + 17]);
        let chunks = split_into_chunks(&data);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].len(), 17);
    }

    #[test]
    fn test_split_empty() {
        assert!(split_into_chunks(&Bytes::new()).is_empty());
    }

    #[test]
    fn test_split_preserves_order() {
        let data = Bytes::from((0u8..10).collect::<Vec<_>>());
        let chunks = split_with_size(&data, 4);
        assert_eq!(chunks.len(), 3);
        assert_eq!(&chunks[0][..], &[0, 1, 2, 3]);
        assert_eq!(&chunks[2][..], &[8, 9]);
    }

    #[test]
    fn test_chunk_id_unique_for_identical_content() {
        let hash = compute_hash(b"same");
        let first = derive_chunk_id("file", 0, &hash);
        let second = derive_chunk_id("file", 1, &hash);
        assert_ne!(first, second);
        assert_eq!(first, derive_chunk_id("file", 0, &hash));
    }
}
