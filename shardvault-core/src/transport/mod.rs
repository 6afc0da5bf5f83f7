//! Wire client for storing, fetching and deleting chunks on storage nodes.

pub mod http;
pub mod memory;

use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use http::HttpChunkTransport;
pub use memory::MemoryChunkTransport;

/// One chunk as sent to a node's ingest endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkPayload {
    pub chunk_id: String,
    pub file_id: String,
    pub file_name: String,
    #[serde(with = "base64_bytes")]
    pub chunk: Bytes,
    pub merkle_root_hash: String,
    pub chunk_index: u32,
    /// Empty for the last chunk.
    #[serde(rename = "nextChunkNodeID")]
    pub next_chunk_node_id: String,
    pub next_chunk_node_url: String,
}

/// A chunk returned by a node, tagged with its position in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchedChunk {
    pub chunk_index: u32,
    #[serde(with = "base64_bytes")]
    pub chunk_data: Bytes,
}

#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Upper bound on a single node call; expiry counts as a transport failure.
    pub timeout: Duration,
    /// Concurrent `store` calls allowed within one upload.
    pub max_in_flight: usize,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_in_flight: 4,
        }
    }
}

#[async_trait]
pub trait ChunkTransport: Send + Sync {
    /// Succeeds only when the node acknowledged durable acceptance.
    async fn store(&self, node_url: &str, payload: &ChunkPayload) -> Result<()>;

    /// Every chunk of `file_id` the node holds. A node may hold several.
    async fn fetch(
        &self,
        node_url: &str,
        file_id: &str,
        node_index: usize,
    ) -> Result<Vec<FetchedChunk>>;

    /// Drop every chunk of `file_id` held by the node.
    async fn delete(&self, node_url: &str, file_id: &str) -> Result<()>;
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_wire_field_names() {
        let payload = ChunkPayload {
            chunk_id: "c".to_string(),
            file_id: "f".to_string(),
            file_name: "a.txt".to_string(),
            chunk: Bytes::from_static(b"hi"),
            merkle_root_hash: "r".to_string(),
            chunk_index: 2,
            next_chunk_node_id: "n1".to_string(),
            next_chunk_node_url: "http://n1".to_string(),
        };

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["chunkId"], "c");
        assert_eq!(value["fileId"], "f");
        assert_eq!(value["chunk"], "aGk=");
        assert_eq!(value["chunkIndex"], 2);
        assert_eq!(value["nextChunkNodeID"], "n1");
        assert_eq!(value["nextChunkNodeUrl"], "http://n1");
    }

    #[test]
    fn test_fetched_chunk_decodes_base64() {
        let chunk: FetchedChunk =
            serde_json::from_str(r#"{"chunkIndex":3,"chunkData":"AAEC"}"#).unwrap();
        assert_eq!(chunk.chunk_index, 3);
        assert_eq!(&chunk.chunk_data[..], &[0, 1, 2]);

        let bad = serde_json::from_str::<FetchedChunk>(r#"{"chunkIndex":0,"chunkData":"@@"}"#);
        assert!(bad.is_err());
    }
}
