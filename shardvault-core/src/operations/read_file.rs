use super::{distinct_endpoints, ensure_owners_registered};
use crate::{
    ChunkTransport, FetchedChunk, FileMetadata, MetadataStore, NodeRegistry, Result, build_root,
};
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use futures_util::future::try_join_all;
use std::sync::Arc;

#[derive(Clone)]
pub struct ReadFileOperation {
    registry: Arc<NodeRegistry>,
    metadata_store: Arc<MetadataStore>,
    transport: Arc<dyn ChunkTransport>,
}

#[derive(Debug, Clone)]
pub struct ReadFileOperationRequest {
    pub file_id: String,
}

#[derive(Debug, Clone)]
pub enum ReadFileOperationOutcome {
    /// `body` is only ever returned after the Merkle root matched.
    Found { metadata: FileMetadata, body: Bytes },
    NotFound,
    Tampered { expected: String, actual: String },
}

impl ReadFileOperation {
    pub fn new(
        registry: Arc<NodeRegistry>,
        metadata_store: Arc<MetadataStore>,
        transport: Arc<dyn ChunkTransport>,
    ) -> Self {
        Self {
            registry,
            metadata_store,
            transport,
        }
    }

    pub async fn run(&self, request: ReadFileOperationRequest) -> Result<ReadFileOperationOutcome> {
        let ReadFileOperationRequest { file_id } = request;

        let Some(mut metadata) = self.metadata_store.get_file(&file_id)? else {
            return Ok(ReadFileOperationOutcome::NotFound);
        };

        let owners = self.metadata_store.list_chunk_nodes(&file_id)?;
        ensure_owners_registered(&self.registry, &owners).await?;

        // A node returns every chunk it holds for the file, so an endpoint
        // registered under two ids is fetched once.
        let endpoints = distinct_endpoints(&owners);
        let per_node = try_join_all(endpoints.iter().enumerate().map(|(node_index, node)| {
            self.transport.fetch(&node.node_url, &file_id, node_index)
        }))
        .await?;

        let mut chunks: Vec<FetchedChunk> = per_node.into_iter().flatten().collect();
        chunks.sort_by_key(|chunk| chunk.chunk_index);

        let expected = metadata.merkle_root_hash.clone();
        let data: Vec<&[u8]> = chunks.iter().map(|c| c.chunk_data.as_ref()).collect();
        let actual = build_root(&data);

        // A padded tree cannot tell [a, b, c] from [a, b, c, c], so the
        // index sequence is checked on its own.
        let contiguous = chunks.len() == metadata.chunk_count as usize
            && chunks
                .iter()
                .enumerate()
                .all(|(position, chunk)| chunk.chunk_index as usize == position);

        if !contiguous || actual != expected {
            tracing::warn!(
                "Integrity check failed for {}: expected root {}, got {} ({} of {} chunks, contiguous={})",
                file_id,
                expected,
                actual,
                chunks.len(),
                metadata.chunk_count,
                contiguous
            );
            return Ok(ReadFileOperationOutcome::Tampered { expected, actual });
        }

        let total_len: usize = chunks.iter().map(|c| c.chunk_data.len()).sum();
        let mut body = BytesMut::with_capacity(total_len);
        for chunk in &chunks {
            body.extend_from_slice(&chunk.chunk_data);
        }

        let now = Utc::now();
        self.metadata_store.touch_last_accessed(&file_id, now)?;
        metadata.last_accessed = now;

        tracing::debug!("Retrieved {} ({} bytes)", file_id, body.len());
        Ok(ReadFileOperationOutcome::Found {
            metadata,
            body: body.freeze(),
        })
    }
}
