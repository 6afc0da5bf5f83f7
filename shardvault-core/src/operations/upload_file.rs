use crate::{
    ChunkPayload, ChunkRecord, ChunkTransport, FileMetadata, MetadataStore, NodeRegistry, Result,
    VaultError, build_root, compute_hash, derive_chunk_id, plan_placement, split_into_chunks,
};
use bytes::Bytes;
use chrono::Utc;
use futures_util::{StreamExt, TryStreamExt, stream};
use std::sync::Arc;
use ulid::Ulid;

const DEFAULT_FILE_TYPE: &str = "application/octet-stream";

#[derive(Clone)]
pub struct UploadFileOperation {
    registry: Arc<NodeRegistry>,
    metadata_store: Arc<MetadataStore>,
    transport: Arc<dyn ChunkTransport>,
    max_in_flight: usize,
}

#[derive(Debug, Clone)]
pub struct UploadFileOperationRequest {
    pub file_name: String,
    /// MIME type; empty means `application/octet-stream`.
    pub file_type: String,
    pub body: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileOperationResult {
    pub file_id: String,
    pub file_name: String,
    pub chunk_count: u32,
    pub file_size: u64,
    pub merkle_root_hash: String,
}

impl UploadFileOperation {
    pub fn new(
        registry: Arc<NodeRegistry>,
        metadata_store: Arc<MetadataStore>,
        transport: Arc<dyn ChunkTransport>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            registry,
            metadata_store,
            transport,
            max_in_flight: max_in_flight.max(1),
        }
    }

    pub async fn run(&self, request: UploadFileOperationRequest) -> Result<UploadFileOperationResult> {
        let UploadFileOperationRequest {
            file_name,
            file_type,
            body,
        } = request;

        if file_name.trim().is_empty() {
            return Err(VaultError::InvalidRequest("file name is required".to_string()));
        }
        let file_type = if file_type.trim().is_empty() {
            DEFAULT_FILE_TYPE.to_string()
        } else {
            file_type
        };

        let chunks = split_into_chunks(&body);
        let merkle_root_hash = build_root(&chunks);

        let nodes = self.registry.randomized_list().await;
        let placements = plan_placement(chunks.len(), &nodes)?;
        let file_id = Ulid::new().to_string();

        let mut payloads = Vec::with_capacity(chunks.len());
        let mut records = Vec::with_capacity(chunks.len());
        for (placement, chunk) in placements.iter().zip(chunks) {
            let chunk_hash = compute_hash(&chunk);
            let chunk_id = derive_chunk_id(&file_id, placement.chunk_index, &chunk_hash);
            let (next_id, next_url) = placement
                .next_node
                .as_ref()
                .map(|n| (n.node_id.clone(), n.node_url.clone()))
                .unwrap_or_default();

            records.push(ChunkRecord {
                chunk_id: chunk_id.clone(),
                file_id: file_id.clone(),
                file_name: file_name.clone(),
                chunk_index: placement.chunk_index,
                chunk_node_id: placement.node.node_id.clone(),
                chunk_node_url: placement.node.node_url.clone(),
                chunk_hash,
                next_chunk_node_id: next_id.clone(),
                next_chunk_node_url: next_url.clone(),
            });
            payloads.push(ChunkPayload {
                chunk_id,
                file_id: file_id.clone(),
                file_name: file_name.clone(),
                chunk,
                merkle_root_hash: merkle_root_hash.clone(),
                chunk_index: placement.chunk_index,
                next_chunk_node_id: next_id,
                next_chunk_node_url: next_url,
            });
        }

        // buffered() keeps index order; try_collect stops at the first error
        // and drops the calls still in flight.
        let transport = &self.transport;
        let store_calls: Vec<_> = payloads
            .iter()
            .zip(&placements)
            .map(|(payload, placement)| transport.store(&placement.node.node_url, payload))
            .collect();
        let stored = stream::iter(store_calls)
            .buffered(self.max_in_flight)
            .try_collect::<Vec<()>>()
            .await;

        if let Err(err) = stored {
            tracing::error!("Upload of {} ({}) aborted: {}", file_id, file_name, err);
            return Err(err);
        }

        let now = Utc::now();
        let (first_id, first_url) = placements
            .first()
            .map(|p| (p.node.node_id.clone(), p.node.node_url.clone()))
            .unwrap_or_default();
        let chunk_count = u32::try_from(records.len())
            .map_err(|_| VaultError::InvalidRequest("too many chunks".to_string()))?;
        let meta = FileMetadata {
            file_id: file_id.clone(),
            file_name: file_name.clone(),
            file_type,
            chunk_count,
            first_chunk_node_id: first_id,
            first_chunk_node_url: first_url,
            merkle_root_hash: merkle_root_hash.clone(),
            file_size: body.len() as u64,
            created_at: now,
            last_modified: now,
            last_accessed: now,
        };
        self.metadata_store.put_file(&meta, &records)?;

        tracing::info!(
            "Uploaded {} as {}: {} bytes in {} chunks",
            file_name,
            file_id,
            meta.file_size,
            chunk_count
        );

        Ok(UploadFileOperationResult {
            file_id,
            file_name,
            chunk_count,
            file_size: meta.file_size,
            merkle_root_hash,
        })
    }
}
