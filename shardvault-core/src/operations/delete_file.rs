use super::{distinct_endpoints, ensure_owners_registered};
use crate::{ChunkTransport, FileMetadata, MetadataStore, NodeRegistry, Result, VaultError};
use futures_util::future::join_all;
use std::sync::Arc;

#[derive(Clone)]
pub struct DeleteFileOperation {
    registry: Arc<NodeRegistry>,
    metadata_store: Arc<MetadataStore>,
    transport: Arc<dyn ChunkTransport>,
}

#[derive(Debug, Clone)]
pub struct DeleteFileOperationRequest {
    pub file_id: String,
}

#[derive(Debug, Clone)]
pub enum DeleteFileOperationOutcome {
    Deleted { metadata: FileMetadata },
    NotFound,
}

impl DeleteFileOperation {
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

    /// Nothing is touched unless every owning node is registered. Every
    /// owner is then asked to delete; deletes that succeeded are not rolled
    /// back, but metadata is only removed once all of them succeeded, so a
    /// failed delete can be retried.
    pub async fn run(&self, request: DeleteFileOperationRequest) -> Result<DeleteFileOperationOutcome> {
        let DeleteFileOperationRequest { file_id } = request;

        let Some(metadata) = self.metadata_store.get_file(&file_id)? else {
            return Ok(DeleteFileOperationOutcome::NotFound);
        };

        let owners = self.metadata_store.list_chunk_nodes(&file_id)?;
        ensure_owners_registered(&self.registry, &owners).await?;

        let endpoints = distinct_endpoints(&owners);
        let results = join_all(
            endpoints
                .iter()
                .map(|node| self.transport.delete(&node.node_url, &file_id)),
        )
        .await;

        let mut failed = Vec::new();
        for (node, result) in endpoints.into_iter().zip(results) {
            if let Err(err) = result {
                tracing::warn!(
                    "Failed to delete chunks of {} on node {}: {}",
                    file_id,
                    node.node_id,
                    err
                );
                failed.push(node);
            }
        }

        if let Some(first) = failed.first() {
            let failed_ids: Vec<&str> = failed.iter().map(|n| n.node_id.as_str()).collect();
            return Err(VaultError::transport(
                &first.node_url,
                format!(
                    "chunk delete failed on {}; metadata for {} kept",
                    failed_ids.join(", "),
                    file_id
                ),
            ));
        }

        self.metadata_store.delete_file(&file_id)?;
        tracing::info!("Deleted {} ({})", file_id, metadata.file_name);

        Ok(DeleteFileOperationOutcome::Deleted { metadata })
    }
}
