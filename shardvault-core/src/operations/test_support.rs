use crate::{
    ChunkTransport, MemoryChunkTransport, MetadataStore, NodeInfo, NodeRegistry,
    UploadFileOperation, UploadFileOperationRequest, UploadFileOperationResult,
};
use bytes::Bytes;
use std::sync::Arc;
use tempfile::TempDir;

pub(crate) struct Harness {
    _dir: TempDir,
    pub registry: Arc<NodeRegistry>,
    pub metadata_store: Arc<MetadataStore>,
    pub memory: Arc<MemoryChunkTransport>,
}

impl Harness {
    pub async fn with_nodes(count: usize) -> Self {
        let dir = TempDir::new().unwrap();
        let metadata_store = Arc::new(MetadataStore::new(dir.path().join("meta.sqlite")).unwrap());
        let registry = Arc::new(NodeRegistry::new());
        for node in Self::node_list(count) {
            registry.register(node).await.unwrap();
        }

        Self {
            _dir: dir,
            registry,
            metadata_store,
            memory: Arc::new(MemoryChunkTransport::new()),
        }
    }

    pub fn node_list(count: usize) -> Vec<NodeInfo> {
        (0..count)
            .map(|i| NodeInfo::new(format!("node-{}", i), format!("http://node-{}", i)))
            .collect()
    }

    pub fn transport(&self) -> Arc<dyn ChunkTransport> {
        self.memory.clone()
    }

    pub fn upload_operation(&self) -> UploadFileOperation {
        UploadFileOperation::new(
            self.registry.clone(),
            self.metadata_store.clone(),
            self.transport(),
            4,
        )
    }

    pub async fn upload(&self, name: &str, body: Vec<u8>) -> UploadFileOperationResult {
        self.upload_operation()
            .run(UploadFileOperationRequest {
                file_name: name.to_string(),
                file_type: "application/octet-stream".to_string(),
                body: Bytes::from(body),
            })
            .await
            .unwrap()
    }
}

/// Deterministic non-repeating test content.
pub(crate) fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
