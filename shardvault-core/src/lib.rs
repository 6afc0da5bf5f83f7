//! Shardvault Core - coordinator library for chunked, integrity-verified file storage
//!
//! A coordinator that spreads files over a dynamic pool of storage nodes:
//! - 1 MiB fixed-size chunks, placed round-robin over a shuffled node list
//! - SHA256 Merkle root per file for tamper detection
//! - SQLite for file metadata and the chunk-location index
//! - HTTP wire contract to store, fetch and delete chunks on nodes

pub mod chunk;
pub mod error;
pub mod merkle;
pub mod operations;
pub mod placement;
pub mod registry;
pub mod storage;
pub mod transport;

pub use chunk::{CHUNK_SIZE, derive_chunk_id, split_into_chunks};
pub use error::{ErrorKind, Result, VaultError};
pub use merkle::{MerkleTree, build_root, compute_hash, verify_root};
pub use operations::{
    DeleteFileOperation, DeleteFileOperationOutcome, DeleteFileOperationRequest,
    ListFilesOperation, ReadFileOperation, ReadFileOperationOutcome, ReadFileOperationRequest,
    UploadFileOperation, UploadFileOperationRequest, UploadFileOperationResult,
};
pub use placement::{ChunkPlacement, plan_placement};
pub use registry::{NodeInfo, NodeRegistry};
pub use storage::{ChunkRecord, FileMetadata, FileSummary, MetadataStore};
pub use transport::{
    ChunkPayload, ChunkTransport, FetchedChunk, HttpChunkTransport, MemoryChunkTransport,
    TransportOptions,
};
