//! Persistent file metadata and the chunk-location index.

pub mod metadata_store;

pub use metadata_store::{ChunkRecord, FileMetadata, FileSummary, MetadataStore};
