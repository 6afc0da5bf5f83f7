use crate::{FileSummary, MetadataStore, Result};
use std::sync::Arc;

#[derive(Clone)]
pub struct ListFilesOperation {
    metadata_store: Arc<MetadataStore>,
}

impl ListFilesOperation {
    pub fn new(metadata_store: Arc<MetadataStore>) -> Self {
        Self { metadata_store }
    }

    pub async fn run(&self) -> Result<Vec<FileSummary>> {
        let files = self.metadata_store.list_files()?;
        Ok(files.into_iter().map(FileSummary::from).collect())
    }
}
