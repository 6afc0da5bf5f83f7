pub mod delete_file;
pub mod list_files;
pub mod read_file;
pub mod upload_file;

#[cfg(test)]
pub(crate) mod test_support;

pub use delete_file::{
    DeleteFileOperation, DeleteFileOperationOutcome, DeleteFileOperationRequest,
};
pub use list_files::ListFilesOperation;
pub use read_file::{ReadFileOperation, ReadFileOperationOutcome, ReadFileOperationRequest};
pub use upload_file::{UploadFileOperation, UploadFileOperationRequest, UploadFileOperationResult};

use crate::{NodeInfo, NodeRegistry, Result, VaultError};

/// Fails with `NodeUnavailable` on the first owner missing from the live
/// registry. Chunks on an unregistered node are never silently skipped.
pub(crate) async fn ensure_owners_registered(
    registry: &NodeRegistry,
    owners: &[NodeInfo],
) -> Result<()> {
    let live = registry.list().await;
    match owners.iter().find(|owner| !live.contains(owner)) {
        Some(missing) => Err(VaultError::NodeUnavailable {
            node_id: missing.node_id.clone(),
            node_url: missing.node_url.clone(),
        }),
        None => Ok(()),
    }
}

/// One entry per storage endpoint. A node that re-registered under a new id
/// keeps its url, and must only be called once per file.
pub(crate) fn distinct_endpoints(owners: &[NodeInfo]) -> Vec<&NodeInfo> {
    let mut seen = std::collections::HashSet::new();
    owners
        .iter()
        .filter(|owner| seen.insert(owner.node_url.as_str()))
        .collect()
}
