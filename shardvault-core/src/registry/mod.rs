//! Live set of storage nodes.
//!
//! Nodes self-register and are kept in memory only: a coordinator restart
//! forgets every node, and chunk records pointing at them become unreadable
//! until the nodes register again.

use crate::{Result, VaultError};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// A storage node address. Identity is the `(node_id, node_url)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub node_id: String,
    #[serde(alias = "nodeURL")]
    pub node_url: String,
}

impl NodeInfo {
    pub fn new(node_id: impl Into<String>, node_url: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            node_url: node_url.into(),
        }
    }

    pub fn matches(&self, node_id: &str, node_url: &str) -> bool {
        self.node_id == node_id && self.node_url == node_url
    }
}

/// Registration order is preserved by `list`. The tokio lock is fair, so a
/// waiting writer is not starved by a stream of placement reads.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: RwLock<Vec<NodeInfo>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, node: NodeInfo) -> Result<()> {
        if node.node_id.trim().is_empty() {
            return Err(VaultError::InvalidRequest(
                "node id is required".to_string(),
            ));
        }
        if node.node_url.trim().is_empty() {
            return Err(VaultError::InvalidRequest(
                "node url is required".to_string(),
            ));
        }

        let mut nodes = self.nodes.write().await;
        if nodes.iter().any(|n| n.matches(&node.node_id, &node.node_url)) {
            return Err(VaultError::DuplicateNode {
                node_id: node.node_id,
                node_url: node.node_url,
            });
        }

        tracing::info!("Node {} registered at {}", node.node_id, node.node_url);
        nodes.push(node);
        Ok(())
    }

    pub async fn unregister(&self, node_id: &str, node_url: &str) -> Result<NodeInfo> {
        let mut nodes = self.nodes.write().await;
        let position = nodes
            .iter()
            .position(|n| n.matches(node_id, node_url))
            .ok_or_else(|| VaultError::NodeNotFound {
                node_id: node_id.to_string(),
                node_url: node_url.to_string(),
            })?;

        let removed = nodes.remove(position);
        tracing::info!("Node {} unregistered from {}", removed.node_id, removed.node_url);
        Ok(removed)
    }

    pub async fn list(&self) -> Vec<NodeInfo> {
        self.nodes.read().await.clone()
    }

    /// Snapshot in a fresh random order, so repeated uploads do not always
    /// start on the same node.
    pub async fn randomized_list(&self) -> Vec<NodeInfo> {
        let mut snapshot = self.list().await;
        snapshot.shuffle(&mut rand::thread_rng());
        snapshot
    }

    pub async fn contains(&self, node_id: &str, node_url: &str) -> bool {
        self.nodes
            .read()
            .await
            .iter()
            .any(|n| n.matches(node_id, node_url))
    }

    pub async fn len(&self) -> usize {
        self.nodes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.nodes.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_register_and_list_in_order() {
        let registry = NodeRegistry::new();
        registry.register(NodeInfo::new("a", "http://a")).await.unwrap();
        registry.register(NodeInfo::new("b", "http://b")).await.unwrap();
        registry.register(NodeInfo::new("c", "http://c")).await.unwrap();

        let ids: Vec<String> = registry.list().await.into_iter().map(|n| n.node_id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(registry.len().await, 3);
    }

    #[tokio::test]
    async fn test_duplicate_pair_rejected() {
        let registry = NodeRegistry::new();
        registry.register(NodeInfo::new("a", "http://a")).await.unwrap();

        let err = registry
            .register(NodeInfo::new("a", "http://a"))
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::DuplicateNode { .. }));

        // Same id at a different address is a distinct node.
        registry.register(NodeInfo::new("a", "http://a2")).await.unwrap();
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_missing_fields_rejected() {
        let registry = NodeRegistry::new();
        let err = registry.register(NodeInfo::new("", "http://a")).await.unwrap_err();
        assert!(matches!(err, VaultError::InvalidRequest(_)));
        let err = registry.register(NodeInfo::new("a", " ")).await.unwrap_err();
        assert!(matches!(err, VaultError::InvalidRequest(_)));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_unregister_requires_exact_pair() {
        let registry = NodeRegistry::new();
        registry.register(NodeInfo::new("a", "http://a")).await.unwrap();
        registry.register(NodeInfo::new("b", "http://b")).await.unwrap();

        let err = registry.unregister("a", "http://b").await.unwrap_err();
        assert!(matches!(err, VaultError::NodeNotFound { .. }));
        assert_eq!(registry.len().await, 2);

        let removed = registry.unregister("a", "http://a").await.unwrap();
        assert_eq!(removed.node_id, "a");
        assert!(!registry.contains("a", "http://a").await);
        assert!(registry.contains("b", "http://b").await);
    }

    #[tokio::test]
    async fn test_randomized_list_is_a_permutation() {
        let registry = NodeRegistry::new();
        for i in 0..8 {
            registry
                .register(NodeInfo::new(format!("n{}", i), format!("http://n{}", i)))
                .await
                .unwrap();
        }

        let listed: HashSet<NodeInfo> = registry.list().await.into_iter().collect();
        let shuffled = registry.randomized_list().await;
        assert_eq!(shuffled.len(), 8);
        assert_eq!(shuffled.into_iter().collect::<HashSet<_>>(), listed);
    }

    #[tokio::test]
    async fn test_concurrent_registration() {
        let registry = Arc::new(NodeRegistry::new());
        let mut handles = Vec::new();
        for i in 0..32 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .register(NodeInfo::new(format!("n{}", i), format!("http://n{}", i)))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(registry.len().await, 32);
    }

    #[test]
    fn test_node_info_accepts_legacy_url_field() {
        let node: NodeInfo =
            serde_json::from_str(r#"{"nodeId":"a","nodeURL":"http://a"}"#).unwrap();
        assert_eq!(node, NodeInfo::new("a", "http://a"));
    }
}
