//! Round-robin chunk placement over a node list shuffled per upload.

use crate::{NodeInfo, Result, VaultError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlacement {
    pub chunk_index: u32,
    pub node: NodeInfo,
    /// Node holding `chunk_index + 1`; `None` for the final chunk.
    pub next_node: Option<NodeInfo>,
}

/// Assign chunk `i` to `nodes[i % N]` and link each chunk to the node that
/// holds its successor. `nodes` should come from
/// [`NodeRegistry::randomized_list`](crate::NodeRegistry::randomized_list).
pub fn plan_placement(chunk_count: usize, nodes: &[NodeInfo]) -> Result<Vec<ChunkPlacement>> {
    if nodes.is_empty() {
        return Err(VaultError::NoNodesRegistered);
    }

    let node_count = nodes.len();
    (0..chunk_count)
        .map(|index| {
            let chunk_index = u32::try_from(index).map_err(|_| {
                VaultError::InvalidRequest(format!("chunk index overflow: {}", index))
            })?;
            let next_node = if index + 1 < chunk_count {
                Some(nodes[(index + 1) % node_count].clone())
            } else {
                None
            };

            Ok(ChunkPlacement {
                chunk_index,
                node: nodes[index % node_count].clone(),
                next_node,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn nodes(n: usize) -> Vec<NodeInfo> {
        (0..n)
            .map(|i| NodeInfo::new(format!("n{}", i), format!("http://n{}", i)))
            .collect()
    }

    #[test]
    fn test_no_nodes_is_precondition_failure() {
        let err = plan_placement(3, &[]).unwrap_err();
        assert!(matches!(err, VaultError::NoNodesRegistered));
    }

    #[test]
    fn test_round_robin_with_successor_links() {
        let pool = nodes(3);
        let plan = plan_placement(5, &pool).unwrap();

        let assigned: Vec<&str> = plan.iter().map(|p| p.node.node_id.as_str()).collect();
        assert_eq!(assigned, vec!["n0", "n1", "n2", "n0", "n1"]);

        for window in plan.windows(2) {
            assert_eq!(window[0].next_node.as_ref(), Some(&window[1].node));
        }
        assert!(plan.last().unwrap().next_node.is_none());
    }

    #[test]
    fn test_single_chunk_has_no_successor() {
        let plan = plan_placement(1, &nodes(4)).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].chunk_index, 0);
        assert!(plan[0].next_node.is_none());
    }

    #[test]
    fn test_more_nodes_than_chunks() {
        let plan = plan_placement(2, &nodes(5)).unwrap();
        assert_eq!(plan[0].node.node_id, "n0");
        assert_eq!(plan[1].node.node_id, "n1");
    }

    #[test]
    fn test_coverage_floor_k_over_n() {
        for (k, n) in [(10usize, 3usize), (7, 7), (1, 4), (25, 4)] {
            let plan = plan_placement(k, &nodes(n)).unwrap();
            let mut counts: HashMap<String, usize> = HashMap::new();
            for placement in &plan {
                *counts.entry(placement.node.node_id.clone()).or_default() += 1;
            }
            for node in nodes(n) {
                let used = counts.get(&node.node_id).copied().unwrap_or(0);
                assert!(used >= k / n, "k={} n={} node={} used={}", k, n, node.node_id, used);
            }
        }
    }

    #[test]
    fn test_empty_file_yields_empty_plan() {
        assert!(plan_placement(0, &nodes(2)).unwrap().is_empty());
    }
}
