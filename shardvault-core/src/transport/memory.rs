//! In-process node set used by operation tests and local runs.

use super::{ChunkPayload, ChunkTransport, FetchedChunk};
use crate::{Result, VaultError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct MemoryState {
    // node_url -> file_id -> chunk_index -> payload
    nodes: HashMap<String, HashMap<String, BTreeMap<u32, ChunkPayload>>>,
    unreachable: HashSet<String>,
    store_calls: usize,
    delete_calls: usize,
}

#[derive(Debug, Default)]
pub struct MemoryChunkTransport {
    state: Mutex<MemoryState>,
}

impl MemoryChunkTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subsequent call against `node_url` fails with a transport error.
    pub async fn mark_unreachable(&self, node_url: &str) {
        self.state.lock().await.unreachable.insert(node_url.to_string());
    }

    pub async fn mark_reachable(&self, node_url: &str) {
        self.state.lock().await.unreachable.remove(node_url);
    }

    /// Flip the first byte of a stored chunk. Returns false if no node holds it.
    pub async fn corrupt_chunk(&self, file_id: &str, chunk_index: u32) -> bool {
        let mut state = self.state.lock().await;
        for files in state.nodes.values_mut() {
            let Some(chunk) = files
                .get_mut(file_id)
                .and_then(|chunks| chunks.get_mut(&chunk_index))
            else {
                continue;
            };

            let mut data = chunk.chunk.to_vec();
            match data.first_mut() {
                Some(byte) => *byte ^= 0xff,
                None => data.push(0),
            }
            chunk.chunk = data.into();
            return true;
        }
        false
    }

    pub async fn store_calls(&self) -> usize {
        self.state.lock().await.store_calls
    }

    pub async fn delete_calls(&self) -> usize {
        self.state.lock().await.delete_calls
    }

    /// Chunk indices of `file_id` held by one node, ascending.
    pub async fn chunks_on(&self, node_url: &str, file_id: &str) -> Vec<u32> {
        self.state
            .lock()
            .await
            .nodes
            .get(node_url)
            .and_then(|files| files.get(file_id))
            .map(|chunks| chunks.keys().copied().collect())
            .unwrap_or_default()
    }

    pub async fn stored_payload(&self, file_id: &str, chunk_index: u32) -> Option<ChunkPayload> {
        let state = self.state.lock().await;
        state
            .nodes
            .values()
            .find_map(|files| files.get(file_id)?.get(&chunk_index).cloned())
    }

    pub async fn total_chunks(&self, file_id: &str) -> usize {
        self.state
            .lock()
            .await
            .nodes
            .values()
            .filter_map(|files| files.get(file_id))
            .map(BTreeMap::len)
            .sum()
    }

    fn check_reachable(state: &MemoryState, node_url: &str) -> Result<()> {
        if state.unreachable.contains(node_url) {
            return Err(VaultError::transport(node_url, "connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl ChunkTransport for MemoryChunkTransport {
    async fn store(&self, node_url: &str, payload: &ChunkPayload) -> Result<()> {
        let mut state = self.state.lock().await;
        state.store_calls += 1;
        Self::check_reachable(&state, node_url)?;

        state
            .nodes
            .entry(node_url.to_string())
            .or_default()
            .entry(payload.file_id.clone())
            .or_default()
            .insert(payload.chunk_index, payload.clone());
        Ok(())
    }

    /// Chunks come back highest index first; callers must order them.
    async fn fetch(
        &self,
        node_url: &str,
        file_id: &str,
        _node_index: usize,
    ) -> Result<Vec<FetchedChunk>> {
        let state = self.state.lock().await;
        Self::check_reachable(&state, node_url)?;

        let chunks = state
            .nodes
            .get(node_url)
            .and_then(|files| files.get(file_id))
            .map(|chunks| {
                chunks
                    .values()
                    .rev()
                    .map(|payload| FetchedChunk {
                        chunk_index: payload.chunk_index,
                        chunk_data: payload.chunk.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(chunks)
    }

    async fn delete(&self, node_url: &str, file_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.delete_calls += 1;
        Self::check_reachable(&state, node_url)?;

        if let Some(files) = state.nodes.get_mut(node_url) {
            files.remove(file_id);
        }
        Ok(())
    }
}
