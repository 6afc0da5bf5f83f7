use super::{ChunkPayload, ChunkTransport, FetchedChunk, TransportOptions};
use crate::{Result, VaultError};
use async_trait::async_trait;

const STORE_PATH: &str = "file/save-chunk";
const FETCH_PATH: &str = "file/get-chunk";
const DELETE_PATH: &str = "file/delete-chunk";

/// reqwest-backed transport. The client-wide timeout bounds every call.
#[derive(Clone)]
pub struct HttpChunkTransport {
    client: reqwest::Client,
}

impl HttpChunkTransport {
    pub fn new(options: &TransportOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| VaultError::Config(format!("failed to build http client: {}", e)))?;

        Ok(Self { client })
    }

    fn endpoint(node_url: &str, path: &str) -> String {
        format!("{}/{}", node_url.trim_end_matches('/'), path)
    }

    async fn ensure_success(node_url: &str, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(VaultError::transport(
            node_url,
            format!("status {}: {}", status, body.trim()),
        ))
    }
}

#[async_trait]
impl ChunkTransport for HttpChunkTransport {
    async fn store(&self, node_url: &str, payload: &ChunkPayload) -> Result<()> {
        let response = self
            .client
            .post(Self::endpoint(node_url, STORE_PATH))
            .json(payload)
            .send()
            .await
            .map_err(|e| VaultError::transport(node_url, e))?;

        Self::ensure_success(node_url, response).await?;
        tracing::debug!(
            "Stored chunk {} of file {} on {}",
            payload.chunk_index,
            payload.file_id,
            node_url
        );
        Ok(())
    }

    async fn fetch(
        &self,
        node_url: &str,
        file_id: &str,
        node_index: usize,
    ) -> Result<Vec<FetchedChunk>> {
        let response = self
            .client
            .get(Self::endpoint(node_url, FETCH_PATH))
            .query(&[
                ("fileId", file_id.to_string()),
                ("nodeIndex", node_index.to_string()),
            ])
            .send()
            .await
            .map_err(|e| VaultError::transport(node_url, e))?;

        let response = Self::ensure_success(node_url, response).await?;
        let chunks: Vec<FetchedChunk> = response
            .json()
            .await
            .map_err(|e| VaultError::transport(node_url, format!("invalid chunk body: {}", e)))?;

        tracing::debug!(
            "Fetched {} chunks of file {} from {}",
            chunks.len(),
            file_id,
            node_url
        );
        Ok(chunks)
    }

    async fn delete(&self, node_url: &str, file_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(Self::endpoint(node_url, DELETE_PATH))
            .query(&[("fileId", file_id)])
            .send()
            .await
            .map_err(|e| VaultError::transport(node_url, e))?;

        Self::ensure_success(node_url, response).await?;
        Ok(())
    }
}
