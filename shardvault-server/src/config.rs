use serde::{Deserialize, Serialize};
use shardvault_core::{NodeInfo, Result, TransportOptions, VaultError};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    /// Nodes registered at startup, before any self-registration arrives.
    #[serde(default)]
    pub nodes: Vec<SeedNodeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_spool_dir")]
    pub spool_dir: PathBuf,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedNodeConfig {
    pub node_id: String,
    pub node_url: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/metadata.sqlite")
}

fn default_spool_dir() -> PathBuf {
    PathBuf::from("./data/spool")
}

fn default_max_upload_bytes() -> u64 {
    1024 * 1024 * 1024
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_in_flight() -> usize {
    4
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            spool_dir: default_spool_dir(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            metadata: MetadataConfig::default(),
            upload: UploadConfig::default(),
            transport: TransportConfig::default(),
            nodes: Vec::new(),
        }
    }
}

impl TransportConfig {
    pub fn options(&self) -> TransportOptions {
        TransportOptions {
            timeout: Duration::from_millis(self.timeout_ms),
            max_in_flight: self.max_in_flight,
        }
    }
}

impl Config {
    /// The file is optional; `SHARDVAULT_*` variables override it, with `__`
    /// separating nested keys (`SHARDVAULT_TRANSPORT__TIMEOUT_MS`).
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path).required(false))
            .add_source(
                ::config::Environment::with_prefix("SHARDVAULT")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| VaultError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| VaultError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bind_addr.trim().is_empty() {
            return Err(VaultError::Config("bind_addr must not be empty".to_string()));
        }
        if self.transport.timeout_ms == 0 {
            return Err(VaultError::Config(
                "transport.timeout_ms must be positive".to_string(),
            ));
        }
        if self.transport.max_in_flight == 0 {
            return Err(VaultError::Config(
                "transport.max_in_flight must be positive".to_string(),
            ));
        }
        if self.upload.max_upload_bytes == 0 {
            return Err(VaultError::Config(
                "upload.max_upload_bytes must be positive".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if node.node_id.trim().is_empty() || node.node_url.trim().is_empty() {
                return Err(VaultError::Config(
                    "seed nodes need both node_id and node_url".to_string(),
                ));
            }
            if !seen.insert((node.node_id.as_str(), node.node_url.as_str())) {
                return Err(VaultError::Config(format!(
                    "duplicate seed node: {} at {}",
                    node.node_id, node.node_url
                )));
            }
        }

        Ok(())
    }

    pub fn seed_nodes(&self) -> Vec<NodeInfo> {
        self.nodes
            .iter()
            .map(|n| NodeInfo::new(n.node_id.clone(), n.node_url.clone()))
            .collect()
    }
}
