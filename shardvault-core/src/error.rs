use thiserror::Error;

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("node not found: id={node_id} url={node_url}")]
    NodeNotFound { node_id: String, node_url: String },

    #[error("duplicate node: id={node_id} url={node_url}")]
    DuplicateNode { node_id: String, node_url: String },

    #[error("transport error talking to {node_url}: {message}")]
    Transport { node_url: String, message: String },

    #[error("merkle root mismatch: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("no storage nodes are registered")]
    NoNodesRegistered,

    #[error("owning node is not registered: id={node_id} url={node_url}")]
    NodeUnavailable { node_id: String, node_url: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse classification used by callers that need to map errors onto
/// protocol status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Transport,
    Integrity,
    Precondition,
    Internal,
}

impl VaultError {
    pub fn transport(node_url: &str, message: impl std::fmt::Display) -> Self {
        Self::Transport {
            node_url: node_url.to_string(),
            message: message.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_) => ErrorKind::Validation,
            Self::FileNotFound(_) | Self::NodeNotFound { .. } => ErrorKind::NotFound,
            Self::DuplicateNode { .. } => ErrorKind::Conflict,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::IntegrityMismatch { .. } => ErrorKind::Integrity,
            Self::NoNodesRegistered | Self::NodeUnavailable { .. } => ErrorKind::Precondition,
            Self::Config(_)
            | Self::Database(_)
            | Self::Serialization(_)
            | Self::Io(_)
            | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Only node communication failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            VaultError::InvalidRequest("x".to_string()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            VaultError::FileNotFound("f".to_string()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(VaultError::NoNodesRegistered.kind(), ErrorKind::Precondition);
        assert_eq!(
            VaultError::IntegrityMismatch {
                expected: "a".to_string(),
                actual: "b".to_string(),
            }
            .kind(),
            ErrorKind::Integrity
        );
    }

    #[test]
    fn test_only_transport_is_retryable() {
        assert!(VaultError::transport("http://node-a", "timed out").is_retryable());
        assert!(!VaultError::NoNodesRegistered.is_retryable());
        assert!(!VaultError::Internal("boom".to_string()).is_retryable());
    }
}
