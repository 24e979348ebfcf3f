//! Error types for indexing and retrieval.

use std::path::PathBuf;

use docvox_core::error::DocvoxError;

/// Errors from the indexing service and retriever.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("no index found at {0}")]
    NotFound(PathBuf),
    #[error("index is corrupt: {0}")]
    Corrupt(String),
    #[error("no extractable text in the given documents")]
    NoText,
    #[error("failed to extract {path}: {reason}")]
    Extraction { path: PathBuf, reason: String },
    #[error("unsupported document type: {0}")]
    UnsupportedDocument(PathBuf),
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("invalid index configuration: {0}")]
    InvalidConfig(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<IndexError> for DocvoxError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::Io(e) => DocvoxError::Io(e),
            other => DocvoxError::Index(other.to_string()),
        }
    }
}
