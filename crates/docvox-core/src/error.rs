use thiserror::Error;

/// Top-level error type for docvox.
///
/// Subsystem crates define their own error types and implement
/// `From<SubsystemError> for DocvoxError` so that `?` works across crate
/// boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DocvoxError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Speech error: {0}")]
    Speech(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for DocvoxError {
    fn from(err: toml::de::Error) -> Self {
        DocvoxError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DocvoxError {
    fn from(err: toml::ser::Error) -> Self {
        DocvoxError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for DocvoxError {
    fn from(err: serde_json::Error) -> Self {
        DocvoxError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for docvox operations.
pub type Result<T> = std::result::Result<T, DocvoxError>;
