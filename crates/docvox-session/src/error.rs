use std::path::PathBuf;

use docvox_core::error::DocvoxError;

/// Errors from session controls and bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no index is ready; embed documents first")]
    IndexNotReady,

    #[error("could not load index: {0}")]
    IndexLoad(String),

    #[error("could not write to {path}: {source}")]
    LogWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<SessionError> for DocvoxError {
    fn from(err: SessionError) -> Self {
        DocvoxError::Session(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_display() {
        assert_eq!(
            SessionError::IndexNotReady.to_string(),
            "no index is ready; embed documents first"
        );
        let err = SessionError::LogWrite {
            path: PathBuf::from("chat_log.txt"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "could not write to chat_log.txt: denied");
    }

    #[test]
    fn test_into_docvox_error() {
        let err: DocvoxError = SessionError::IndexLoad("missing".into()).into();
        assert!(matches!(err, DocvoxError::Session(_)));
    }
}
