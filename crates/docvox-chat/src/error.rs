//! Error types for answer generation.

use docvox_core::error::DocvoxError;
use docvox_index::IndexError;

/// Errors from the chat model client and the generation flow.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("response parsing error: {0}")]
    Parse(String),
    #[error("model returned no choices")]
    EmptyResponse,
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] IndexError),
    #[error("API key not set: environment variable {0} is missing or empty")]
    MissingApiKey(String),
    #[error("question cannot be empty")]
    EmptyQuestion,
}

impl From<ChatError> for DocvoxError {
    fn from(err: ChatError) -> Self {
        DocvoxError::Generation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        let err = ChatError::Api {
            status: 401,
            message: "Unauthorized".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 401 - Unauthorized");

        assert_eq!(ChatError::EmptyResponse.to_string(), "model returned no choices");
        assert_eq!(
            ChatError::MissingApiKey("MISTRAL_API_KEY".to_string()).to_string(),
            "API key not set: environment variable MISTRAL_API_KEY is missing or empty"
        );
    }

    #[test]
    fn test_chat_error_from_index_error() {
        let err: ChatError = IndexError::NoText.into();
        assert!(matches!(err, ChatError::Retrieval(_)));
        assert!(err.to_string().starts_with("retrieval failed:"));
    }

    #[test]
    fn test_into_docvox_error() {
        let err: DocvoxError = ChatError::EmptyQuestion.into();
        assert!(matches!(err, DocvoxError::Generation(_)));
    }
}
