use docvox_core::error::DocvoxError;

/// Errors raised by speech recognizers and speakers.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    /// Speech was captured but could not be turned into text.
    #[error("Could not understand audio")]
    Unintelligible,

    /// The recognition service could not be reached or rejected the request.
    #[error("{0}")]
    Service(String),

    #[error("{0}")]
    Unexpected(String),

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<VoiceError> for DocvoxError {
    fn from(err: VoiceError) -> Self {
        match err {
            VoiceError::Io(e) => DocvoxError::Io(e),
            other => DocvoxError::Speech(other.to_string()),
        }
    }
}
