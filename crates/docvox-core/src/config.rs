use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{DocvoxError, Result};

/// Phrases that end a voice conversation.
pub const DEFAULT_STOP_PHRASES: [&str; 5] = [
    "goodbye",
    "stop listening",
    "exit chat",
    "end chat",
    "terminate session",
];

/// Top-level configuration for docvox.
///
/// Loaded from `~/.docvox/config.toml` by default. Every section falls back
/// to its defaults when missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocvoxConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl DocvoxConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DocvoxConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| DocvoxError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Resolve a configured path against `general.data_dir`.
    ///
    /// Absolute paths are returned unchanged; `~/` expands to the home directory.
    pub fn resolve_path(&self, configured: &str) -> PathBuf {
        let configured = expand_home(configured);
        if configured.is_absolute() {
            configured
        } else {
            expand_home(&self.general.data_dir).join(configured)
        }
    }

    pub fn index_dir(&self) -> PathBuf {
        self.resolve_path(&self.index.index_dir)
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.resolve_path(&self.index.upload_dir)
    }

    pub fn log_path(&self) -> PathBuf {
        self.resolve_path(&self.session.log_path)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Base directory for the index, staged uploads and the chat log.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: ".".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Document indexing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory holding the persisted vector index.
    pub index_dir: String,
    /// Directory uploaded PDFs are copied into before embedding.
    pub upload_dir: String,
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// Embedding model name, recorded in the index manifest.
    pub embedding_model: String,
    /// Directory with `model.onnx` and `tokenizer.json`. Empty selects hashed embeddings.
    pub model_dir: String,
    /// Embedding dimension for hashed embeddings.
    pub embedding_dim: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_dir: "faiss_index".to_string(),
            upload_dir: "uploaded_pdfs".to_string(),
            chunk_size: 500,
            chunk_overlap: 50,
            embedding_model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            model_dir: String::new(),
            embedding_dim: 384,
        }
    }
}

/// Retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks handed to the answer generator.
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

/// Hosted chat model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible API base URL, without trailing slash.
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.mistral.ai/v1".to_string(),
            model: "mistral-small-latest".to_string(),
            temperature: 0.7,
            api_key_env: "MISTRAL_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Speech input and output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Seconds to wait for speech to begin.
    pub listen_timeout_secs: u64,
    /// Maximum length of a single phrase in seconds.
    pub phrase_time_limit_secs: u64,
    /// Text-to-speech program invoked for each answer.
    pub tts_command: String,
    /// Speaking rate in words per minute.
    pub tts_rate: u32,
    /// Utterances that end the conversation (matched after trimming and lowercasing).
    pub stop_phrases: Vec<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            listen_timeout_secs: 7,
            phrase_time_limit_secs: 12,
            tts_command: "espeak-ng".to_string(),
            tts_rate: 170,
            stop_phrases: DEFAULT_STOP_PHRASES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Conversation session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Append-only log of answered questions.
    pub log_path: String,
    /// Longest error description recorded as an answer.
    pub max_error_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            log_path: "chat_log.txt".to_string(),
            max_error_chars: 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = DocvoxConfig::default();
        assert_eq!(config.general.data_dir, ".");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.index.index_dir, "faiss_index");
        assert_eq!(config.index.chunk_size, 500);
        assert_eq!(config.index.chunk_overlap, 50);
        assert_eq!(config.index.embedding_dim, 384);
        assert!(config.index.model_dir.is_empty());
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.llm.model, "mistral-small-latest");
        assert!((config.llm.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.llm.api_key_env, "MISTRAL_API_KEY");
        assert_eq!(config.speech.listen_timeout_secs, 7);
        assert_eq!(config.speech.phrase_time_limit_secs, 12);
        assert_eq!(config.speech.tts_rate, 170);
        assert_eq!(config.session.log_path, "chat_log.txt");
        assert_eq!(config.session.max_error_chars, 200);
    }

    #[test]
    fn test_default_stop_phrases() {
        let config = SpeechConfig::default();
        assert_eq!(config.stop_phrases.len(), 5);
        assert!(config.stop_phrases.contains(&"goodbye".to_string()));
        assert!(config.stop_phrases.contains(&"terminate session".to_string()));
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[general]
log_level = "debug"

[retrieval]
top_k = 5

[speech]
listen_timeout_secs = 3
"#;
        let file = create_temp_config(content);
        let config = DocvoxConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.speech.listen_timeout_secs, 3);
        // Remaining fields use defaults
        assert_eq!(config.speech.phrase_time_limit_secs, 12);
        assert_eq!(config.speech.stop_phrases.len(), 5);
        assert_eq!(config.index.chunk_size, 500);
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        assert!(DocvoxConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = DocvoxConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.index.index_dir, "faiss_index");
    }

    #[test]
    fn test_save_creates_parent_dirs_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        let mut config = DocvoxConfig::default();
        config.llm.model = "mistral-large-latest".to_string();
        config.save(&path).unwrap();

        let reloaded = DocvoxConfig::load(&path).unwrap();
        assert_eq!(reloaded.llm.model, "mistral-large-latest");
        assert_eq!(reloaded.speech.stop_phrases, config.speech.stop_phrases);
    }

    #[test]
    fn test_resolve_path_relative_to_data_dir() {
        let mut config = DocvoxConfig::default();
        config.general.data_dir = "/var/lib/docvox".to_string();
        assert_eq!(
            config.index_dir(),
            PathBuf::from("/var/lib/docvox/faiss_index")
        );
        assert_eq!(
            config.log_path(),
            PathBuf::from("/var/lib/docvox/chat_log.txt")
        );

        config.index.upload_dir = "/tmp/uploads".to_string();
        assert_eq!(config.upload_dir(), PathBuf::from("/tmp/uploads"));
    }
}
