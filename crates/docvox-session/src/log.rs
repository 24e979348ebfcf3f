//! Append-only text log of answered questions.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::debug;

use crate::error::SessionError;

/// Appends one entry per answered question to a text file.
#[derive(Debug, Clone)]
pub struct ChatLog {
    path: PathBuf,
}

impl ChatLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a timestamped question/answer entry, creating the file if needed.
    pub fn append(&self, question: &str, answer: &str) -> Result<(), SessionError> {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string();
        let entry = format_entry(&timestamp, question, answer);

        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
            file.write_all(entry.as_bytes())
        };
        write().map_err(|source| SessionError::LogWrite {
            path: self.path.clone(),
            source,
        })?;

        debug!(path = %self.path.display(), "Chat log entry appended");
        Ok(())
    }
}

fn format_entry(timestamp: &str, question: &str, answer: &str) -> String {
    format!("\n\n[{}]\nQ: {}\nA: {}\n", timestamp, question, answer)
}
