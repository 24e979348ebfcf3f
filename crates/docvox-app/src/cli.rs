//! CLI argument definitions for the docvox binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// docvox - ask spoken questions about your PDFs.
#[derive(Parser, Debug)]
#[command(name = "docvox", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Base directory that relative index, upload, and log paths resolve against.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Replace the index with one built from the given documents.
    Embed {
        /// PDF (or .txt/.md) files to index.
        #[arg(required = true)]
        documents: Vec<PathBuf>,
    },
    /// Remove the persisted index.
    ClearIndex,
    /// Show index presence and the active configuration.
    Status,
    /// Answer a single typed question.
    Ask {
        question: String,
    },
    /// Start a listening conversation.
    Chat {
        /// Print answers instead of speaking them.
        #[arg(long = "console-voice")]
        console_voice: bool,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > DOCVOX_CONFIG env var > ~/.docvox/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("DOCVOX_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log filter directive.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".docvox").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".docvox").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_embed() {
        let args = CliArgs::try_parse_from(["docvox", "embed", "a.pdf", "b.pdf"]).unwrap();
        assert_eq!(
            args.command,
            Command::Embed {
                documents: vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")]
            }
        );
    }

    #[test]
    fn test_embed_requires_documents() {
        assert!(CliArgs::try_parse_from(["docvox", "embed"]).is_err());
    }

    #[test]
    fn test_parse_chat_with_global_flags() {
        let args = CliArgs::try_parse_from([
            "docvox",
            "chat",
            "--console-voice",
            "--config",
            "/tmp/docvox.toml",
            "-l",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.command, Command::Chat { console_voice: true });
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/docvox.toml"));
        assert_eq!(args.resolve_log_level("info"), "debug");
    }

    #[test]
    fn test_log_level_falls_back_to_config() {
        let args = CliArgs::try_parse_from(["docvox", "status"]).unwrap();
        assert_eq!(args.command, Command::Status);
        assert_eq!(args.resolve_log_level("warn"), "warn");
    }

    #[test]
    fn test_parse_ask_and_clear() {
        let args = CliArgs::try_parse_from(["docvox", "ask", "what is the refund policy"]).unwrap();
        assert_eq!(
            args.command,
            Command::Ask {
                question: "what is the refund policy".to_string()
            }
        );
        let args = CliArgs::try_parse_from(["docvox", "clear-index"]).unwrap();
        assert_eq!(args.command, Command::ClearIndex);
    }
}
