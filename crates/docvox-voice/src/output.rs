//! Speech output: blocking synthesis, run on a worker thread by callers.

use std::process::Command;
use std::sync::Arc;

use tracing::{debug, warn};

use docvox_core::config::SpeechConfig;

use crate::error::VoiceError;

/// Synthesizes and plays text, returning once playback has finished.
pub trait SpeechOutput: Send + Sync {
    fn speak(&self, text: &str) -> Result<(), VoiceError>;
}

/// Strip characters a synthesizer cannot pronounce.
///
/// Line breaks and tabs become spaces; other control and formatting
/// characters are dropped.
pub fn sanitize_for_speech(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some(' ')
            } else if c.is_control() || is_format_char(c) {
                None
            } else {
                Some(c)
            }
        })
        .collect();
    cleaned.trim().to_string()
}

// Zero-width and bidi formatting characters that `is_control` misses.
fn is_format_char(c: char) -> bool {
    matches!(c, '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2060}'..='\u{2064}' | '\u{FEFF}')
}

/// Speak `text` on a blocking worker thread and wait for playback to finish.
///
/// Failures are logged and swallowed; speaking never fails the caller.
pub async fn speak_on_worker(speaker: Arc<dyn SpeechOutput>, text: &str) {
    let text = sanitize_for_speech(text);
    if text.is_empty() {
        debug!("Nothing to speak after sanitizing");
        return;
    }

    let chars = text.chars().count();
    match tokio::task::spawn_blocking(move || speaker.speak(&text)).await {
        Ok(Ok(())) => debug!(chars, "Speech output finished"),
        Ok(Err(e)) => warn!(error = %e, "Speech output failed"),
        Err(e) => warn!(error = %e, "Speech output worker failed"),
    }
}

/// Speaks through an external text-to-speech program such as `espeak-ng`.
#[derive(Debug, Clone)]
pub struct CommandSpeaker {
    program: String,
    rate: u32,
}

impl CommandSpeaker {
    pub fn new(program: impl Into<String>, rate: u32) -> Self {
        Self {
            program: program.into(),
            rate,
        }
    }

    pub fn from_config(config: &SpeechConfig) -> Self {
        Self::new(config.tts_command.clone(), config.tts_rate)
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl SpeechOutput for CommandSpeaker {
    fn speak(&self, text: &str) -> Result<(), VoiceError> {
        let output = Command::new(&self.program)
            .arg("-s")
            .arg(self.rate.to_string())
            .arg(text)
            .output()
            .map_err(|e| VoiceError::Synthesis(format!("{} failed to start: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoiceError::Synthesis(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Prints text to stdout instead of playing audio.
#[derive(Debug, Clone, Default)]
pub struct ConsoleSpeaker;

impl ConsoleSpeaker {
    pub fn new() -> Self {
        Self
    }
}

impl SpeechOutput for ConsoleSpeaker {
    fn speak(&self, text: &str) -> Result<(), VoiceError> {
        println!("🔊 {}", text);
        Ok(())
    }
}
