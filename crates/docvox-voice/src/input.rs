//! Speech input: one utterance per listen attempt, classified into a `ListenOutcome`.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, warn};

use docvox_core::config::SpeechConfig;
use docvox_core::types::ListenOutcome;

use crate::error::VoiceError;

// =============================================================================
// Trait
// =============================================================================

/// Captures a single utterance and turns it into text.
///
/// Implementations block the calling thread for at most
/// `timeout + phrase_limit`: `timeout` bounds the wait for speech to start,
/// `phrase_limit` bounds the length of the captured phrase.
pub trait SpeechRecognizer: Send + Sync {
    /// Returns `Ok(None)` when no speech started before `timeout`, and
    /// [`VoiceError::Unintelligible`] when speech was heard but not understood.
    fn recognize(&self, timeout: Duration, phrase_limit: Duration)
        -> Result<Option<String>, VoiceError>;
}

// =============================================================================
// Listener
// =============================================================================

/// Runs a recognizer and classifies its result.
pub struct Listener {
    recognizer: Arc<dyn SpeechRecognizer>,
    stop_phrases: Vec<String>,
    timeout: Duration,
    phrase_limit: Duration,
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("stop_phrases", &self.stop_phrases)
            .field("timeout", &self.timeout)
            .field("phrase_limit", &self.phrase_limit)
            .finish()
    }
}

impl Listener {
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
        stop_phrases: Vec<String>,
        timeout: Duration,
        phrase_limit: Duration,
    ) -> Self {
        let stop_phrases = stop_phrases
            .into_iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self {
            recognizer,
            stop_phrases,
            timeout,
            phrase_limit,
        }
    }

    pub fn from_config(recognizer: Arc<dyn SpeechRecognizer>, config: &SpeechConfig) -> Self {
        Self::new(
            recognizer,
            config.stop_phrases.clone(),
            Duration::from_secs(config.listen_timeout_secs),
            Duration::from_secs(config.phrase_time_limit_secs),
        )
    }

    pub fn stop_phrases(&self) -> &[String] {
        &self.stop_phrases
    }

    /// Map a raw recognizer result onto a listen outcome.
    pub fn classify(&self, result: Result<Option<String>, VoiceError>) -> ListenOutcome {
        match result {
            Ok(None) => ListenOutcome::Timeout,
            Ok(Some(text)) => {
                let query = text.trim().to_lowercase();
                if query.is_empty() {
                    ListenOutcome::Timeout
                } else if self.stop_phrases.iter().any(|p| *p == query) {
                    ListenOutcome::StopCommand
                } else {
                    ListenOutcome::Recognized(query)
                }
            }
            Err(VoiceError::Unintelligible) => {
                ListenOutcome::RecognitionError(VoiceError::Unintelligible.to_string())
            }
            Err(VoiceError::Service(detail)) => {
                ListenOutcome::RecognitionError(format!("Service error - {}", detail))
            }
            Err(other) => ListenOutcome::RecognitionError(format!("Unexpected SR error - {}", other)),
        }
    }

    /// Listen once on a blocking worker thread, suspending the caller until done.
    pub async fn listen(&self) -> ListenOutcome {
        debug!(
            timeout_secs = self.timeout.as_secs(),
            phrase_limit_secs = self.phrase_limit.as_secs(),
            "Listening for query"
        );
        let recognizer = Arc::clone(&self.recognizer);
        let (timeout, phrase_limit) = (self.timeout, self.phrase_limit);
        let result = tokio::task::spawn_blocking(move || recognizer.recognize(timeout, phrase_limit))
            .await
            .unwrap_or_else(|e| Err(VoiceError::Unexpected(format!("listener task failed: {}", e))));
        let outcome = self.classify(result);
        log_outcome(&outcome);
        outcome
    }
}

fn log_outcome(outcome: &ListenOutcome) {
    match outcome {
        ListenOutcome::Recognized(text) => info!(query = %text, "Speech recognized"),
        ListenOutcome::StopCommand => info!("Stop command received"),
        ListenOutcome::Timeout => debug!("No speech detected within timeout"),
        ListenOutcome::RecognitionError(detail) => warn!(detail = %detail, "Speech recognition failed"),
    }
}

// =============================================================================
// Console recognizer
// =============================================================================

/// Reads typed lines in place of a microphone.
///
/// A background thread forwards lines from the reader; each `recognize` call
/// waits up to `timeout` for the next one. Once the reader is exhausted and
/// every line consumed, calls fail with a service error and
/// [`is_closed`](Self::is_closed) is true.
pub struct ConsoleRecognizer {
    lines: Mutex<Receiver<String>>,
    buffered: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl ConsoleRecognizer {
    /// Recognizer over standard input.
    pub fn stdin() -> Result<Self, VoiceError> {
        Self::from_reader(std::io::BufReader::new(std::io::stdin()))
    }

    pub fn from_reader<R: BufRead + Send + 'static>(reader: R) -> Result<Self, VoiceError> {
        let (tx, rx) = mpsc::channel();
        let closed = Arc::new(AtomicBool::new(false));
        let closed_flag = Arc::clone(&closed);
        let buffered = Arc::new(AtomicUsize::new(0));
        let buffered_count = Arc::clone(&buffered);

        std::thread::Builder::new()
            .name("console-recognizer".to_string())
            .spawn(move || {
                for line in reader.lines() {
                    let Ok(line) = line else { break };
                    buffered_count.fetch_add(1, Ordering::SeqCst);
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                closed_flag.store(true, Ordering::SeqCst);
            })?;

        Ok(Self {
            lines: Mutex::new(rx),
            buffered,
            closed,
        })
    }

    /// Whether the reader reached end of input and every line was consumed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) && self.buffered.load(Ordering::SeqCst) == 0
    }
}

impl SpeechRecognizer for ConsoleRecognizer {
    fn recognize(
        &self,
        timeout: Duration,
        _phrase_limit: Duration,
    ) -> Result<Option<String>, VoiceError> {
        let lines = self
            .lines
            .lock()
            .map_err(|e| VoiceError::Unexpected(format!("Lock poisoned: {}", e)))?;
        match lines.recv_timeout(timeout) {
            Ok(line) => {
                self.buffered.fetch_sub(1, Ordering::SeqCst);
                Ok(Some(line))
            }
            // A closed console hears nothing; callers check `is_closed` to stop.
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => Ok(None),
        }
    }
}
