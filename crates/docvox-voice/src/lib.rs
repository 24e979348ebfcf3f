//! docvox Voice crate - speech input and speech output.
//!
//! Speech input is a [`SpeechRecognizer`] that captures one utterance, wrapped
//! by a [`Listener`] that classifies the result into a
//! [`ListenOutcome`](docvox_core::types::ListenOutcome). Speech output is a
//! blocking [`SpeechOutput`] that callers run on a worker thread with
//! [`speak_on_worker`].

pub mod error;
pub mod input;
pub mod output;

pub use error::VoiceError;
pub use input::{ConsoleRecognizer, Listener, SpeechRecognizer};
pub use output::{sanitize_for_speech, speak_on_worker, CommandSpeaker, ConsoleSpeaker, SpeechOutput};
