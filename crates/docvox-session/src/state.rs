//! Conversation loop states.
//!
//! The state is never stored; it is derived from [`SessionState`] so it can
//! never disagree with the data the loop acts on:
//! - `AwaitingSpeechOutput`: an answer is queued to be spoken
//! - `Idle`: listening is off and nothing is queued
//! - `Processing`: a recognized query is waiting for an answer
//! - `Listening`: the next step captures an utterance

use std::fmt;

use crate::session::SessionState;

/// Operational state of the conversation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopState {
    Idle,
    AwaitingSpeechOutput,
    Listening,
    Processing,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopState::Idle => write!(f, "Idle"),
            LoopState::AwaitingSpeechOutput => write!(f, "AwaitingSpeechOutput"),
            LoopState::Listening => write!(f, "Listening"),
            LoopState::Processing => write!(f, "Processing"),
        }
    }
}

impl LoopState {
    /// The state the next step will act in.
    pub fn of(session: &SessionState) -> Self {
        if session.pending_answer_to_speak().is_some() {
            LoopState::AwaitingSpeechOutput
        } else if !session.listening_active() {
            LoopState::Idle
        } else if session.pending_query().is_some() {
            LoopState::Processing
        } else {
            LoopState::Listening
        }
    }

    /// Returns whether a single step may move from `self` to `target`.
    pub fn can_transition_to(&self, target: &LoopState) -> bool {
        use LoopState::*;
        matches!(
            (self, target),
            (Idle, Idle)
                | (AwaitingSpeechOutput, Listening)
                | (AwaitingSpeechOutput, Idle)
                | (Listening, Listening)
                | (Listening, Processing)
                | (Listening, AwaitingSpeechOutput)
                | (Processing, AwaitingSpeechOutput)
                // Index load failures stop listening from any active state.
                | (Listening, Idle)
                | (Processing, Idle)
        )
    }
}
