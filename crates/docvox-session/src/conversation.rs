//! The conversation loop: one state transition per [`step`](ConversationLoop::step).
//!
//! Priority order within a step:
//! 1. speak a queued answer (even when listening has been turned off)
//! 2. do nothing when listening is off
//! 3. make sure a retriever is loaded for the current index
//! 4. listen for one utterance when no query is queued
//! 5. otherwise answer the queued query
//!
//! Nothing here is fatal: every collaborator failure becomes status text,
//! a recorded turn, or a warning, and the next step carries on.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use docvox_chat::AnswerGenerator;
use docvox_core::config::SessionConfig;
use docvox_core::types::{ConversationTurn, ListenOutcome};
use docvox_index::{IndexError, IndexService, Retriever};
use docvox_voice::{speak_on_worker, Listener, SpeechOutput};

use crate::error::SessionError;
use crate::log::ChatLog;
use crate::session::{SessionState, STATUS_NEEDS_INDEX};
use crate::state::LoopState;

pub const STOP_CONFIRMATION: &str = "Okay, stopping. Goodbye!";
pub const RECOGNITION_APOLOGY: &str = "Sorry, I couldn't understand that. Please try again.";
pub const STATUS_TIMEOUT: &str = "Didn't catch that. Listening again...";

/// Loads a retriever over the persisted index.
#[async_trait]
pub trait RetrieverLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn Retriever>, IndexError>;
}

#[async_trait]
impl RetrieverLoader for IndexService {
    async fn load(&self) -> Result<Arc<dyn Retriever>, IndexError> {
        let retriever = self.load_index()?;
        Ok(Arc::new(retriever))
    }
}

/// States before and after one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    pub from: LoopState,
    pub to: LoopState,
}

/// Sequences speech output, speech input, answer generation, and logging.
pub struct ConversationLoop {
    listener: Listener,
    speaker: Arc<dyn SpeechOutput>,
    generator: Arc<dyn AnswerGenerator>,
    loader: Arc<dyn RetrieverLoader>,
    log: ChatLog,
    max_error_chars: usize,
}

impl std::fmt::Debug for ConversationLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationLoop")
            .field("listener", &self.listener)
            .field("log", &self.log)
            .field("max_error_chars", &self.max_error_chars)
            .finish_non_exhaustive()
    }
}

impl ConversationLoop {
    pub fn new(
        listener: Listener,
        speaker: Arc<dyn SpeechOutput>,
        generator: Arc<dyn AnswerGenerator>,
        loader: Arc<dyn RetrieverLoader>,
        log: ChatLog,
    ) -> Self {
        Self {
            listener,
            speaker,
            generator,
            loader,
            log,
            max_error_chars: SessionConfig::default().max_error_chars,
        }
    }

    /// Limit on the length of the error text recorded for a failed query.
    pub fn with_max_error_chars(mut self, max_error_chars: usize) -> Self {
        self.max_error_chars = max_error_chars.max(1);
        self
    }

    pub fn log(&self) -> &ChatLog {
        &self.log
    }

    /// Execute exactly one state transition.
    pub async fn step(&self, session: &mut SessionState) -> StepReport {
        let from = LoopState::of(session);

        if let Some(text) = session.take_pending_answer() {
            speak_on_worker(Arc::clone(&self.speaker), &text).await;
            return finish(session, from);
        }

        if !session.listening_active() {
            return finish(session, from);
        }

        let Some(retriever) = self.ensure_retriever(session).await else {
            return finish(session, from);
        };

        match session.take_pending_query() {
            None => self.listen(session).await,
            Some(query) => self.answer(session, query, retriever.as_ref()).await,
        }
        finish(session, from)
    }

    async fn ensure_retriever(&self, session: &mut SessionState) -> Option<Arc<dyn Retriever>> {
        if let Some(handle) = session.generator_handle() {
            return Some(handle);
        }

        if !session.index_ready() {
            warn!("No index ready; listening halted");
            session.mark_index_unavailable();
            session.set_status(STATUS_NEEDS_INDEX);
            return None;
        }

        match self.loader.load().await {
            Ok(handle) => {
                info!("Retriever loaded for conversation");
                session.set_generator_handle(Arc::clone(&handle));
                Some(handle)
            }
            Err(e) => {
                let err = SessionError::IndexLoad(e.to_string());
                warn!(error = %err, "Index unavailable; listening halted");
                session.mark_index_unavailable();
                session.set_status(format!("Failed to load index ({}). Please embed your documents again.", e));
                None
            }
        }
    }

    async fn listen(&self, session: &mut SessionState) {
        match self.listener.listen().await {
            ListenOutcome::Recognized(text) => {
                session.set_status(format!("You said: {}", text));
                session.queue_query(text);
            }
            ListenOutcome::StopCommand => {
                session.deactivate();
                session.queue_answer(STOP_CONFIRMATION.to_string());
                session.set_status("Stop command received. Listening stopped.");
            }
            ListenOutcome::Timeout => {
                session.set_status(STATUS_TIMEOUT);
            }
            ListenOutcome::RecognitionError(detail) => {
                session.record_turn(ConversationTurn::recognition_failed(&detail));
                session.queue_answer(RECOGNITION_APOLOGY.to_string());
                session.set_status(format!("Speech recognition error: {}", detail));
            }
        }
    }

    async fn answer(&self, session: &mut SessionState, query: String, retriever: &dyn Retriever) {
        let result = self
            .generator
            .generate(&query, session.memory_mut(), retriever)
            .await;

        match result {
            Ok(generated) => {
                if let Err(e) = self.log.append(&query, &generated.answer) {
                    warn!(error = %e, "Chat log append failed");
                    session.set_warning(e.to_string());
                }
                session.record_turn(ConversationTurn::new(
                    query,
                    generated.answer.clone(),
                    generated.sources,
                ));
                session.queue_answer(generated.answer);
                session.set_status("Answer ready.");
            }
            Err(e) => {
                warn!(error = %e, "Answer generation failed");
                let text = truncate_chars(
                    &format!("Error processing query: {}", e),
                    self.max_error_chars,
                );
                session.record_turn(ConversationTurn::new(query, text.clone(), Vec::new()));
                session.set_status(text.clone());
                session.queue_answer(text);
            }
        }
    }
}

fn finish(session: &SessionState, from: LoopState) -> StepReport {
    let to = LoopState::of(session);
    debug!("Conversation state: {} -> {}", from, to);
    if !from.can_transition_to(&to) {
        warn!("Unexpected conversation transition: {} -> {}", from, to);
    }
    StepReport { from, to }
}

/// Cut `text` to at most `max` characters, marking the cut with `…`.
fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
