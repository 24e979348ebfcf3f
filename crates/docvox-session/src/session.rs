//! Per-session state carried across loop steps, and the user-facing controls.

use std::sync::Arc;

use tracing::info;

use docvox_chat::ConversationMemory;
use docvox_core::types::{ConversationHistory, ConversationTurn};
use docvox_index::Retriever;

use crate::error::SessionError;

pub(crate) const STATUS_LISTENING: &str = "Listening... ask a question about your documents.";
pub(crate) const STATUS_NEEDS_INDEX: &str = "Please embed documents before starting a conversation.";

/// Everything that survives between two loop steps.
///
/// Mutated only by [`ConversationLoop::step`](crate::ConversationLoop::step)
/// and by the control methods below. A pending query and a pending answer are
/// never queued at the same time.
pub struct SessionState {
    listening_active: bool,
    pending_query: Option<String>,
    pending_answer_to_speak: Option<String>,
    status_message: String,
    conversation_history: ConversationHistory,
    index_ready: bool,
    generator_handle: Option<Arc<dyn Retriever>>,
    memory: ConversationMemory,
    last_warning: Option<String>,
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("listening_active", &self.listening_active)
            .field("pending_query", &self.pending_query)
            .field("pending_answer_to_speak", &self.pending_answer_to_speak)
            .field("status_message", &self.status_message)
            .field("turns", &self.conversation_history.len())
            .field("index_ready", &self.index_ready)
            .field("has_generator", &self.generator_handle.is_some())
            .field("last_warning", &self.last_warning)
            .finish()
    }
}

impl SessionState {
    /// Start a session. `index_ready` is seeded from whether a persisted index exists.
    pub fn new(index_ready: bool) -> Self {
        let status_message = if index_ready {
            "Index found. Press start to begin listening.".to_string()
        } else {
            STATUS_NEEDS_INDEX.to_string()
        };
        Self {
            listening_active: false,
            pending_query: None,
            pending_answer_to_speak: None,
            status_message,
            conversation_history: ConversationHistory::new(),
            index_ready,
            generator_handle: None,
            memory: ConversationMemory::new(),
            last_warning: None,
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn listening_active(&self) -> bool {
        self.listening_active
    }

    pub fn pending_query(&self) -> Option<&str> {
        self.pending_query.as_deref()
    }

    pub fn pending_answer_to_speak(&self) -> Option<&str> {
        self.pending_answer_to_speak.as_deref()
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.conversation_history
    }

    pub fn index_ready(&self) -> bool {
        self.index_ready
    }

    pub fn has_generator(&self) -> bool {
        self.generator_handle.is_some()
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn last_warning(&self) -> Option<&str> {
        self.last_warning.as_deref()
    }

    // -------------------------------------------------------------------------
    // Controls
    // -------------------------------------------------------------------------

    /// Turn listening on. Refused until an index is ready.
    pub fn start_listening(&mut self) -> Result<(), SessionError> {
        if !self.index_ready {
            self.status_message = STATUS_NEEDS_INDEX.to_string();
            return Err(SessionError::IndexNotReady);
        }
        self.listening_active = true;
        self.status_message = STATUS_LISTENING.to_string();
        info!("Listening started");
        Ok(())
    }

    /// Turn listening off. An answer already queued is still spoken.
    pub fn stop_listening(&mut self) {
        self.listening_active = false;
        self.pending_query = None;
        self.status_message = "Listening stopped.".to_string();
        info!("Listening stopped");
    }

    /// Empty the history and memory and stop listening.
    pub fn clear_history(&mut self) {
        self.conversation_history.clear();
        self.memory.clear();
        self.listening_active = false;
        self.pending_query = None;
        self.pending_answer_to_speak = None;
        self.status_message = "Chat history cleared.".to_string();
        info!("Chat history cleared");
    }

    /// Record the outcome of an index rebuild.
    ///
    /// The generator handle is dropped either way so the next step loads the
    /// new index.
    pub fn index_rebuilt(&mut self, success: bool) {
        self.index_ready = success;
        self.generator_handle = None;
        if success {
            self.status_message = "Documents embedded. Press start to begin listening.".to_string();
        } else {
            self.listening_active = false;
            self.pending_query = None;
            self.status_message = "Embedding failed. Please try again.".to_string();
        }
        info!(success, "Index rebuilt");
    }

    /// Record that the persisted index was removed.
    pub fn index_cleared(&mut self) {
        self.index_ready = false;
        self.generator_handle = None;
        self.listening_active = false;
        self.pending_query = None;
        self.status_message = STATUS_NEEDS_INDEX.to_string();
        info!("Index cleared");
    }

    // -------------------------------------------------------------------------
    // Loop bookkeeping
    // -------------------------------------------------------------------------

    pub(crate) fn set_status(&mut self, status: impl Into<String>) {
        self.status_message = status.into();
    }

    pub(crate) fn set_warning(&mut self, warning: impl Into<String>) {
        self.last_warning = Some(warning.into());
    }

    pub(crate) fn deactivate(&mut self) {
        self.listening_active = false;
    }

    pub(crate) fn mark_index_unavailable(&mut self) {
        self.index_ready = false;
        self.generator_handle = None;
        self.listening_active = false;
        self.pending_query = None;
    }

    pub(crate) fn generator_handle(&self) -> Option<Arc<dyn Retriever>> {
        self.generator_handle.clone()
    }

    pub(crate) fn set_generator_handle(&mut self, handle: Arc<dyn Retriever>) {
        self.generator_handle = Some(handle);
    }

    pub(crate) fn take_pending_answer(&mut self) -> Option<String> {
        self.pending_answer_to_speak.take()
    }

    pub(crate) fn take_pending_query(&mut self) -> Option<String> {
        self.pending_query.take()
    }

    pub(crate) fn queue_query(&mut self, query: String) {
        debug_assert!(self.pending_answer_to_speak.is_none());
        self.pending_query = Some(query);
    }

    pub(crate) fn queue_answer(&mut self, answer: String) {
        debug_assert!(self.pending_query.is_none());
        self.pending_answer_to_speak = Some(answer);
    }

    pub(crate) fn record_turn(&mut self, turn: ConversationTurn) {
        self.conversation_history.push(turn);
    }

    pub(crate) fn memory_mut(&mut self) -> &mut ConversationMemory {
        &mut self.memory
    }
}
