use std::fmt;

use serde::{Deserialize, Serialize};

/// Question recorded for a turn whose utterance could not be recognized.
pub const RECOGNITION_FAILED_QUESTION: &str = "SR Attempt Failed";

// =============================================================================
// Retrieval results
// =============================================================================

/// A passage of a source document that supported an answer.
///
/// Owned by the [`ConversationTurn`] that references it; turns never share
/// chunks with each other.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceChunk {
    /// Path or name of the document the passage came from.
    pub origin_document: String,
    /// Page within the document, when the extractor knows it.
    pub page_number: Option<u32>,
    /// The passage text.
    pub excerpt: String,
}

impl SourceChunk {
    /// Excerpt shortened to at most `max_chars` characters, for display.
    pub fn preview(&self, max_chars: usize) -> String {
        if self.excerpt.chars().count() <= max_chars {
            return self.excerpt.clone();
        }
        let mut cut: String = self.excerpt.chars().take(max_chars).collect();
        cut.push_str("...");
        cut
    }
}

impl fmt::Display for SourceChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.page_number {
            Some(page) => write!(f, "{} (page {})", self.origin_document, page),
            None => write!(f, "{} (page N/A)", self.origin_document),
        }
    }
}

// =============================================================================
// Conversation history
// =============================================================================

/// One completed or failed query attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
    pub sources: Vec<SourceChunk>,
}

impl ConversationTurn {
    pub fn new(
        question: impl Into<String>,
        answer: impl Into<String>,
        sources: Vec<SourceChunk>,
    ) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            sources,
        }
    }

    /// Turn recording a speech recognition failure.
    pub fn recognition_failed(detail: &str) -> Self {
        Self::new(
            RECOGNITION_FAILED_QUESTION,
            format!("Error: {}", detail),
            Vec::new(),
        )
    }
}

/// Append-only, ordered record of conversation turns.
///
/// Turns cannot be edited or removed individually; [`clear`](Self::clear)
/// empties the whole history at once.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConversationTurn> {
        self.turns.iter()
    }

    pub fn as_slice(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

impl<'a> IntoIterator for &'a ConversationHistory {
    type Item = &'a ConversationTurn;
    type IntoIter = std::slice::Iter<'a, ConversationTurn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}

// =============================================================================
// Speech input
// =============================================================================

/// Result of a single listen attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ListenOutcome {
    /// A phrase was recognized (already trimmed and case-folded).
    Recognized(String),
    /// The user asked to end the conversation.
    StopCommand,
    /// Nothing was said before the listen timeout.
    Timeout,
    /// Audio was captured but could not be turned into text.
    RecognitionError(String),
}

impl fmt::Display for ListenOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenOutcome::Recognized(text) => write!(f, "Recognized({})", text),
            ListenOutcome::StopCommand => write!(f, "StopCommand"),
            ListenOutcome::Timeout => write!(f, "Timeout"),
            ListenOutcome::RecognitionError(detail) => write!(f, "RecognitionError({})", detail),
        }
    }
}
