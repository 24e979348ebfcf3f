//! Running record of question/answer exchanges fed back into generation.

use serde::{Deserialize, Serialize};

/// One question and the answer given to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
}

/// Ordered buffer of past exchanges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMemory {
    exchanges: Vec<Exchange>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.exchanges.push(Exchange {
            question: question.into(),
            answer: answer.into(),
        });
    }

    pub fn clear(&mut self) {
        self.exchanges.clear();
    }

    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    /// Render as a `Human:` / `Assistant:` transcript, one line per message.
    pub fn transcript(&self) -> String {
        self.exchanges
            .iter()
            .map(|e| format!("Human: {}\nAssistant: {}", e.question, e.answer))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_clear() {
        let mut memory = ConversationMemory::new();
        assert!(memory.is_empty());

        memory.record("what is the refund policy", "30 days");
        memory.record("and for gift cards?", "Gift cards cannot be refunded.");
        assert_eq!(memory.len(), 2);
        assert_eq!(memory.exchanges()[0].answer, "30 days");

        memory.clear();
        assert!(memory.is_empty());
        assert_eq!(memory.transcript(), "");
    }

    #[test]
    fn test_transcript() {
        let mut memory = ConversationMemory::new();
        memory.record("q1", "a1");
        memory.record("q2", "a2");
        assert_eq!(
            memory.transcript(),
            "Human: q1\nAssistant: a1\nHuman: q2\nAssistant: a2"
        );
    }
}
