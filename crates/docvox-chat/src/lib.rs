//! docvox Chat crate - retrieval-augmented answer generation.
//!
//! Answers a question by retrieving the most relevant indexed chunks and
//! asking a hosted chat model to answer from them, keeping a running
//! conversation memory so follow-up questions can refer to earlier ones.

pub mod error;
pub mod generator;
pub mod llm;
pub mod memory;

pub use error::ChatError;
pub use generator::{AnswerGenerator, GeneratedAnswer, RetrievalQa, FALLBACK_ANSWER};
pub use llm::{ChatMessage, ChatModel, MistralChatModel};
pub use memory::{ConversationMemory, Exchange};
