//! Retrieval-augmented answer generation with conversational memory.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use docvox_core::types::SourceChunk;
use docvox_index::{RetrievedChunk, Retriever};

use crate::error::ChatError;
use crate::llm::{ChatMessage, ChatModel};
use crate::memory::ConversationMemory;

/// Reply used when the model returns nothing.
pub const FALLBACK_ANSWER: &str = "Sorry, I couldn't find an answer.";

const CONDENSE_PROMPT: &str = "Given the following conversation and a follow up question, \
rephrase the follow up question to be a standalone question, in its original language.\n\n\
Chat History:\n{chat_history}\nFollow Up Input: {question}\nStandalone question:";

const ANSWER_PROMPT: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\n\
{context}\n\nQuestion: {question}\nHelpful Answer:";

/// An answer and the chunks it was generated from.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    pub answer: String,
    pub sources: Vec<SourceChunk>,
}

/// Produces an answer for a question, given the conversation so far.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Answer `question`, recording the exchange into `memory` on success.
    async fn generate(
        &self,
        question: &str,
        memory: &mut ConversationMemory,
        retriever: &dyn Retriever,
    ) -> Result<GeneratedAnswer, ChatError>;
}

/// Condense, retrieve, then answer from the retrieved context.
pub struct RetrievalQa {
    model: Arc<dyn ChatModel>,
}

impl RetrievalQa {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    async fn standalone_question(
        &self,
        question: &str,
        memory: &ConversationMemory,
    ) -> Result<String, ChatError> {
        if memory.is_empty() {
            return Ok(question.to_string());
        }

        let prompt = CONDENSE_PROMPT
            .replace("{chat_history}", &memory.transcript())
            .replace("{question}", question);
        let condensed = self.model.complete(&[ChatMessage::user(prompt)]).await?;
        let condensed = condensed.trim();
        if condensed.is_empty() {
            return Ok(question.to_string());
        }
        debug!(original = %question, standalone = %condensed, "Question condensed");
        Ok(condensed.to_string())
    }
}

#[async_trait]
impl AnswerGenerator for RetrievalQa {
    async fn generate(
        &self,
        question: &str,
        memory: &mut ConversationMemory,
        retriever: &dyn Retriever,
    ) -> Result<GeneratedAnswer, ChatError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ChatError::EmptyQuestion);
        }

        let standalone = self.standalone_question(question, memory).await?;
        let chunks = retriever.retrieve(&standalone).await?;

        let prompt = ANSWER_PROMPT
            .replace("{context}", &stuff_context(&chunks))
            .replace("{question}", &standalone);
        let reply = self.model.complete(&[ChatMessage::user(prompt)]).await?;
        let answer = match reply.trim() {
            "" => FALLBACK_ANSWER.to_string(),
            text => text.to_string(),
        };

        memory.record(question, answer.clone());
        info!(
            model = self.model.model_name(),
            sources = chunks.len(),
            answer_chars = answer.chars().count(),
            "Answer generated"
        );

        Ok(GeneratedAnswer {
            answer,
            sources: chunks.into_iter().map(SourceChunk::from).collect(),
        })
    }
}

fn stuff_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use docvox_index::IndexError;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replies from a script and records every prompt it was sent.
    struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String, ChatError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<String, ChatError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatError> {
            self.prompts.lock().unwrap().push(messages[0].content.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ChatError::EmptyResponse))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    struct FixedRetriever {
        chunks: Vec<RetrievedChunk>,
        queries: Mutex<Vec<String>>,
    }

    impl FixedRetriever {
        fn new(texts: &[&str]) -> Self {
            Self {
                chunks: texts
                    .iter()
                    .enumerate()
                    .map(|(i, t)| RetrievedChunk {
                        source: "uploaded_pdfs/policy.pdf".to_string(),
                        page: Some(i as u32),
                        text: t.to_string(),
                        score: 1.0 - i as f64 * 0.1,
                    })
                    .collect(),
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Retriever for FixedRetriever {
        async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>, IndexError> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.chunks.clone())
        }
    }

    struct FailingRetriever;

    #[async_trait]
    impl Retriever for FailingRetriever {
        async fn retrieve(&self, _: &str) -> Result<Vec<RetrievedChunk>, IndexError> {
            Err(IndexError::Corrupt("unreadable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_first_question_skips_condensing() {
        let model = ScriptedModel::new(vec![Ok("30 days".to_string())]);
        let qa = RetrievalQa::new(model.clone());
        let retriever = FixedRetriever::new(&["Refunds within 30 days.", "Shipping is free."]);
        let mut memory = ConversationMemory::new();

        let result = qa
            .generate("what is the refund policy", &mut memory, &retriever)
            .await
            .unwrap();

        assert_eq!(result.answer, "30 days");
        assert_eq!(result.sources.len(), 2);
        assert_eq!(result.sources[0].excerpt, "Refunds within 30 days.");
        assert_eq!(result.sources[1].page_number, Some(1));

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Refunds within 30 days.\n\nShipping is free."));
        assert!(prompts[0].contains("Question: what is the refund policy"));
        assert_eq!(
            *retriever.queries.lock().unwrap(),
            vec!["what is the refund policy".to_string()]
        );

        assert_eq!(memory.len(), 1);
        assert_eq!(memory.exchanges()[0].question, "what is the refund policy");
        assert_eq!(memory.exchanges()[0].answer, "30 days");
    }

    #[tokio::test]
    async fn test_follow_up_is_condensed_with_history() {
        let model = ScriptedModel::new(vec![
            Ok("What is the refund policy for gift cards?".to_string()),
            Ok("Gift cards cannot be refunded.".to_string()),
        ]);
        let qa = RetrievalQa::new(model.clone());
        let retriever = FixedRetriever::new(&["Gift cards are non-refundable."]);
        let mut memory = ConversationMemory::new();
        memory.record("what is the refund policy", "30 days");

        let result = qa
            .generate("and for gift cards", &mut memory, &retriever)
            .await
            .unwrap();
        assert_eq!(result.answer, "Gift cards cannot be refunded.");

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("Human: what is the refund policy\nAssistant: 30 days"));
        assert!(prompts[0].contains("Follow Up Input: and for gift cards"));
        assert_eq!(
            retriever.queries.lock().unwrap()[0],
            "What is the refund policy for gift cards?"
        );

        // Memory keeps the question as asked, not the condensed form.
        assert_eq!(memory.len(), 2);
        assert_eq!(memory.exchanges()[1].question, "and for gift cards");
    }

    #[tokio::test]
    async fn test_empty_reply_uses_fallback() {
        let model = ScriptedModel::new(vec![Ok("   ".to_string())]);
        let qa = RetrievalQa::new(model);
        let mut memory = ConversationMemory::new();

        let result = qa
            .generate("anything", &mut memory, &FixedRetriever::new(&["ctx"]))
            .await
            .unwrap();
        assert_eq!(result.answer, FALLBACK_ANSWER);
        assert_eq!(memory.exchanges()[0].answer, FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn test_model_failure_leaves_memory_untouched() {
        let model = ScriptedModel::new(vec![Err(ChatError::Api {
            status: 503,
            message: "overloaded".to_string(),
        })]);
        let qa = RetrievalQa::new(model);
        let mut memory = ConversationMemory::new();

        let err = qa
            .generate("question", &mut memory, &FixedRetriever::new(&["ctx"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Api { status: 503, .. }));
        assert!(memory.is_empty());
    }

    #[tokio::test]
    async fn test_retrieval_failure_is_reported() {
        let qa = RetrievalQa::new(ScriptedModel::new(vec![]));
        let mut memory = ConversationMemory::new();
        let err = qa
            .generate("question", &mut memory, &FailingRetriever)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Retrieval(IndexError::Corrupt(_))));
    }

    #[tokio::test]
    async fn test_blank_question_rejected() {
        let qa = RetrievalQa::new(ScriptedModel::new(vec![]));
        let mut memory = ConversationMemory::new();
        let err = qa
            .generate("  ", &mut memory, &FixedRetriever::new(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::EmptyQuestion));
    }
}
