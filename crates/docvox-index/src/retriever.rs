//! Read-only query interface over a loaded index.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use docvox_core::types::SourceChunk;

use crate::embedding::DynEmbeddingService;
use crate::error::IndexError;
use crate::index::{IndexManifest, VectorIndex};

/// A chunk returned for a query, with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub source: String,
    pub page: Option<u32>,
    pub text: String,
    pub score: f64,
}

impl From<RetrievedChunk> for SourceChunk {
    fn from(chunk: RetrievedChunk) -> Self {
        SourceChunk {
            origin_document: chunk.source,
            page_number: chunk.page,
            excerpt: chunk.text,
        }
    }
}

/// Returns the chunks most relevant to a query.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>, IndexError>;
}

/// Retriever over a [`VectorIndex`] loaded from disk.
pub struct IndexRetriever {
    index: VectorIndex,
    embedder: Arc<dyn DynEmbeddingService>,
    manifest: IndexManifest,
    top_k: usize,
}

impl std::fmt::Debug for IndexRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexRetriever")
            .field("chunks", &self.index.len())
            .field("manifest", &self.manifest)
            .field("top_k", &self.top_k)
            .finish()
    }
}

impl IndexRetriever {
    pub fn new(
        index: VectorIndex,
        embedder: Arc<dyn DynEmbeddingService>,
        manifest: IndexManifest,
        top_k: usize,
    ) -> Self {
        Self {
            index,
            embedder,
            manifest,
            top_k: top_k.max(1),
        }
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[async_trait]
impl Retriever for IndexRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>, IndexError> {
        let embedding = self.embedder.embed_boxed(query).await?;
        let hits = self.index.search(&embedding, self.top_k)?;
        debug!(query_len = query.len(), hits = hits.len(), "Retrieved chunks");

        Ok(hits
            .into_iter()
            .map(|hit| RetrievedChunk {
                source: hit.chunk.source,
                page: hit.chunk.page,
                text: hit.chunk.text,
                score: hit.score,
            })
            .collect())
    }
}
