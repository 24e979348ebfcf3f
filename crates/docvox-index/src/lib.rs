//! docvox Index crate - document extraction, chunking, embeddings, and retrieval.
//!
//! Turns a set of PDF (or plain text) files into a persisted vector index of
//! overlapping text chunks, and answers top-k similarity queries over it.

pub mod chunker;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod retriever;
pub mod service;

pub use chunker::{ChunkSplitter, TextChunk};
pub use embedding::{DynEmbeddingService, EmbeddingService, HashedEmbedding};
pub use error::IndexError;
pub use extract::DocumentPage;
pub use index::{ChunkRecord, IndexManifest, SearchHit, VectorIndex};
pub use retriever::{IndexRetriever, RetrievedChunk, Retriever};
pub use service::{IndexReport, IndexService};

#[cfg(feature = "onnx")]
pub use embedding::OnnxEmbeddingService;
