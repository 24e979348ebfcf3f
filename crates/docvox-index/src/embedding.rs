//! Embedding service trait and implementations.
//!
//! - `HashedEmbedding` builds deterministic bag-of-words vectors from hashed
//!   tokens. It needs no model files, so an index can be built offline, and
//!   texts that share words land close together.
//! - `OnnxEmbeddingService` (feature `onnx`) loads a sentence-transformer
//!   ONNX model (all-MiniLM-L6-v2) via ort and tokenizes with the HuggingFace
//!   tokenizers crate.

use std::future::Future;
use std::pin::Pin;

use crate::error::IndexError;

/// Service for generating text embeddings.
///
/// Used both when building the index (chunks) and when retrieving (queries);
/// the two must use the same service for scores to be meaningful.
pub trait EmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, IndexError>> + Send;

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;

    /// Name recorded in the index manifest.
    fn model_name(&self) -> String;
}

/// Boxed future returned by [`DynEmbeddingService::embed_boxed`].
pub type EmbedFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<f32>, IndexError>> + Send + 'a>>;

/// Object-safe version of [`EmbeddingService`] for dynamic dispatch.
///
/// A blanket implementation is provided so that every `EmbeddingService`
/// automatically implements `DynEmbeddingService`, allowing
/// `Arc<dyn DynEmbeddingService>` to be shared between the indexer and the
/// retriever.
pub trait DynEmbeddingService: Send + Sync {
    fn embed_boxed<'a>(&'a self, text: &'a str) -> EmbedFuture<'a>;

    fn dimensions(&self) -> usize;

    fn model_name(&self) -> String;
}

impl<T: EmbeddingService> DynEmbeddingService for T {
    fn embed_boxed<'a>(&'a self, text: &'a str) -> EmbedFuture<'a> {
        Box::pin(self.embed(text))
    }

    fn dimensions(&self) -> usize {
        EmbeddingService::dimensions(self)
    }

    fn model_name(&self) -> String {
        EmbeddingService::model_name(self)
    }
}

// ---------------------------------------------------------------------------
// HashedEmbedding - deterministic token-hashing vectors
// ---------------------------------------------------------------------------

/// Bag-of-words embedding using signed feature hashing.
///
/// Each lowercase alphanumeric token is hashed with FNV-1a into one of
/// `dimensions` buckets; the hash's top bit picks the sign. The result is
/// L2-normalized. The hash is fixed, so vectors are stable across builds and
/// a persisted index stays valid.
#[derive(Debug, Clone)]
pub struct HashedEmbedding {
    dimensions: usize,
}

impl HashedEmbedding {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();
        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut vector {
                *val /= norm;
            }
        }
        vector
    }
}

impl Default for HashedEmbedding {
    fn default() -> Self {
        Self::new(384)
    }
}

impl EmbeddingService for HashedEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError> {
        if text.trim().is_empty() {
            return Err(IndexError::Embedding("Cannot embed empty text".to_string()));
        }
        Ok(self.vectorize(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> String {
        format!("hashed-bow-{}", self.dimensions)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes.iter().fold(OFFSET, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(PRIME)
    })
}

// ---------------------------------------------------------------------------
// OnnxEmbeddingService - real ONNX Runtime inference
// ---------------------------------------------------------------------------

#[cfg(feature = "onnx")]
pub use onnx::OnnxEmbeddingService;

#[cfg(feature = "onnx")]
mod onnx {
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use ort::session::Session;
    use ort::value::TensorRef;
    use tokenizers::Tokenizer;
    use tracing::info;

    use super::EmbeddingService;
    use crate::error::IndexError;

    /// ONNX Runtime-backed sentence-transformer embeddings.
    ///
    /// Expects a model directory containing `model.onnx` and `tokenizer.json`.
    /// Masked mean pooling and L2 normalization produce one vector per text.
    pub struct OnnxEmbeddingService {
        session: Arc<Mutex<Session>>,
        tokenizer: Arc<Tokenizer>,
        dimensions: usize,
        model_name: String,
    }

    impl std::fmt::Debug for OnnxEmbeddingService {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("OnnxEmbeddingService")
                .field("model_name", &self.model_name)
                .field("dimensions", &self.dimensions)
                .finish()
        }
    }

    impl OnnxEmbeddingService {
        /// Load a sentence-transformer model from the given directory.
        pub fn from_directory(model_dir: &Path, model_name: &str) -> Result<Self, IndexError> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");
            if !model_path.exists() {
                return Err(IndexError::Embedding(format!(
                    "ONNX model not found at {}",
                    model_path.display()
                )));
            }
            if !tokenizer_path.exists() {
                return Err(IndexError::Embedding(format!(
                    "Tokenizer not found at {}",
                    tokenizer_path.display()
                )));
            }

            let session = Session::builder()
                .map_err(|e| IndexError::Embedding(format!("ONNX session builder: {}", e)))?
                .with_intra_threads(1)
                .map_err(|e| IndexError::Embedding(format!("ONNX set threads: {}", e)))?
                .commit_from_file(&model_path)
                .map_err(|e| IndexError::Embedding(format!("ONNX load model: {}", e)))?;

            // Sentence-transformer output is [batch, seq_len, hidden_dim].
            let dimensions = session
                .outputs()
                .first()
                .and_then(|out| out.dtype().tensor_shape())
                .and_then(|shape| shape.last().copied())
                .map(|d| if d > 0 { d as usize } else { 384 })
                .unwrap_or(384);

            let tokenizer = Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| IndexError::Embedding(format!("Failed to load tokenizer: {}", e)))?;

            info!(model = %model_path.display(), dimensions, "Loaded ONNX embedding model");

            Ok(Self {
                session: Arc::new(Mutex::new(session)),
                tokenizer: Arc::new(tokenizer),
                dimensions,
                model_name: model_name.to_string(),
            })
        }

        fn embed_sync(
            session: &Mutex<Session>,
            tokenizer: &Tokenizer,
            text: &str,
        ) -> Result<Vec<f32>, IndexError> {
            let encoding = tokenizer
                .encode(text, true)
                .map_err(|e| IndexError::Embedding(format!("Tokenization failed: {}", e)))?;

            let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
            let attention_mask: Vec<i64> = encoding
                .get_attention_mask()
                .iter()
                .map(|&m| m as i64)
                .collect();
            let token_type_ids: Vec<i64> =
                encoding.get_type_ids().iter().map(|&t| t as i64).collect();
            let seq_len = input_ids.len();

            let shape_err = |e: ndarray::ShapeError| IndexError::Embedding(e.to_string());
            let ids = ndarray::Array2::from_shape_vec((1, seq_len), input_ids).map_err(shape_err)?;
            let mask = ndarray::Array2::from_shape_vec((1, seq_len), attention_mask.clone())
                .map_err(shape_err)?;
            let types =
                ndarray::Array2::from_shape_vec((1, seq_len), token_type_ids).map_err(shape_err)?;

            let tensor_err = |e: ort::Error| IndexError::Embedding(format!("TensorRef: {}", e));
            let ids_ref = TensorRef::from_array_view(&ids).map_err(tensor_err)?;
            let mask_ref = TensorRef::from_array_view(&mask).map_err(tensor_err)?;
            let type_ref = TensorRef::from_array_view(&types).map_err(tensor_err)?;

            let mut session = session
                .lock()
                .map_err(|e| IndexError::Embedding(format!("Session lock poisoned: {}", e)))?;
            let outputs = session
                .run(ort::inputs![ids_ref, mask_ref, type_ref])
                .map_err(|e| IndexError::Embedding(format!("ONNX inference failed: {}", e)))?;

            let (shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| IndexError::Embedding(format!("Extract embeddings: {}", e)))?;
            let hidden_dim = match shape.iter().last() {
                Some(&d) if shape.len() >= 2 && d > 0 => d as usize,
                _ => {
                    return Err(IndexError::Embedding(format!(
                        "Unexpected output shape: {:?}",
                        shape
                    )))
                }
            };

            // Mean pooling over the sequence, masked by attention_mask.
            let mut pooled = vec![0.0f32; hidden_dim];
            let mut count = 0.0f32;
            for (tok_idx, &mask_val) in attention_mask.iter().enumerate() {
                if mask_val > 0 {
                    let offset = tok_idx * hidden_dim;
                    for (dim, value) in pooled.iter_mut().enumerate() {
                        *value += data[offset + dim];
                    }
                    count += 1.0;
                }
            }
            if count > 0.0 {
                for val in &mut pooled {
                    *val /= count;
                }
            }

            let norm: f32 = pooled.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm > 0.0 {
                for val in &mut pooled {
                    *val /= norm;
                }
            }
            Ok(pooled)
        }
    }

    impl EmbeddingService for OnnxEmbeddingService {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError> {
            if text.trim().is_empty() {
                return Err(IndexError::Embedding("Cannot embed empty text".to_string()));
            }
            // ONNX Runtime inference is CPU-bound; run on a blocking thread.
            let session = Arc::clone(&self.session);
            let tokenizer = Arc::clone(&self.tokenizer);
            let text = text.to_string();
            tokio::task::spawn_blocking(move || Self::embed_sync(&session, &tokenizer, &text))
                .await
                .map_err(|e| IndexError::Embedding(format!("Embedding task panicked: {}", e)))?
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }

        fn model_name(&self) -> String {
            self.model_name.clone()
        }
    }

}
