//! Index lifecycle: stage uploads, build, clear, and load the persisted index.
//!
//! The presence of the index directory is the only signal the rest of the
//! system uses to decide whether an index is ready.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use docvox_core::config::DocvoxConfig;

use crate::chunker::ChunkSplitter;
use crate::embedding::DynEmbeddingService;
use crate::error::IndexError;
use crate::extract::{extract_pages, DocumentPage};
use crate::index::{ChunkRecord, IndexManifest, VectorIndex};
use crate::retriever::IndexRetriever;

/// Summary of a completed build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub documents: usize,
    pub pages: usize,
    pub chunks: usize,
}

/// Builds, clears, and loads the persisted vector index.
pub struct IndexService {
    index_dir: PathBuf,
    upload_dir: PathBuf,
    splitter: ChunkSplitter,
    embedder: Arc<dyn DynEmbeddingService>,
    top_k: usize,
}

impl std::fmt::Debug for IndexService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexService")
            .field("index_dir", &self.index_dir)
            .field("upload_dir", &self.upload_dir)
            .field("splitter", &self.splitter)
            .field("embedding_model", &self.embedder.model_name())
            .field("top_k", &self.top_k)
            .finish()
    }
}

impl IndexService {
    pub fn new(
        index_dir: PathBuf,
        upload_dir: PathBuf,
        splitter: ChunkSplitter,
        embedder: Arc<dyn DynEmbeddingService>,
        top_k: usize,
    ) -> Self {
        Self {
            index_dir,
            upload_dir,
            splitter,
            embedder,
            top_k,
        }
    }

    /// Build the service from configuration with the given embedder.
    pub fn from_config(
        config: &DocvoxConfig,
        embedder: Arc<dyn DynEmbeddingService>,
    ) -> Result<Self, IndexError> {
        let splitter = ChunkSplitter::new(config.index.chunk_size, config.index.chunk_overlap)?;
        Ok(Self::new(
            config.index_dir(),
            config.upload_dir(),
            splitter,
            embedder,
            config.retrieval.top_k,
        ))
    }

    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    /// Whether a persisted index exists.
    pub fn index_exists(&self) -> bool {
        self.index_dir.exists()
    }

    /// Remove any persisted index. Succeeds when there is nothing to remove.
    pub fn clear_index(&self) -> Result<(), IndexError> {
        if self.index_dir.exists() {
            std::fs::remove_dir_all(&self.index_dir)?;
            info!(dir = %self.index_dir.display(), "Index cleared");
        } else {
            debug!(dir = %self.index_dir.display(), "No index to clear");
        }
        Ok(())
    }

    /// Copy documents into the upload directory, returning the staged paths.
    ///
    /// Files already inside the upload directory are not copied again.
    pub fn stage_documents(&self, paths: &[PathBuf]) -> Result<Vec<PathBuf>, IndexError> {
        std::fs::create_dir_all(&self.upload_dir)?;
        let upload_dir = self.upload_dir.canonicalize()?;

        let mut staged = Vec::with_capacity(paths.len());
        for path in paths {
            let file_name = path.file_name().ok_or_else(|| {
                IndexError::UnsupportedDocument(path.to_path_buf())
            })?;
            let target = self.upload_dir.join(file_name);
            let already_staged = path
                .canonicalize()
                .map(|p| p.parent() == Some(upload_dir.as_path()))
                .unwrap_or(false);
            if !already_staged {
                std::fs::copy(path, &target)?;
                debug!(from = %path.display(), to = %target.display(), "Document staged");
            }
            staged.push(target);
        }
        Ok(staged)
    }

    /// Extract, chunk, embed, and persist the given documents.
    ///
    /// Overwrites the files of any existing index in place; callers wanting a
    /// fresh index call [`clear_index`](Self::clear_index) first.
    pub async fn build_index(&self, paths: &[PathBuf]) -> Result<IndexReport, IndexError> {
        let to_extract = paths.to_vec();
        let pages: Vec<DocumentPage> = tokio::task::spawn_blocking(move || {
            to_extract
                .iter()
                .map(|p| extract_pages(p))
                .collect::<Result<Vec<_>, _>>()
                .map(|docs| docs.into_iter().flatten().collect())
        })
        .await
        .map_err(|e| IndexError::Extraction {
            path: PathBuf::new(),
            reason: format!("extraction task panicked: {}", e),
        })??;

        let chunks = self.splitter.split_pages(&pages);
        if chunks.is_empty() {
            warn!(documents = paths.len(), "No text extracted; index not written");
            return Err(IndexError::NoText);
        }

        let mut embedded = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let embedding = self.embedder.embed_boxed(&chunk.text).await?;
            embedded.push((
                Uuid::new_v4(),
                embedding,
                ChunkRecord {
                    source: chunk.source.clone(),
                    page: chunk.page,
                    text: chunk.text.clone(),
                },
            ));
        }
        let index = VectorIndex::new();
        index.extend(embedded)?;

        let manifest = IndexManifest {
            embedding_model: self.embedder.model_name(),
            dimensions: self.embedder.dimensions(),
            chunk_count: chunks.len(),
            documents: paths.iter().map(|p| p.to_string_lossy().to_string()).collect(),
            built_at: Utc::now(),
        };
        index.save(&self.index_dir, &manifest)?;

        let report = IndexReport {
            documents: paths.len(),
            pages: pages.len(),
            chunks: chunks.len(),
        };
        info!(
            documents = report.documents,
            pages = report.pages,
            chunks = report.chunks,
            "Index built"
        );
        Ok(report)
    }

    /// Load the persisted index as a retriever.
    ///
    /// Fails with [`IndexError::NotFound`] when nothing is persisted and with
    /// [`IndexError::Corrupt`] when it was built with a different embedder.
    pub fn load_index(&self) -> Result<IndexRetriever, IndexError> {
        let (index, manifest) = VectorIndex::load(&self.index_dir)?;
        if manifest.embedding_model != self.embedder.model_name()
            || manifest.dimensions != self.embedder.dimensions()
        {
            return Err(IndexError::Corrupt(format!(
                "index built with {} ({} dimensions), current embedder is {} ({} dimensions)",
                manifest.embedding_model,
                manifest.dimensions,
                self.embedder.model_name(),
                self.embedder.dimensions()
            )));
        }
        Ok(IndexRetriever::new(
            index,
            Arc::clone(&self.embedder),
            manifest,
            self.top_k,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashedEmbedding;
    use crate::retriever::Retriever;

    fn service(root: &Path) -> IndexService {
        IndexService::new(
            root.join("faiss_index"),
            root.join("uploaded_pdfs"),
            ChunkSplitter::new(200, 20).unwrap(),
            Arc::new(HashedEmbedding::new(128)),
            3,
        )
    }

    fn write_doc(root: &Path, name: &str, text: &str) -> PathBuf {
        let path = root.join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    #[tokio::test]
    async fn test_build_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        let doc = write_doc(
            dir.path(),
            "policy.txt",
            "Refunds are accepted within 30 days.\n\nShipping takes five business days.",
        );

        assert!(!svc.index_exists());
        let report = svc.build_index(&[doc]).await.unwrap();
        assert_eq!(report.documents, 1);
        assert_eq!(report.pages, 1);
        assert!(report.chunks >= 1);
        assert!(svc.index_exists());

        let retriever = svc.load_index().unwrap();
        assert_eq!(retriever.len(), report.chunks);
        assert_eq!(retriever.manifest().dimensions, 128);
        let hits = retriever.retrieve("refunds").await.unwrap();
        assert!(hits[0].text.contains("Refunds"));
    }

    #[tokio::test]
    async fn test_build_without_text_fails() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        let doc = write_doc(dir.path(), "empty.txt", "   ");

        let err = svc.build_index(&[doc]).await.unwrap_err();
        assert!(matches!(err, IndexError::NoText));
        assert!(!svc.index_exists());
    }

    #[tokio::test]
    async fn test_build_with_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        let err = svc
            .build_index(&[dir.path().join("missing.txt")])
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Io(_)));
    }

    #[test]
    fn test_load_without_index_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = service(dir.path()).load_index().unwrap_err();
        assert!(matches!(err, IndexError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_load_with_other_embedder_fails() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write_doc(dir.path(), "a.txt", "some indexed words");
        service(dir.path()).build_index(&[doc]).await.unwrap();

        let other = IndexService::new(
            dir.path().join("faiss_index"),
            dir.path().join("uploaded_pdfs"),
            ChunkSplitter::new(200, 20).unwrap(),
            Arc::new(HashedEmbedding::new(64)),
            3,
        );
        let err = other.load_index().unwrap_err();
        assert!(matches!(err, IndexError::Corrupt(_)));
    }

    /// Same vectors as the hashed embedder, recorded under another model name.
    struct RenamedEmbedding(HashedEmbedding);

    impl crate::embedding::EmbeddingService for RenamedEmbedding {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError> {
            crate::embedding::EmbeddingService::embed(&self.0, text).await
        }

        fn dimensions(&self) -> usize {
            crate::embedding::EmbeddingService::dimensions(&self.0)
        }

        fn model_name(&self) -> String {
            "sentence-transformers/all-MiniLM-L6-v2".to_string()
        }
    }

    #[tokio::test]
    async fn test_load_with_same_size_other_model_fails() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write_doc(dir.path(), "a.txt", "some indexed words");
        let built_with = IndexService::new(
            dir.path().join("faiss_index"),
            dir.path().join("uploaded_pdfs"),
            ChunkSplitter::new(200, 20).unwrap(),
            Arc::new(RenamedEmbedding(HashedEmbedding::new(128))),
            3,
        );
        built_with.build_index(&[doc]).await.unwrap();
        assert!(built_with.load_index().is_ok());

        let err = service(dir.path()).load_index().unwrap_err();
        match err {
            IndexError::Corrupt(reason) => {
                assert!(reason.contains("all-MiniLM-L6-v2"));
                assert!(reason.contains("hashed-bow-128"));
            }
            other => panic!("expected Corrupt, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_clear_index_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        let doc = write_doc(dir.path(), "a.txt", "content to index");
        svc.build_index(&[doc]).await.unwrap();

        svc.clear_index().unwrap();
        assert!(!svc.index_exists());
        svc.clear_index().unwrap();
        assert!(!svc.index_exists());
    }

    #[test]
    fn test_stage_documents_copies_into_upload_dir() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        let doc = write_doc(dir.path(), "manual.txt", "manual text");

        let staged = svc.stage_documents(&[doc]).unwrap();
        assert_eq!(staged, vec![dir.path().join("uploaded_pdfs").join("manual.txt")]);
        assert_eq!(std::fs::read_to_string(&staged[0]).unwrap(), "manual text");

        // Staging an already-staged file leaves it in place.
        let again = svc.stage_documents(&staged).unwrap();
        assert_eq!(again, staged);
        assert_eq!(std::fs::read_to_string(&again[0]).unwrap(), "manual text");
    }

    #[test]
    fn test_from_config_rejects_bad_overlap() {
        let mut config = DocvoxConfig::default();
        config.index.chunk_overlap = config.index.chunk_size;
        let err = IndexService::from_config(&config, Arc::new(HashedEmbedding::default()))
            .unwrap_err();
        assert!(matches!(err, IndexError::InvalidConfig(_)));
    }
}
