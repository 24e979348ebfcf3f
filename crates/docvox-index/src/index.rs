//! Vector index with brute-force cosine similarity search and on-disk persistence.
//!
//! The index lives in memory while in use and is written to a directory as
//! two JSON files: `index.json` (vectors and chunk records) and
//! `manifest.json` (embedding model, dimensions, counts). Search is O(n),
//! which is fine for the few thousand chunks a handful of PDFs produce.

use std::path::Path;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::IndexError;

pub const INDEX_FILE: &str = "index.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Text and provenance of an indexed chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub source: String,
    pub page: Option<u32>,
    pub text: String,
}

/// A single hit returned from a vector search.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: Uuid,
    /// Cosine similarity score (-1.0 to 1.0).
    pub score: f64,
    pub chunk: ChunkRecord,
}

/// Describes how a persisted index was built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub embedding_model: String,
    pub dimensions: usize,
    pub chunk_count: usize,
    pub documents: Vec<String>,
    pub built_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VectorEntry {
    id: Uuid,
    embedding: Vec<f32>,
    chunk: ChunkRecord,
}

#[derive(Serialize, Deserialize)]
struct IndexFile {
    entries: Vec<VectorEntry>,
}

/// In-memory vector index using brute-force cosine similarity.
///
/// Entries keep insertion order, so equal scores rank the earlier chunk
/// first. Thread-safe via an interior `RwLock`; clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Arc<RwLock<Vec<VectorEntry>>>,
}

impl VectorIndex {
    /// Create a new empty vector index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a vector with its chunk. Overwrites any existing entry with the same ID.
    pub fn insert(&self, id: Uuid, embedding: Vec<f32>, chunk: ChunkRecord) -> Result<(), IndexError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| IndexError::Corrupt(format!("Lock poisoned: {}", e)))?;
        let entry = VectorEntry { id, embedding, chunk };
        match entries.iter_mut().find(|e| e.id == id) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        Ok(())
    }

    /// Append freshly built entries. IDs must be unique; no duplicate check is made.
    pub fn extend(
        &self,
        items: impl IntoIterator<Item = (Uuid, Vec<f32>, ChunkRecord)>,
    ) -> Result<(), IndexError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| IndexError::Corrupt(format!("Lock poisoned: {}", e)))?;
        entries.extend(
            items
                .into_iter()
                .map(|(id, embedding, chunk)| VectorEntry { id, embedding, chunk }),
        );
        Ok(())
    }

    /// Search for the k nearest neighbors to the query vector by cosine similarity.
    ///
    /// Returns results sorted by descending similarity score.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| IndexError::Corrupt(format!("Lock poisoned: {}", e)))?;

        let mut scored: Vec<SearchHit> = entries
            .iter()
            .map(|entry| SearchHit {
                id: entry.id,
                score: cosine_similarity(query, &entry.embedding),
                chunk: entry.chunk.clone(),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    /// Return the number of vectors currently stored in the index.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Return true if the index contains no vectors.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the index and its manifest into `dir`, creating it if needed.
    pub fn save(&self, dir: &Path, manifest: &IndexManifest) -> Result<(), IndexError> {
        std::fs::create_dir_all(dir)?;
        let entries = self
            .entries
            .read()
            .map_err(|e| IndexError::Corrupt(format!("Lock poisoned: {}", e)))?
            .clone();

        let file = IndexFile { entries };
        std::fs::write(dir.join(INDEX_FILE), serde_json::to_vec(&file)?)?;
        std::fs::write(
            dir.join(MANIFEST_FILE),
            serde_json::to_vec_pretty(manifest)?,
        )?;
        info!(dir = %dir.display(), chunks = file.entries.len(), "Vector index saved");
        Ok(())
    }

    /// Read an index previously written by [`save`](Self::save).
    pub fn load(dir: &Path) -> Result<(Self, IndexManifest), IndexError> {
        let index_path = dir.join(INDEX_FILE);
        let manifest_path = dir.join(MANIFEST_FILE);
        if !index_path.exists() || !manifest_path.exists() {
            return Err(IndexError::NotFound(dir.to_path_buf()));
        }

        let manifest: IndexManifest = serde_json::from_slice(&std::fs::read(&manifest_path)?)
            .map_err(|e| IndexError::Corrupt(format!("manifest: {}", e)))?;
        let file: IndexFile = serde_json::from_slice(&std::fs::read(&index_path)?)
            .map_err(|e| IndexError::Corrupt(format!("index: {}", e)))?;

        if let Some(bad) = file
            .entries
            .iter()
            .find(|e| e.embedding.len() != manifest.dimensions)
        {
            return Err(IndexError::Corrupt(format!(
                "entry {} has {} dimensions, manifest says {}",
                bad.id,
                bad.embedding.len(),
                manifest.dimensions
            )));
        }

        info!(dir = %dir.display(), chunks = file.entries.len(), "Vector index loaded");
        let index = Self {
            entries: Arc::new(RwLock::new(file.entries)),
        };
        Ok((index, manifest))
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude or the lengths differ.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();
    let mag_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: &str) -> ChunkRecord {
        ChunkRecord {
            source: "manual.pdf".to_string(),
            page: Some(1),
            text: text.to_string(),
        }
    }

    fn manifest(dimensions: usize, chunk_count: usize) -> IndexManifest {
        IndexManifest {
            embedding_model: "test".to_string(),
            dimensions,
            chunk_count,
            documents: vec!["manual.pdf".to_string()],
            built_at: Utc::now(),
        }
    }

    #[test]
    fn test_insert_and_search() {
        let index = VectorIndex::new();
        index.insert(Uuid::new_v4(), vec![1.0; 8], record("a")).unwrap();
        index.insert(Uuid::new_v4(), vec![1.0; 8], record("b")).unwrap();
        assert_eq!(index.len(), 2);

        let hits = index.search(&[1.0; 8], 5).unwrap();
        assert_eq!(hits.len(), 2);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_search_ordering_and_ties() {
        let index = VectorIndex::new();
        let far = Uuid::new_v4();
        index.insert(far, vec![-1.0; 4], record("far")).unwrap();
        index.insert(Uuid::new_v4(), vec![1.0; 4], record("first")).unwrap();
        index.insert(Uuid::new_v4(), vec![1.0; 4], record("second")).unwrap();

        let hits = index.search(&[1.0; 4], 10).unwrap();
        let texts: Vec<&str> = hits.iter().map(|h| h.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "far"]);
        assert_eq!(hits[2].id, far);
    }

    #[test]
    fn test_extend_appends_in_order() {
        let index = VectorIndex::new();
        index.insert(Uuid::new_v4(), vec![1.0; 4], record("first")).unwrap();
        index
            .extend(vec![
                (Uuid::new_v4(), vec![1.0; 4], record("second")),
                (Uuid::new_v4(), vec![-1.0; 4], record("third")),
            ])
            .unwrap();
        assert_eq!(index.len(), 3);

        let hits = index.search(&[1.0; 4], 10).unwrap();
        let texts: Vec<&str> = hits.iter().map(|h| h.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_search_respects_k_limit() {
        let index = VectorIndex::new();
        for i in 0..10 {
            index
                .insert(Uuid::new_v4(), vec![1.0; 4], record(&i.to_string()))
                .unwrap();
        }
        assert_eq!(index.search(&[1.0; 4], 3).unwrap().len(), 3);
    }

    #[test]
    fn test_search_empty_index() {
        let index = VectorIndex::new();
        assert!(index.is_empty());
        assert!(index.search(&[1.0; 4], 3).unwrap().is_empty());
    }

    #[test]
    fn test_insert_overwrites() {
        let index = VectorIndex::new();
        let id = Uuid::new_v4();
        index.insert(id, vec![1.0; 4], record("old")).unwrap();
        index.insert(id, vec![1.0; 4], record("new")).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.search(&[1.0; 4], 1).unwrap()[0].chunk.text, "new");
    }

    #[test]
    fn test_cosine_similarity_edge_cases() {
        assert_eq!(cosine_similarity(&[0.0; 4], &[1.0; 4]), 0.0);
        assert_eq!(cosine_similarity(&[1.0; 3], &[1.0; 4]), 0.0);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faiss_index");

        let index = VectorIndex::new();
        index.insert(Uuid::new_v4(), vec![0.5; 4], record("saved chunk")).unwrap();
        index.save(&path, &manifest(4, 1)).unwrap();

        let (loaded, manifest) = VectorIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(manifest.dimensions, 4);
        assert_eq!(manifest.chunk_count, 1);
        let hits = loaded.search(&[0.5; 4], 1).unwrap();
        assert_eq!(hits[0].chunk, record("saved chunk"));
    }

    #[test]
    fn test_load_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = VectorIndex::load(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, IndexError::NotFound(_)));
    }

    #[test]
    fn test_load_corrupt_index() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::new();
        index.save(dir.path(), &manifest(4, 0)).unwrap();
        std::fs::write(dir.path().join(INDEX_FILE), "{ not json").unwrap();

        let err = VectorIndex::load(dir.path()).unwrap_err();
        assert!(matches!(err, IndexError::Corrupt(_)));
    }

    #[test]
    fn test_load_dimension_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::new();
        index.insert(Uuid::new_v4(), vec![1.0; 3], record("x")).unwrap();
        index.save(dir.path(), &manifest(4, 1)).unwrap();

        let err = VectorIndex::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("3 dimensions"));
    }
}
