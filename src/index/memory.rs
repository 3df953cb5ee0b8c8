//! Process-local retrieval index for tests and offline development.

use super::{IndexError, NoteChunk, RetrievalIndex};
use crate::embedding::EmbeddingClient;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

struct IndexedChunk {
    chunk: NoteChunk,
    vector: Vec<f32>,
}

/// Immutable in-memory index holding chunks with precomputed embeddings.
///
/// Scans return chunks in insertion order. Similarity search ranks by cosine similarity and
/// keeps insertion order between equal scores. Every read is counted so callers can observe
/// whether a request touched the index at all.
pub struct InMemoryIndex {
    entries: Vec<IndexedChunk>,
    embedder: Box<dyn EmbeddingClient>,
    scans: AtomicUsize,
    searches: AtomicUsize,
}

impl InMemoryIndex {
    /// Embed the chunk texts once and build the index.
    pub async fn build(
        chunks: Vec<NoteChunk>,
        embedder: Box<dyn EmbeddingClient>,
    ) -> Result<Self, IndexError> {
        let vectors = if chunks.is_empty() {
            Vec::new()
        } else {
            embedder
                .generate_embeddings(chunks.iter().map(|chunk| chunk.content.clone()).collect())
                .await?
        };

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexedChunk { chunk, vector })
            .collect();

        Ok(Self {
            entries,
            embedder,
            scans: AtomicUsize::new(0),
            searches: AtomicUsize::new(0),
        })
    }

    /// Number of stored chunks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of full scans served so far.
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::Relaxed)
    }

    /// Number of similarity searches served so far.
    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::Relaxed)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl RetrievalIndex for InMemoryIndex {
    async fn scan_all(&self) -> Result<Vec<NoteChunk>, IndexError> {
        self.scans.fetch_add(1, Ordering::Relaxed);
        Ok(self.entries.iter().map(|entry| entry.chunk.clone()).collect())
    }

    async fn similarity_search(
        &self,
        query_text: &str,
        k: usize,
    ) -> Result<Vec<NoteChunk>, IndexError> {
        self.searches.fetch_add(1, Ordering::Relaxed);
        let mut vectors = self
            .embedder
            .generate_embeddings(vec![query_text.to_string()])
            .await?;
        let query = vectors.pop().ok_or(IndexError::EmptyEmbedding)?;

        let mut scored: Vec<(f32, &NoteChunk)> = self
            .entries
            .iter()
            .map(|entry| (cosine_similarity(&query, &entry.vector), &entry.chunk))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored.into_iter().map(|(_, chunk)| chunk.clone()).collect())
    }

    async fn exists(&self) -> Result<bool, IndexError> {
        Ok(true)
    }
}
