//! Qdrant-backed retrieval index.

use super::{IndexError, NoteChunk, RetrievalIndex};
use crate::{
    config::get_config,
    embedding::{EmbeddingClient, get_embedding_client},
    qdrant::{QdrantService, stream_points},
};
use async_trait::async_trait;
use futures_util::TryStreamExt;

/// Retrieval index reading note chunks from a Qdrant collection.
///
/// The collection is expected to hold one point per chunk with the payload layout
/// `{"page_content": <chunk>, "metadata": {...}}`. Query texts are embedded with the same
/// provider and dimension the ingestion job used.
pub struct QdrantIndex {
    qdrant: QdrantService,
    collection: String,
    embedder: Box<dyn EmbeddingClient>,
    dimension: usize,
}

impl QdrantIndex {
    /// Assemble an index from its parts.
    pub fn new(
        qdrant: QdrantService,
        collection: impl Into<String>,
        embedder: Box<dyn EmbeddingClient>,
        dimension: usize,
    ) -> Self {
        Self {
            qdrant,
            collection: collection.into(),
            embedder,
            dimension,
        }
    }

    /// Build the index from the global configuration and verify the collection exists.
    ///
    /// The handle is opened once at start-up and reused for the process lifetime.
    pub async fn connect() -> Result<Self, IndexError> {
        let config = get_config();
        tracing::info!("Initializing embedding client");
        let embedder = get_embedding_client();
        let qdrant = QdrantService::new()?;
        let index = Self::new(
            qdrant,
            config.qdrant_collection_name.clone(),
            embedder,
            config.embedding_dimension,
        );

        if !index.exists().await? {
            return Err(IndexError::MissingCollection(index.collection.clone()));
        }
        tracing::info!(collection = %index.collection, "Note collection ready");
        Ok(index)
    }

    /// Name of the backing collection.
    pub fn collection(&self) -> &str {
        &self.collection
    }
}

#[async_trait]
impl RetrievalIndex for QdrantIndex {
    async fn scan_all(&self) -> Result<Vec<NoteChunk>, IndexError> {
        let chunks: Vec<NoteChunk> = stream_points(&self.qdrant, &self.collection)
            .map_ok(|point| NoteChunk::from_payload(point.payload.as_ref()))
            .try_collect()
            .await?;
        tracing::debug!(collection = %self.collection, chunks = chunks.len(), "Scanned collection");
        Ok(chunks)
    }

    async fn similarity_search(
        &self,
        query_text: &str,
        k: usize,
    ) -> Result<Vec<NoteChunk>, IndexError> {
        let mut vectors = self
            .embedder
            .generate_embeddings(vec![query_text.to_string()])
            .await?;
        let vector = vectors.pop().ok_or(IndexError::EmptyEmbedding)?;
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let hits = self
            .qdrant
            .search_points(&self.collection, vector, k)
            .await?;
        tracing::debug!(collection = %self.collection, k, hits = hits.len(), "Similarity search completed");
        Ok(hits
            .into_iter()
            .take(k)
            .map(|hit| NoteChunk::from_payload(hit.payload.as_ref()))
            .collect())
    }

    async fn exists(&self) -> Result<bool, IndexError> {
        Ok(self.qdrant.collection_exists(&self.collection).await?)
    }
}
