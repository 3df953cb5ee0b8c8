//! Retrieval index abstraction over the stored note chunks.
//!
//! Each chunk carries the structured metadata of the clinical note it was split from. Every
//! chunk of the same note holds identical metadata and the complete note text in `full_note`,
//! so lookups never need to reassemble chunks. The query layer only reads from an index.

mod memory;
mod qdrant;

pub use memory::InMemoryIndex;
pub use qdrant::QdrantIndex;

use crate::{embedding::EmbeddingClientError, qdrant::QdrantError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Payload key holding the chunk text.
pub const CONTENT_KEY: &str = "page_content";
/// Payload key holding the note metadata object.
pub const METADATA_KEY: &str = "metadata";

/// Errors raised while reading from a retrieval index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The vector store rejected or failed a request.
    #[error("Qdrant request failed: {0}")]
    Qdrant(#[from] QdrantError),
    /// The query text could not be embedded.
    #[error("Failed to embed query: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Returned embedding dimension does not match the stored vectors.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension of the stored vectors.
        expected: usize,
        /// Dimension produced by the embedding provider.
        actual: usize,
    },
    /// Embedding provider returned no vectors.
    #[error("Embedding provider returned no vectors for the query")]
    EmptyEmbedding,
    /// The configured collection does not exist.
    #[error("Collection '{0}' not found; run the ingestion job first")]
    MissingCollection(String),
}

/// Structured metadata attached to every chunk of a clinical note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteMetadata {
    /// Patient identifier; empty when the note did not carry one.
    #[serde(default)]
    pub patient_id: String,
    /// Patient name.
    #[serde(default)]
    pub name: String,
    /// Patient age, stored as text.
    #[serde(default)]
    pub age: String,
    /// Lower-cased diagnosis extracted at ingestion, possibly empty.
    #[serde(default)]
    pub diagnosis: String,
    /// Prescribed treatment, possibly empty.
    #[serde(default)]
    pub treatment: String,
    /// Follow-up instructions, possibly empty.
    #[serde(default)]
    pub followup: String,
    /// Complete note text, when the ingestion job stored it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_note: Option<String>,
}

impl NoteMetadata {
    /// Read metadata from a stored payload object.
    ///
    /// Missing keys become empty strings and numbers (such as `age`) are rendered as text.
    /// Returns `None` for an empty object, which callers treat as absent metadata.
    pub fn from_map(map: &Map<String, Value>) -> Option<Self> {
        if map.is_empty() {
            return None;
        }
        Some(Self {
            patient_id: text_field(map, "patient_id").unwrap_or_default(),
            name: text_field(map, "name").unwrap_or_default(),
            age: text_field(map, "age").unwrap_or_default(),
            diagnosis: text_field(map, "diagnosis").unwrap_or_default(),
            treatment: text_field(map, "treatment").unwrap_or_default(),
            followup: text_field(map, "followup").unwrap_or_default(),
            full_note: text_field(map, "full_note"),
        })
    }
}

fn text_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// A content chunk of one clinical note together with the note's metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NoteChunk {
    /// Text of this chunk (not necessarily the full note).
    pub content: String,
    /// Note metadata, absent when the stored point carried none.
    pub metadata: Option<NoteMetadata>,
}

impl NoteChunk {
    /// Build a chunk from its text and metadata.
    pub fn new(content: impl Into<String>, metadata: Option<NoteMetadata>) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }

    /// Decode a stored point payload of the form `{"page_content": .., "metadata": {..}}`.
    pub fn from_payload(payload: Option<&Map<String, Value>>) -> Self {
        let Some(payload) = payload else {
            return Self::default();
        };
        let content = payload
            .get(CONTENT_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let metadata = payload
            .get(METADATA_KEY)
            .and_then(Value::as_object)
            .and_then(NoteMetadata::from_map);
        Self { content, metadata }
    }

    /// The complete note text, falling back to the chunk text when `full_note` is absent.
    pub fn full_note(&self) -> &str {
        self.metadata
            .as_ref()
            .and_then(|metadata| metadata.full_note.as_deref())
            .unwrap_or(&self.content)
    }
}

/// Read-only access to the stored note chunks.
#[async_trait]
pub trait RetrievalIndex: Send + Sync {
    /// Return every stored chunk, unfiltered, in index-native order.
    async fn scan_all(&self) -> Result<Vec<NoteChunk>, IndexError>;

    /// Return at most `k` chunks ranked by embedding similarity to `query_text`.
    async fn similarity_search(
        &self,
        query_text: &str,
        k: usize,
    ) -> Result<Vec<NoteChunk>, IndexError>;

    /// Report whether the backing collection exists.
    async fn exists(&self) -> Result<bool, IndexError>;
}
