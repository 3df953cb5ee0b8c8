//! Qdrant vector store integration.

pub mod client;
/// Streaming helpers for Qdrant scroll pagination.
pub mod scroller;
pub mod types;

pub use client::QdrantService;
pub use scroller::stream_points;
pub use types::{QdrantError, ScoredPoint, StoredPoint};
