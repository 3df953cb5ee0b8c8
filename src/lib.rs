#![deny(missing_docs)]

//! Core library for the clinical notes retrieval and query server.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Retrieval index abstraction over stored note chunks.
pub mod index;
/// Structured logging and tracing setup.
pub mod logging;
/// Query counters.
pub mod metrics;
/// Qdrant vector store integration.
pub mod qdrant;
/// Diagnosis lookup, treatment aggregation, and question routing.
pub mod query;
