//! Hybrid retrieval for Retrova: dense vector similarity fused with keyword
//! relevance, an optional cross-encoder re-rank pass, and the
//! conversation-history lookup.
//!
//! The engine only ever reads from the vector store; point lifecycle belongs
//! to the store and the ingestion pipeline.
//!
//! # Main types
//!
//! - [`RetrievalEngine`] — Semantic, keyword and hybrid search over a
//!   collection.

/// The retrieval engine.
pub mod engine;

pub use engine::{HybridParams, RetrievalEngine};
