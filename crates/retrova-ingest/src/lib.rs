//! Document chunking and ingestion for the Retrova engine.
//!
//! The splitter is pure: it turns extracted section text and tables into
//! bounded, overlap-aware chunks whose identity is a hash of their content.
//! The pipeline drives the splitter, the embedding provider and the vector
//! store; because chunk ids are content-derived, re-ingesting an unchanged
//! document is a no-op.
//!
//! # Main types
//!
//! - [`SplitterConfig`] — Chunk size and overlap, in characters/rows.
//! - [`Chunk`] / [`ChunkMetadata`] — One retrieval-sized segment.
//! - [`ExtractedDocument`] — What the external extraction service produces.
//! - [`IngestPipeline`] — Chunks, embeds and upserts a document.

/// Ingestion orchestration.
pub mod pipeline;
/// Text and table segmentation.
pub mod splitter;

pub use pipeline::{ExtractedDocument, IngestPipeline, IngestReport};
pub use splitter::{chunk_id, split_sections, split_tables, Chunk, ChunkKind, ChunkMetadata, SplitterConfig};
