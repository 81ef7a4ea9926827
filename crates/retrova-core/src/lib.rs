//! Core types and error definitions for the Retrova retrieval engine.
//!
//! This crate provides the foundational types shared across all Retrova
//! crates: the unified error taxonomy, the point and record types stored in
//! and returned from vector collections, and the payload filter DSL.
//!
//! # Main types
//!
//! - [`RetrovaError`] — Unified error enum for all Retrova subsystems.
//! - [`RetrovaResult`] — Convenience alias for `Result<T, RetrovaError>`.
//! - [`Point`] — One stored `(id, embedding, payload)` triple.
//! - [`RetrievalRecord`] — The unit returned to callers after search/fusion.
//! - [`Filter`] — Boolean filter expression over payload fields.
//! - [`ChatMessage`] — A single conversation turn.

/// Unified error taxonomy.
pub mod error;
/// Payload filter expressions and their evaluator.
pub mod filter;
/// Domain types shared across crates.
pub mod types;

pub use error::{RetrovaError, RetrovaResult};
pub use filter::{CompareOp, Filter};
pub use types::{ChatMessage, Payload, Point, RetrievalRecord, Role, ScoredPoint, SearchType};
