//! External model services consumed by the Retrova engine: text embeddings,
//! streaming chat completions and cross-encoder re-ranking.
//!
//! Each service sits behind an async trait so the engine can be exercised
//! with deterministic local implementations; the HTTP clients carry explicit
//! timeouts and bounded retries with exponential backoff.
//!
//! # Main types
//!
//! - [`EmbeddingProvider`] — Trait for turning text into vectors.
//! - [`OpenAiEmbeddings`] — HTTP embeddings client (lower-cased input).
//! - [`HashEmbeddings`] — Deterministic local provider for tests/offline use.
//! - [`CompletionBackend`] — Trait for streaming chat completions.
//! - [`OpenAiCompletion`] — SSE streaming client.
//! - [`Reranker`] — Trait for relevance re-scoring of a shortlist.
//! - [`CohereReranker`] — HTTP re-rank client.
//! - [`RetryPolicy`] — Bounded retries with capped exponential backoff.

/// Streaming chat-completion backend and events.
pub mod completion;
/// Embedding provider trait and implementations.
pub mod embedding;
/// Cross-encoder re-ranking.
pub mod rerank;
/// Retry policy shared by the HTTP clients.
pub mod retry;

pub use completion::{CompletionBackend, CompletionEvent, CompletionRequest, OpenAiCompletion};
pub use embedding::{EmbeddingProvider, HashEmbeddings, OpenAiEmbeddings};
pub use rerank::{CohereReranker, Reranked, Reranker};
pub use retry::RetryPolicy;
