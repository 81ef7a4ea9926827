//! Retrieval-grounded chat on top of the Retrova engine: prompt assembly,
//! token-budget trimming of conversation history, answer streaming and
//! deferred history persistence.
//!
//! # Main types
//!
//! - [`ChatService`] — Answers a query with retrieved context and streams
//!   the completion.
//! - [`trimmer`] — Bounds a conversation to a language-dependent token
//!   budget.

/// Prompt templates.
pub mod prompts;
/// The chat service.
pub mod service;
/// Token-budget trimming.
pub mod trimmer;

pub use service::{ChatConfig, ChatService};
pub use trimmer::{estimate_message_tokens, token_budget_for, trim_history};
