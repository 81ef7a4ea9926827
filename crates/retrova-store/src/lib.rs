//! Vector collection store: dynamic per-collection schema, point CRUD,
//! cosine similarity queries and a full-text keyword index.
//!
//! The store is an explicitly constructed client object with its own
//! lifecycle — opened once at process start and injected into the components
//! that need it, never reached through ambient global state.
//!
//! # Main types
//!
//! - [`VectorStore`] — The storage client owning the collection registry.
//! - [`Collection`] — A cheap cloneable handle to one named collection.
//! - [`KeywordIndex`] — BM25 inverted index over `content` and `title`.

/// Per-collection state and point operations.
pub mod collection;
/// BM25 keyword index maintained alongside the point map.
pub mod keyword;
/// JSONL persistence for collections.
pub mod persist;
/// The storage client and collection registry.
pub mod store;

pub use collection::Collection;
pub use keyword::KeywordIndex;
pub use store::VectorStore;
