use thiserror::Error;

/// Top-level error type for the Retrova engine.
///
/// Storage errors ([`CollectionNotFound`](RetrovaError::CollectionNotFound),
/// [`DuplicateId`](RetrovaError::DuplicateId),
/// [`PointNotFound`](RetrovaError::PointNotFound)) propagate to callers
/// unmodified. [`Rerank`](RetrovaError::Rerank) is the one exception to that
/// rule: the hybrid engine catches it and falls back to the un-reranked
/// fused ranking.
#[derive(Debug, Error)]
pub enum RetrovaError {
    /// The named collection has not been created.
    #[error("collection '{0}' does not exist")]
    CollectionNotFound(String),

    /// An embedding's length does not match the collection dimension.
    #[error("dimension mismatch in '{collection}': expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Collection whose dimension was violated.
        collection: String,
        /// The collection's declared dimension.
        expected: usize,
        /// The offending vector's length.
        actual: usize,
    },

    /// An insert hit an id that already exists in the collection.
    #[error("point '{id}' already exists in '{collection}'")]
    DuplicateId {
        /// Collection the insert targeted.
        collection: String,
        /// The duplicate point id.
        id: String,
    },

    /// A point lookup found nothing.
    #[error("point '{id}' not found in '{collection}'")]
    PointNotFound {
        /// Collection the lookup targeted.
        collection: String,
        /// The missing point id.
        id: String,
    },

    /// A filter expression is structurally invalid.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// The embedding service failed terminally (after retries).
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The completion-stream service failed terminally (after retries).
    #[error("completion failed: {0}")]
    Completion(String),

    /// The re-rank service failed. Degraded locally, never fatal upstream.
    #[error("re-rank failed: {0}")]
    Rerank(String),

    /// An error from an outbound HTTP request.
    #[error("HTTP error: {0}")]
    Http(String),

    /// An error in configuration parsing or validation.
    #[error("config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`RetrovaError`].
pub type RetrovaResult<T> = Result<T, RetrovaError>;
