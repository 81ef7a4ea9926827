use serde::{Deserialize, Serialize};

/// Semi-structured payload attached to a [`Point`]: top-level string keys
/// mapping to arbitrary JSON values.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// One stored `(id, embedding, payload)` triple.
///
/// Invariants: `embedding.len()` equals the owning collection's dimension,
/// and `id` is unique within the collection. Document chunks derive their id
/// from a content hash; conversation turns use a random uuid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Point {
    /// Unique identifier within the collection.
    pub id: String,
    /// Fixed-dimension embedding vector.
    pub embedding: Vec<f32>,
    /// Arbitrary JSON payload.
    #[serde(default)]
    pub payload: Payload,
}

impl Point {
    /// Creates a new point.
    pub fn new(id: impl Into<String>, embedding: Vec<f32>, payload: Payload) -> Self {
        Self {
            id: id.into(),
            embedding,
            payload,
        }
    }

    /// Returns the payload value at a top-level key, if present.
    pub fn payload_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.payload.get(key)
    }

    /// Returns the payload value at a top-level key as a string slice.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(|v| v.as_str())
    }
}

/// A point paired with the similarity score of a query.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    /// The matched point.
    pub point: Point,
    /// Cosine similarity (`1 - cosine_distance`) against the query vector.
    pub score: f32,
}

/// Which retrieval leg produced a [`RetrievalRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    /// Dense vector similarity.
    Semantic,
    /// Full-text keyword relevance.
    Keyword,
}

/// The unit returned to callers after search and score fusion.
///
/// `score` is leg-specific before fusion and a linear combination after;
/// scales are deliberately not normalized across legs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalRecord {
    /// The chunk text.
    pub content: String,
    /// Document title, when the payload carries one.
    pub title: Option<String>,
    /// Source file or URL the chunk came from.
    pub source: Option<String>,
    /// Chunk kind ("section", "table", ...).
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Relevance score; higher is better.
    pub score: f32,
    /// The leg that retrieved this record.
    pub search_type: SearchType,
}

impl RetrievalRecord {
    /// Builds a record from a point's payload, taking `content` from the
    /// `content` key and the optional fields from `title`/`source`/`type`.
    pub fn from_point(point: &Point, score: f32, search_type: SearchType) -> Self {
        Self {
            content: point.payload_str("content").unwrap_or_default().to_string(),
            title: point.payload_str("title").map(str::to_string),
            source: point.payload_str("source").map(str::to_string),
            kind: point.payload_str("type").map(str::to_string),
            score,
            search_type,
        }
    }
}

/// The role of the participant that authored a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A system-level instruction or prompt.
    System,
    /// A human end-user.
    User,
    /// The AI assistant.
    Assistant,
}

/// A single conversation turn sent to or received from the completion
/// service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message author.
    pub role: Role,
    /// The textual content of the message.
    pub content: String,
}

impl ChatMessage {
    /// Creates a new message with the given role and content.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Creates a new message with [`Role::User`].
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates a new message with [`Role::Assistant`].
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Creates a new message with [`Role::System`].
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}
