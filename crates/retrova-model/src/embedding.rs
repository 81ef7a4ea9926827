use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use retrova_core::{RetrovaError, RetrovaResult};
use serde::Deserialize;
use tracing::{info, warn};

use crate::retry::RetryPolicy;

/// Default embedding model and its output dimension.
const DEFAULT_MODEL: &str = "text-embedding-ada-002";
const DEFAULT_DIMENSION: usize = 1536;

/// Request timeout for the embeddings endpoint.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Trait for computing text embeddings.
///
/// Implementations lower-case their input, so two texts differing only in
/// case embed identically.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Computes embedding vectors for a batch of texts. Batch size is
    /// caller-controlled.
    async fn embed(&self, texts: &[String]) -> RetrovaResult<Vec<Vec<f32>>>;

    /// Computes the embedding of a single text.
    async fn embed_one(&self, text: &str) -> RetrovaResult<Vec<f32>> {
        let mut vectors = self.embed(std::slice::from_ref(&text.to_string())).await?;
        vectors
            .pop()
            .ok_or_else(|| RetrovaError::Embedding("provider returned no vector".into()))
    }

    /// Dimension of the vectors produced by this provider.
    fn dimension(&self) -> usize;
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    usage: Option<serde_json::Value>,
}

/// HTTP embeddings client for an OpenAI-compatible `/v1/embeddings`
/// endpoint.
///
/// Retries per its [`RetryPolicy`] (three retries by default) before failing
/// terminally with [`Embedding`](RetrovaError::Embedding).
pub struct OpenAiEmbeddings {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
    policy: RetryPolicy,
}

impl OpenAiEmbeddings {
    /// Creates a client against the given base URL (no trailing slash).
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> RetrovaResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RetrovaError::Http(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            dimension: DEFAULT_DIMENSION,
            policy: RetryPolicy::default(),
        })
    }

    /// Overrides the embedding model and its dimension. Chainable.
    pub fn with_model(mut self, model: impl Into<String>, dimension: usize) -> Self {
        self.model = model.into();
        self.dimension = dimension;
        self
    }

    /// Overrides the retry policy. Chainable.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn request(&self, input: &[String]) -> RetrovaResult<EmbeddingResponse> {
        let body = serde_json::json!({
            "model": self.model,
            "input": input,
        });
        let resp = self
            .http
            .post(format!("{}/v1/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| RetrovaError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_else(|_| "unknown error".to_string());
            return Err(RetrovaError::Http(format!(
                "embeddings endpoint returned {status}: {text}"
            )));
        }
        resp.json::<EmbeddingResponse>()
            .await
            .map_err(|e| RetrovaError::Http(e.to_string()))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    async fn embed(&self, texts: &[String]) -> RetrovaResult<Vec<Vec<f32>>> {
        let input: Vec<String> = texts.iter().map(|t| t.to_lowercase()).collect();

        let mut last_err = None;
        for attempt in 0..=self.policy.max_retries {
            match self.request(&input).await {
                Ok(response) => {
                    if let Some(usage) = &response.usage {
                        info!(batch = input.len(), %usage, "embedding usage");
                    }
                    return Ok(response.data.into_iter().map(|d| d.embedding).collect());
                }
                Err(e) => {
                    if attempt < self.policy.max_retries {
                        warn!(attempt, error = %e, "embedding request failed, backing off");
                        self.policy.backoff(attempt).await;
                    }
                    last_err = Some(e);
                }
            }
        }

        Err(RetrovaError::Embedding(
            last_err.map_or_else(|| "exhausted retries".to_string(), |e| e.to_string()),
        ))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Deterministic local provider: hashed bag-of-words, L2-normalized.
///
/// Not a semantic model — it exists so the engine, pipeline and tests can
/// run without a network. Similar word sets still land near each other.
pub struct HashEmbeddings {
    dimension: usize,
}

impl HashEmbeddings {
    /// Creates a provider producing vectors of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashEmbeddings {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddings {
    async fn embed(&self, texts: &[String]) -> RetrovaResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

impl HashEmbeddings {
    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();

        let mut freq: HashMap<&str, f32> = HashMap::new();
        let mut total = 0.0f32;
        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 1)
        {
            *freq.entry(word).or_insert(0.0) += 1.0;
            total += 1.0;
        }
        if total == 0.0 {
            return vector;
        }

        for (word, count) in &freq {
            let tf = count / total;
            vector[fnv1a(word.as_bytes(), 0) as usize % self.dimension] += tf;
            vector[fnv1a(word.as_bytes(), 1) as usize % self.dimension] += tf * 0.5;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

/// FNV-1a over the data followed by a seed byte.
fn fnv1a(data: &[u8], seed: u8) -> u32 {
    let mut hash: u32 = 2_166_136_261;
    for &byte in data.iter().chain(std::iter::once(&seed)) {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(16_777_619);
    }
    hash
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn hash_embeddings_are_deterministic_and_normalized() {
        let provider = HashEmbeddings::default();
        let a = provider.embed_one("stable identity for chunks").await.unwrap();
        let b = provider.embed_one("stable identity for chunks").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 256);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn hash_embeddings_are_case_insensitive() {
        let provider = HashEmbeddings::default();
        let lower = provider.embed_one("retrieval engine").await.unwrap();
        let upper = provider.embed_one("RETRIEVAL ENGINE").await.unwrap();
        assert_eq!(lower, upper);
    }

    #[tokio::test]
    async fn similar_texts_score_higher_than_unrelated() {
        let provider = HashEmbeddings::default();
        let a = provider.embed_one("rust systems programming").await.unwrap();
        let b = provider.embed_one("rust systems language").await.unwrap();
        let c = provider.embed_one("chocolate cake recipe").await.unwrap();
        assert!(cosine(&a, &b) > cosine(&a, &c));
    }

    #[tokio::test]
    async fn empty_text_embeds_to_zero_vector() {
        let provider = HashEmbeddings::new(8);
        let v = provider.embed_one("").await.unwrap();
        assert_eq!(v, vec![0.0; 8]);
    }

    #[tokio::test]
    async fn batch_preserves_order() {
        let provider = HashEmbeddings::default();
        let batch = provider
            .embed(&["first text".to_string(), "second text".to_string()])
            .await
            .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], provider.embed_one("first text").await.unwrap());
        assert_eq!(batch[1], provider.embed_one("second text").await.unwrap());
    }
}
