use std::time::Duration;

use async_trait::async_trait;
use retrova_core::{RetrovaError, RetrovaResult};
use serde::Deserialize;

/// Default cross-encoder model.
const DEFAULT_MODEL: &str = "rerank-english-v3.0";

/// Request timeout for the re-rank endpoint.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// One re-ranked document: its index into the submitted document list and
/// the cross-encoder's relevance score.
#[derive(Debug, Clone, Deserialize)]
pub struct Reranked {
    /// Index into the submitted documents.
    pub index: usize,
    /// Cross-encoder relevance, higher is better.
    pub relevance_score: f32,
}

/// Trait for cross-encoder re-ranking of a retrieval shortlist.
///
/// Failures surface as [`Rerank`](RetrovaError::Rerank); the hybrid engine
/// treats that as a degraded result, never a fatal one, so implementations
/// do not retry.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Scores `documents` against `query`, returning up to `top_n` entries
    /// ordered by descending relevance.
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> RetrovaResult<Vec<Reranked>>;
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<Reranked>,
}

/// HTTP client for a Cohere-compatible `/v1/rerank` endpoint.
pub struct CohereReranker {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl CohereReranker {
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
        })
    }

    /// Overrides the re-rank model. Chainable.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl Reranker for CohereReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> RetrovaResult<Vec<Reranked>> {
        let body = serde_json::json!({
            "model": self.model,
            "query": query,
            "documents": documents,
            "top_n": top_n,
        });
        let resp = self
            .http
            .post(format!("{}/v1/rerank", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| RetrovaError::Rerank(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_else(|_| "unknown error".to_string());
            return Err(RetrovaError::Rerank(format!(
                "rerank endpoint returned {status}: {text}"
            )));
        }

        let parsed: RerankResponse = resp
            .json()
            .await
            .map_err(|e| RetrovaError::Rerank(e.to_string()))?;
        Ok(parsed.results)
    }
}
