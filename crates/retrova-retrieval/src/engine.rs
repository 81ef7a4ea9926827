use std::collections::HashMap;
use std::sync::Arc;

use retrova_core::{
    ChatMessage, Filter, RetrievalRecord, RetrovaError, RetrovaResult, Role, SearchType,
};
use retrova_model::{EmbeddingProvider, Reranker};
use retrova_store::VectorStore;
use tracing::{debug, warn};

/// Collection holding conversation turns, unless overridden.
const DEFAULT_CHAT_COLLECTION: &str = "retrova_chat_history";

/// Knobs for [`RetrievalEngine::hybrid_search`].
#[derive(Debug, Clone)]
pub struct HybridParams {
    /// Candidate count for the semantic leg.
    pub top_k_semantic: usize,
    /// Candidate count for the keyword leg.
    pub top_k_keyword: usize,
    /// Minimum cosine similarity for semantic candidates.
    pub score_threshold: f32,
    /// Whether to run the cross-encoder pass over the fused shortlist.
    pub rerank: bool,
    /// Shortlist size handed to the re-ranker.
    pub top_n: usize,
    /// Semantic weight; the keyword weight is `1 - alpha`.
    pub alpha: f32,
    /// Optional payload filter for the semantic leg.
    pub filter: Option<Filter>,
}

impl Default for HybridParams {
    fn default() -> Self {
        Self {
            top_k_semantic: 5,
            top_k_keyword: 5,
            score_threshold: 0.5,
            rerank: false,
            top_n: 5,
            alpha: 0.5,
            filter: None,
        }
    }
}

/// Fuses dense vector similarity with keyword relevance into one ranked
/// list, with an optional re-rank pass.
///
/// Reads from the store, never mutates it. The two legs' score scales are
/// combined linearly without normalization; changing that would change
/// ranked output, so it is preserved as designed.
pub struct RetrievalEngine {
    store: Arc<VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    reranker: Option<Arc<dyn Reranker>>,
    chat_collection: String,
}

impl RetrievalEngine {
    /// Creates an engine over the given store and embedding provider.
    pub fn new(store: Arc<VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            embedder,
            reranker: None,
            chat_collection: DEFAULT_CHAT_COLLECTION.to_string(),
        }
    }

    /// Attaches a re-ranker. Chainable.
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Overrides the conversation-history collection name. Chainable.
    pub fn with_chat_collection(mut self, name: impl Into<String>) -> Self {
        self.chat_collection = name.into();
        self
    }

    /// Semantic vector search: embeds the query, ranks by cosine similarity
    /// and drops candidates under `score_threshold`.
    pub async fn semantic_search(
        &self,
        query: &str,
        collection_name: &str,
        top_k: usize,
        score_threshold: f32,
        filter: Option<&Filter>,
    ) -> RetrovaResult<Vec<RetrievalRecord>> {
        let collection = self.store.get_collection(collection_name).await?;
        let embedding = self.embedder.embed_one(query).await?;
        let hits = collection.query(&embedding, top_k, filter).await?;
        Ok(hits
            .into_iter()
            .filter(|hit| hit.score >= score_threshold)
            .map(|hit| RetrievalRecord::from_point(&hit.point, hit.score, SearchType::Semantic))
            .collect())
    }

    /// Keyword search over the collection's full-text index, ranked by
    /// text relevance.
    pub async fn keyword_search(
        &self,
        query: &str,
        collection_name: &str,
        top_k: usize,
    ) -> RetrovaResult<Vec<RetrievalRecord>> {
        let collection = self.store.get_collection(collection_name).await?;
        let ranked = collection.keyword_search(query, top_k).await;

        let mut records = Vec::with_capacity(ranked.len());
        for (id, score) in ranked {
            match collection.get(&id).await {
                Ok(point) => {
                    records.push(RetrievalRecord::from_point(&point, score, SearchType::Keyword));
                }
                // The point raced away between ranking and lookup.
                Err(RetrovaError::PointNotFound { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(records)
    }

    /// Hybrid search: both legs run, results fuse by `(content, source)`
    /// with `alpha * semantic + (1 - alpha) * keyword`, and the fused list
    /// is optionally re-ranked.
    ///
    /// A leg contributes `0` for an item it did not retrieve. Items found by
    /// both legs keep the semantic label because that leg populates the
    /// fusion map first.
    pub async fn hybrid_search(
        &self,
        query: &str,
        collection_name: &str,
        params: &HybridParams,
    ) -> RetrovaResult<Vec<RetrievalRecord>> {
        let semantic = self
            .semantic_search(
                query,
                collection_name,
                params.top_k_semantic,
                params.score_threshold,
                params.filter.as_ref(),
            )
            .await?;
        let keyword = self
            .keyword_search(query, collection_name, params.top_k_keyword)
            .await?;
        debug!(
            semantic = semantic.len(),
            keyword = keyword.len(),
            alpha = params.alpha,
            "fusing retrieval legs"
        );

        let beta = 1.0 - params.alpha;
        let mut combined: HashMap<(String, Option<String>), RetrievalRecord> = HashMap::new();

        for record in semantic {
            let key = (record.content.clone(), record.source.clone());
            let mut fused = record;
            fused.score *= params.alpha;
            combined.insert(key, fused);
        }
        for record in keyword {
            let key = (record.content.clone(), record.source.clone());
            match combined.get_mut(&key) {
                Some(existing) => existing.score += beta * record.score,
                None => {
                    let mut fused = record;
                    fused.score *= beta;
                    combined.insert(key, fused);
                }
            }
        }

        let mut results: Vec<RetrievalRecord> = combined.into_values().collect();
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        if params.rerank {
            results = self.rerank_records(query, results, params.top_n).await;
        }
        Ok(results)
    }

    /// Re-scores the shortlist with the cross-encoder. Failure degrades to
    /// the fused ranking; it never fails the request.
    async fn rerank_records(
        &self,
        query: &str,
        records: Vec<RetrievalRecord>,
        top_n: usize,
    ) -> Vec<RetrievalRecord> {
        let Some(reranker) = &self.reranker else {
            warn!("re-rank requested but no re-ranker configured");
            return records;
        };

        let documents: Vec<String> = records.iter().map(|r| r.content.clone()).collect();
        match reranker.rerank(query, &documents, top_n).await {
            Ok(reranked) => {
                let mut rescored = Vec::with_capacity(reranked.len());
                for entry in reranked {
                    if let Some(record) = records.get(entry.index) {
                        let mut record = record.clone();
                        record.score = entry.relevance_score;
                        rescored.push(record);
                    }
                }
                rescored.sort_by(|a, b| {
                    b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal)
                });
                rescored
            }
            Err(e) => {
                warn!(error = %e, "re-ranking failed, returning fused ranking");
                records
            }
        }
    }

    /// All conversation turns of a session, oldest first.
    ///
    /// A full scan plus client-side filter on the payload `session_id` and a
    /// sort on the stored timestamp — per-session volume is small relative
    /// to an indexed query's cost. Rows with missing or malformed fields are
    /// skipped.
    pub async fn chat_history(&self, session_id: &str) -> RetrovaResult<Vec<ChatMessage>> {
        let collection = self
            .store
            .get_or_create_collection(&self.chat_collection, self.embedder.dimension())
            .await?;
        let points = collection.query_all().await?;

        let mut turns: Vec<(String, ChatMessage)> = Vec::new();
        for point in points {
            if point.payload_str("session_id") != Some(session_id) {
                continue;
            }
            let (Some(role), Some(content), Some(timestamp)) = (
                point.payload_str("role"),
                point.payload_str("content"),
                point.payload_str("timestamp"),
            ) else {
                continue;
            };
            let Ok(role) = serde_json::from_value::<Role>(serde_json::Value::String(role.into()))
            else {
                continue;
            };
            turns.push((timestamp.to_string(), ChatMessage::new(role, content)));
        }

        turns.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(turns.into_iter().map(|(_, message)| message).collect())
    }
}
