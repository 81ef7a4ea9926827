use std::collections::BTreeMap;
use std::sync::Arc;

use retrova_core::{Filter, Payload, Point, RetrovaError, RetrovaResult, ScoredPoint};
use tokio::sync::RwLock;

use crate::keyword::{indexable_text, KeywordIndex};
use crate::persist::PointLog;

/// Point map and keyword index, guarded by one lock so they never diverge.
#[derive(Debug, Default)]
struct CollectionInner {
    points: BTreeMap<String, Point>,
    keyword: KeywordIndex,
}

#[derive(Debug)]
struct Shared {
    name: String,
    dimension: usize,
    inner: RwLock<CollectionInner>,
    log: Option<PointLog>,
}

/// A handle to one named, fixed-dimension collection of points.
///
/// Handles are cheap to clone; all clones address the same underlying state.
/// Mutations to different ids never conflict beyond the brief write lock;
/// concurrent mutations to the same id are last-writer-wins.
#[derive(Clone, Debug)]
pub struct Collection {
    shared: Arc<Shared>,
}

impl Collection {
    pub(crate) fn new(
        name: impl Into<String>,
        dimension: usize,
        log: Option<PointLog>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                dimension,
                inner: RwLock::new(CollectionInner::default()),
                log,
            }),
        }
    }

    pub(crate) async fn load(&self, points: BTreeMap<String, Point>) {
        let mut inner = self.shared.inner.write().await;
        for point in points.values() {
            inner.keyword.add(&point.id, &indexable_text(&point.payload));
        }
        inner.points = points;
    }

    /// The collection name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// The immutable embedding dimension.
    pub fn dimension(&self) -> usize {
        self.shared.dimension
    }

    /// Number of stored points.
    pub async fn count(&self) -> usize {
        self.shared.inner.read().await.points.len()
    }

    fn check_dimension(&self, len: usize) -> RetrovaResult<()> {
        if len != self.shared.dimension {
            return Err(RetrovaError::DimensionMismatch {
                collection: self.shared.name.clone(),
                expected: self.shared.dimension,
                actual: len,
            });
        }
        Ok(())
    }

    /// Inserts a new point. Fails with
    /// [`DuplicateId`](RetrovaError::DuplicateId) if the id already exists.
    pub async fn insert(
        &self,
        id: impl Into<String>,
        embedding: Vec<f32>,
        payload: Payload,
    ) -> RetrovaResult<()> {
        self.check_dimension(embedding.len())?;
        let id = id.into();

        let mut inner = self.shared.inner.write().await;
        if inner.points.contains_key(&id) {
            return Err(RetrovaError::DuplicateId {
                collection: self.shared.name.clone(),
                id,
            });
        }

        let point = Point::new(id, embedding, payload);
        if let Some(log) = &self.shared.log {
            log.append(&point).await?;
        }
        inner.keyword.add(&point.id, &indexable_text(&point.payload));
        inner.points.insert(point.id.clone(), point);
        Ok(())
    }

    /// Replaces an existing point in place. A missing id is a no-op, not an
    /// error — callers that need existence guarantees call [`Self::get`]
    /// first.
    pub async fn update(
        &self,
        id: &str,
        embedding: Vec<f32>,
        payload: Payload,
    ) -> RetrovaResult<()> {
        self.check_dimension(embedding.len())?;

        let mut inner = self.shared.inner.write().await;
        if !inner.points.contains_key(id) {
            return Ok(());
        }
        let point = Point::new(id, embedding, payload);
        inner.keyword.add(id, &indexable_text(&point.payload));
        inner.points.insert(id.to_string(), point);
        if let Some(log) = &self.shared.log {
            log.rewrite(&inner.points).await?;
        }
        Ok(())
    }

    /// Insert-or-update. Falls back to [`Self::update`] only when the insert
    /// failed with a duplicate id; any other insert failure propagates, so a
    /// real storage fault is never masked as "just update instead".
    pub async fn upsert(
        &self,
        id: impl Into<String>,
        embedding: Vec<f32>,
        payload: Payload,
    ) -> RetrovaResult<()> {
        let id = id.into();
        match self.insert(&id, embedding.clone(), payload.clone()).await {
            Ok(()) => Ok(()),
            Err(RetrovaError::DuplicateId { .. }) => self.update(&id, embedding, payload).await,
            Err(e) => Err(e),
        }
    }

    /// Fetches a point by id, failing with
    /// [`PointNotFound`](RetrovaError::PointNotFound) when absent.
    pub async fn get(&self, id: &str) -> RetrovaResult<Point> {
        let inner = self.shared.inner.read().await;
        inner
            .points
            .get(id)
            .cloned()
            .ok_or_else(|| RetrovaError::PointNotFound {
                collection: self.shared.name.clone(),
                id: id.to_string(),
            })
    }

    /// Deletes a point by id. A missing id is a no-op.
    pub async fn delete(&self, id: &str) -> RetrovaResult<()> {
        let mut inner = self.shared.inner.write().await;
        if inner.points.remove(id).is_none() {
            return Ok(());
        }
        inner.keyword.remove(id);
        if let Some(log) = &self.shared.log {
            log.rewrite(&inner.points).await?;
        }
        Ok(())
    }

    /// Deletes every point, returning how many were removed.
    pub async fn delete_all(&self) -> RetrovaResult<usize> {
        let mut inner = self.shared.inner.write().await;
        let removed = inner.points.len();
        inner.points.clear();
        inner.keyword.clear();
        if let Some(log) = &self.shared.log {
            log.rewrite(&inner.points).await?;
        }
        Ok(removed)
    }

    /// Ranks points by cosine similarity (`1 - cosine_distance`) against the
    /// query vector, descending. The filter is applied before the limit
    /// cutoff; `limit` bounds the result count but does not guarantee it.
    pub async fn query(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: Option<&Filter>,
    ) -> RetrovaResult<Vec<ScoredPoint>> {
        self.check_dimension(embedding.len())?;

        let inner = self.shared.inner.read().await;
        let mut scored = Vec::new();
        for point in inner.points.values() {
            if let Some(filter) = filter {
                if !filter.matches(&point.payload)? {
                    continue;
                }
            }
            scored.push(ScoredPoint {
                score: cosine_similarity(embedding, &point.embedding),
                point: point.clone(),
            });
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    /// Full scan, ordered by id ascending for determinism.
    pub async fn query_all(&self) -> RetrovaResult<Vec<Point>> {
        let inner = self.shared.inner.read().await;
        Ok(inner.points.values().cloned().collect())
    }

    /// BM25 search over the collection's keyword index, returning up to
    /// `limit` `(id, score)` pairs descending.
    pub async fn keyword_search(&self, query: &str, limit: usize) -> Vec<(String, f32)> {
        let inner = self.shared.inner.read().await;
        inner.keyword.search(query, limit)
    }
}

/// Cosine similarity between two equal-length vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}
